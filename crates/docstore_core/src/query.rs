//! Composable query pipeline over one collection.
//!
//! A [`Query`] is a list of stages applied in the order they were attached
//! to a fresh snapshot of the index. Indexed stages ([`Query::filter`],
//! [`Query::sort`]) only look at index documents and never touch the disk.
//! Non-indexed stages load the full records they need in one locked batch
//! first; once loaded, records travel with their entry through the rest of
//! the pipeline and into the [`DatabaseResult`].

use crate::entity::{document_id, Entity, EntityId};
use crate::error::{CoreError, CoreResult};
use crate::processor::Processor;
use crate::result::DatabaseResult;
use docstore_codec::Document;
use std::cmp::Ordering;
use std::sync::Arc;

/// One entry flowing through a query pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryEntry<T> {
    /// Entity ID.
    pub id: EntityId,
    /// Index document of the entity.
    pub index: Document,
    /// The full record, once a stage has loaded it.
    pub record: Option<T>,
}

impl<T> QueryEntry<T> {
    fn from_document(index: Document) -> CoreResult<Self> {
        let id = document_id(&index)
            .ok_or_else(|| CoreError::invalid_format("index document without a valid Id"))?;
        Ok(Self {
            id,
            index,
            record: None,
        })
    }
}

type Stage<T> =
    Box<dyn FnOnce(&Processor<T>, Vec<QueryEntry<T>>) -> CoreResult<Vec<QueryEntry<T>>> + Send>;

/// A lazily evaluated pipeline of stages.
///
/// Nothing runs until [`Query::get_result`].
///
/// # Example
///
/// ```rust,ignore
/// let result = db
///     .query()?
///     .filter(|doc| doc["Priority"] >= Value::from(3))
///     .sort(|a, b| a["Title"].cmp(&b["Title"]))
///     .offset(10)
///     .size(10)
///     .get_result()?;
/// ```
pub struct Query<T: Entity> {
    processor: Arc<Processor<T>>,
    stages: Vec<Stage<T>>,
}

impl<T: Entity> Query<T> {
    pub(crate) fn new(processor: Arc<Processor<T>>) -> Self {
        Self {
            processor,
            stages: Vec::new(),
        }
    }

    /// Number of attached stages.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Loads every full record that is not loaded yet.
    #[must_use]
    pub fn preload(self) -> Self {
        self.stage(load_records)
    }

    /// Keeps entries whose index document matches `predicate`.
    #[must_use]
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&Document) -> bool + Send + 'static,
    {
        self.stage(move |_, mut entries| {
            entries.retain(|entry| predicate(&entry.index));
            Ok(entries)
        })
    }

    /// Stable sort by index documents.
    #[must_use]
    pub fn sort<F>(self, mut compare: F) -> Self
    where
        F: FnMut(&Document, &Document) -> Ordering + Send + 'static,
    {
        self.stage(move |_, mut entries| {
            entries.sort_by(|a, b| compare(&a.index, &b.index));
            Ok(entries)
        })
    }

    /// Keeps entries whose full record matches `predicate`.
    #[must_use]
    pub fn filter_non_indexed<F>(self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + 'static,
    {
        self.stage(move |processor, entries| {
            let mut entries = load_records(processor, entries)?;
            entries.retain(|entry| entry.record.as_ref().is_some_and(&predicate));
            Ok(entries)
        })
    }

    /// Stable sort by full records.
    #[must_use]
    pub fn sort_non_indexed<F>(self, mut compare: F) -> Self
    where
        F: FnMut(&T, &T) -> Ordering + Send + 'static,
    {
        self.stage(move |processor, entries| {
            let mut entries = load_records(processor, entries)?;
            entries.sort_by(|a, b| match (&a.record, &b.record) {
                (Some(a), Some(b)) => compare(a, b),
                _ => Ordering::Equal,
            });
            Ok(entries)
        })
    }

    /// Skips the first `count` entries.
    #[must_use]
    pub fn offset(self, count: usize) -> Self {
        self.stage(move |_, mut entries| {
            let skipped = count.min(entries.len());
            entries.drain(..skipped);
            Ok(entries)
        })
    }

    /// Keeps at most `count` entries.
    #[must_use]
    pub fn size(self, count: usize) -> Self {
        self.stage(move |_, mut entries| {
            entries.truncate(count);
            Ok(entries)
        })
    }

    /// Runs every stage over a fresh index snapshot.
    ///
    /// # Errors
    ///
    /// Propagates stage failures, such as a data file missing while a
    /// non-indexed stage loads it.
    pub fn get_result(self) -> CoreResult<DatabaseResult<T>> {
        let mut entries = self
            .processor
            .snapshot()?
            .into_iter()
            .map(QueryEntry::from_document)
            .collect::<CoreResult<Vec<_>>>()?;

        for stage in self.stages {
            entries = stage(&self.processor, entries)?;
        }
        Ok(DatabaseResult::new(self.processor, entries))
    }

    fn stage<F>(mut self, stage: F) -> Self
    where
        F: FnOnce(&Processor<T>, Vec<QueryEntry<T>>) -> CoreResult<Vec<QueryEntry<T>>>
            + Send
            + 'static,
    {
        self.stages.push(Box::new(stage));
        self
    }
}

impl<T: Entity> std::fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("stages", &self.stages.len())
            .finish_non_exhaustive()
    }
}

fn load_records<T: Entity>(
    processor: &Processor<T>,
    mut entries: Vec<QueryEntry<T>>,
) -> CoreResult<Vec<QueryEntry<T>>> {
    if entries.iter().all(|entry| entry.record.is_some()) {
        return Ok(entries);
    }
    processor.while_locked(|guard| -> CoreResult<_> {
        for entry in entries.iter_mut().filter(|entry| entry.record.is_none()) {
            entry.record = Some(guard.load_data(entry.id)?);
        }
        Ok(entries)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dir::CollectionDir;
    use crate::processor::PendingRecord;
    use crate::test_support::Item;
    use docstore_codec::Value;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn seeded(ranks: &[i64]) -> (TempDir, Arc<Processor<Item>>, Vec<Item>) {
        let temp = tempdir().unwrap();
        let processor =
            Processor::open(CollectionDir::new(temp.path()), Config::default()).unwrap();
        let items: Vec<Item> = ranks
            .iter()
            .enumerate()
            .map(|(i, &rank)| Item::new(&format!("item{i}"), rank))
            .collect();
        let records: Vec<_> = items
            .iter()
            .map(|i| PendingRecord::from_entity(i).unwrap())
            .collect();
        processor.write_data(&records).unwrap();
        (temp, Arc::new(processor), items)
    }

    fn collect(result: DatabaseResult<Item>) -> Vec<Item> {
        result.into_iter().collect::<CoreResult<Vec<_>>>().unwrap()
    }

    #[test]
    fn empty_pipeline_returns_everything() {
        let (_temp, processor, items) = seeded(&[3, 1, 2]);
        let result = Query::new(processor).get_result().unwrap();
        assert_eq!(result.count(), items.len());
    }

    #[test]
    fn filter_and_sort_on_index_fields() {
        let (_temp, processor, _) = seeded(&[5, 1, 4, 2, 3]);

        let ranks: Vec<i64> = collect(
            Query::new(processor)
                .filter(|doc| doc["Rank"] > Value::from(1))
                .sort(|a, b| b["Rank"].cmp(&a["Rank"]))
                .get_result()
                .unwrap(),
        )
        .into_iter()
        .map(|item| item.rank)
        .collect();

        assert_eq!(ranks, vec![5, 4, 3, 2]);
    }

    #[test]
    fn offset_and_size_slice_the_list() {
        let (_temp, processor, _) = seeded(&[0, 1, 2, 3, 4, 5, 6]);

        let ranks: Vec<i64> = collect(
            Query::new(processor)
                .sort(|a, b| a["Rank"].cmp(&b["Rank"]))
                .offset(2)
                .size(3)
                .get_result()
                .unwrap(),
        )
        .into_iter()
        .map(|item| item.rank)
        .collect();

        assert_eq!(ranks, vec![2, 3, 4]);
    }

    #[test]
    fn offset_past_end_is_empty() {
        let (_temp, processor, _) = seeded(&[1, 2]);
        let result = Query::new(processor).offset(10).get_result().unwrap();
        assert_eq!(result.count(), 0);
    }

    #[test]
    fn sort_is_stable() {
        let (_temp, processor, _) = seeded(&[1, 1, 1, 0]);

        let by_id: Vec<EntityId> = collect(Query::new(Arc::clone(&processor)).get_result().unwrap())
            .into_iter()
            .filter(|item| item.rank == 1)
            .map(|item| item.id)
            .collect();
        let sorted: Vec<EntityId> = collect(
            Query::new(processor)
                .sort(|a, b| a["Rank"].cmp(&b["Rank"]))
                .get_result()
                .unwrap(),
        )
        .into_iter()
        .skip(1)
        .map(|item| item.id)
        .collect();

        assert_eq!(sorted, by_id);
    }

    #[test]
    fn non_indexed_stages_see_full_records() {
        let (_temp, processor, items) = seeded(&[1, 2, 3]);
        let wanted = items[1].body.clone();

        let found = collect(
            Query::new(processor)
                .filter_non_indexed(move |item: &Item| item.body == wanted)
                .get_result()
                .unwrap(),
        );

        assert_eq!(found, vec![items[1].clone()]);
    }

    #[test]
    fn sort_non_indexed_orders_by_record() {
        let (_temp, processor, _) = seeded(&[2, 3, 1]);

        let ranks: Vec<i64> = collect(
            Query::new(processor)
                .sort_non_indexed(|a: &Item, b: &Item| a.rank.cmp(&b.rank))
                .get_result()
                .unwrap(),
        )
        .into_iter()
        .map(|item| item.rank)
        .collect();

        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn preloaded_results_survive_file_removal() {
        let (_temp, processor, items) = seeded(&[1]);

        let mut result = Query::new(Arc::clone(&processor))
            .preload()
            .get_result()
            .unwrap();
        fs::remove_file(processor.dir().data_path(items[0].id)).unwrap();

        assert_eq!(result.move_next().unwrap(), &items[0]);
    }

    #[test]
    fn lazy_results_report_missing_files() {
        let (_temp, processor, items) = seeded(&[1]);

        let mut result = Query::new(Arc::clone(&processor)).get_result().unwrap();
        fs::remove_file(processor.dir().data_path(items[0].id)).unwrap();

        assert!(matches!(
            result.move_next(),
            Err(CoreError::DataNotFound { .. })
        ));
    }

    #[test]
    fn preload_and_lazy_agree() {
        let (_temp, processor, _) = seeded(&[4, 2, 9]);

        let lazy = collect(Query::new(Arc::clone(&processor)).get_result().unwrap());
        let loaded = collect(Query::new(processor).preload().get_result().unwrap());

        assert_eq!(lazy, loaded);
    }

    #[test]
    fn result_is_a_snapshot() {
        let (_temp, processor, _) = seeded(&[1, 2]);

        let result = Query::new(Arc::clone(&processor)).preload().get_result().unwrap();
        processor
            .write_data(&[PendingRecord::from_entity(&Item::new("late", 3)).unwrap()])
            .unwrap();

        assert_eq!(result.count(), 2);
        assert_eq!(processor.len().unwrap(), 3);
    }
}
