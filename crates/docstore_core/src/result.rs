//! Forward-only cursor over query results.

use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::processor::Processor;
use crate::query::QueryEntry;
use std::sync::Arc;

/// Forward-only cursor produced by [`crate::Query::get_result`].
///
/// The number of records is fixed when the cursor is created. Entries that a
/// query stage already loaded are handed out directly; every other record is
/// read from disk when the cursor reaches it, taking the collection lock for
/// that single read only.
///
/// # Example
///
/// ```rust,ignore
/// let mut result = db.query()?.get_result()?;
/// for _ in 0..result.count() {
///     let note = result.move_next()?;
///     println!("{}", note.title);
/// }
/// ```
pub struct DatabaseResult<T: Entity> {
    processor: Arc<Processor<T>>,
    pending: std::vec::IntoIter<QueryEntry<T>>,
    count: usize,
    position: usize,
    preloaded: bool,
    current: Option<T>,
}

impl<T: Entity> DatabaseResult<T> {
    pub(crate) fn new(processor: Arc<Processor<T>>, entries: Vec<QueryEntry<T>>) -> Self {
        Self {
            processor,
            count: entries.len(),
            preloaded: entries.iter().all(|entry| entry.record.is_some()),
            pending: entries.into_iter(),
            position: 0,
            current: None,
        }
    }

    /// Number of records in the result.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of successful advances so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of records not reached yet.
    pub fn remaining(&self) -> usize {
        self.count - self.position
    }

    /// Returns true if every record was loaded by a query stage.
    pub fn is_preloaded(&self) -> bool {
        self.preloaded
    }

    /// Advances to the next record and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EndOfCursor`] once all `count` records have been
    /// visited, and propagates failures to load a lazy record.
    pub fn move_next(&mut self) -> CoreResult<&T> {
        self.current = None;
        let record = self.advance()?;
        Ok(self.current.insert(record))
    }

    /// Returns the record the cursor is positioned on.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EndOfCursor`] before the first advance and after
    /// the cursor ran past the end.
    pub fn current(&self) -> CoreResult<&T> {
        self.current.as_ref().ok_or(CoreError::EndOfCursor)
    }

    /// Cursors are single-pass.
    ///
    /// # Errors
    ///
    /// Always returns [`CoreError::Unsupported`].
    pub fn reset(&mut self) -> CoreResult<()> {
        Err(CoreError::unsupported("reset"))
    }

    fn advance(&mut self) -> CoreResult<T> {
        if self.position >= self.count {
            return Err(CoreError::EndOfCursor);
        }
        let entry = self.pending.next().ok_or(CoreError::EndOfCursor)?;
        self.position += 1;

        match entry.record {
            Some(record) => Ok(record),
            None => self.processor.load_data(entry.id),
        }
    }
}

impl<T: Entity> std::fmt::Debug for DatabaseResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseResult")
            .field("count", &self.count)
            .field("position", &self.position)
            .field("preloaded", &self.preloaded)
            .finish_non_exhaustive()
    }
}

impl<T: Entity> IntoIterator for DatabaseResult<T> {
    type Item = CoreResult<T>;
    type IntoIter = Records<T>;

    fn into_iter(self) -> Self::IntoIter {
        Records { result: self }
    }
}

/// Iterator over the records of a [`DatabaseResult`].
///
/// Yields exactly the records the cursor has not visited yet.
#[derive(Debug)]
pub struct Records<T: Entity> {
    result: DatabaseResult<T>,
}

impl<T: Entity> Iterator for Records<T> {
    type Item = CoreResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.result.remaining() == 0 {
            return None;
        }
        Some(self.result.advance())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.result.remaining();
        (remaining, Some(remaining))
    }
}

impl<T: Entity> ExactSizeIterator for Records<T> {}
