//! Property-based test generators using proptest.

use crate::fixtures::Note;
use docstore_codec::{Document, Value};
use docstore_core::EntityId;
use proptest::prelude::*;
use std::cmp::Ordering;

/// Strategy for generating entity IDs.
pub fn entity_id_strategy() -> impl Strategy<Value = EntityId> {
    prop::array::uniform16(any::<u8>()).prop_map(EntityId::from_bytes)
}

/// Strategy for generating notes.
///
/// Titles come from a small alphabet so that sorts see plenty of ties.
pub fn note_strategy() -> impl Strategy<Value = Note> {
    (
        entity_id_strategy(),
        "[a-d]{1,3}",
        -20i64..20,
        ".{0,32}",
    )
        .prop_map(|(id, title, priority, body)| Note {
            id,
            title,
            priority,
            body,
        })
}

/// Strategy for generating up to `max` notes with distinct IDs.
pub fn notes_strategy(max: usize) -> impl Strategy<Value = Vec<Note>> {
    prop::collection::vec(note_strategy(), 0..max).prop_map(|mut notes| {
        notes.sort_by_key(|note| note.id);
        notes.dedup_by_key(|note| note.id);
        notes
    })
}

/// A filter, sort and slice applied to notes by their index documents.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Keep notes with a priority of at least this.
    pub min_priority: i64,
    /// Sort key field.
    pub sort_field: &'static str,
    /// Sort descending instead of ascending.
    pub descending: bool,
    /// Entries to skip.
    pub offset: usize,
    /// Entries to keep.
    pub size: usize,
}

impl Pipeline {
    /// The filter predicate.
    pub fn keeps(&self, doc: &Document) -> bool {
        matches!(doc["Priority"], Value::Integer(p) if p >= self.min_priority)
    }

    /// The sort comparator.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ordering = a[self.sort_field].cmp(&b[self.sort_field]);
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }

    /// Runs the pipeline over `docs` with plain slice operations.
    pub fn apply(&self, docs: &[Document]) -> Vec<Document> {
        let mut kept: Vec<Document> = docs.iter().filter(|doc| self.keeps(doc)).cloned().collect();
        kept.sort_by(|a, b| self.compare(a, b));
        kept.into_iter().skip(self.offset).take(self.size).collect()
    }
}

/// Strategy for generating pipelines over [`Note`] index documents.
pub fn pipeline_strategy() -> impl Strategy<Value = Pipeline> {
    (
        -25i64..25,
        prop_oneof![Just("Title"), Just("Priority")],
        any::<bool>(),
        0usize..12,
        0usize..12,
    )
        .prop_map(|(min_priority, sort_field, descending, offset, size)| Pipeline {
            min_priority,
            sort_field,
            descending,
            offset,
            size,
        })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 64,
            max_shrink_iters: 256,
        }
    }
}

impl PropTestConfig {
    /// Few cases; for tests that touch the filesystem.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 16,
            max_shrink_iters: 64,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
