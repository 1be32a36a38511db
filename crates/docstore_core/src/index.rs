//! In-memory index of one collection.
//!
//! The index maps every entity ID to its index document. It is built either
//! from a previously saved index file, or by parsing every data file.

use crate::dir::CollectionDir;
use crate::entity::{document_id, Entity, EntityId};
use crate::error::{CoreError, CoreResult};
use docstore_codec::{Document, Value};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

/// ID → index document map for one collection.
///
/// The index is not synchronized on its own; the owning
/// [`crate::Processor`] only touches it while holding its lock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Index {
    entries: BTreeMap<EntityId, Document>,
}

impl Index {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from persisted documents.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] if a document has no valid ID.
    pub fn from_documents(docs: Vec<Document>) -> CoreResult<Self> {
        let mut index = Self::new();
        for doc in docs {
            index.set(doc)?;
        }
        Ok(index)
    }

    /// Rebuilds an index by parsing every data file of a collection.
    ///
    /// Data files are split into chunks of `chunk_size`; chunks are parsed
    /// concurrently and only merged once every chunk has succeeded.
    ///
    /// # Errors
    ///
    /// Any unreadable or unparsable data file fails the whole rebuild, as
    /// does a file whose content carries a different ID than its name.
    pub fn rebuild<T: Entity>(dir: &CollectionDir, chunk_size: usize) -> CoreResult<Self> {
        let ids = dir.list_data_ids()?;
        let chunk_size = chunk_size.max(1);

        let chunks = ids
            .par_chunks(chunk_size)
            .map(|chunk| index_chunk::<T>(dir, chunk))
            .collect::<CoreResult<Vec<_>>>()?;

        let mut index = Self::new();
        for (id, doc) in chunks.into_iter().flatten() {
            index.entries.insert(id, doc);
        }

        debug!(
            files = ids.len(),
            chunks = ids.len().div_ceil(chunk_size),
            "rebuilt index from data files"
        );
        Ok(index)
    }

    /// Inserts or replaces a document, keyed by its ID field.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] if the document has no valid ID.
    pub fn set(&mut self, doc: Document) -> CoreResult<()> {
        let id = document_id(&doc)
            .ok_or_else(|| CoreError::invalid_format("index document without a valid Id"))?;
        self.entries.insert(id, doc);
        Ok(())
    }

    /// Removes the entry for `id`.
    pub fn remove(&mut self, id: EntityId) -> Option<Document> {
        self.entries.remove(&id)
    }

    /// Removes the entry a document refers to.
    pub fn remove_document(&mut self, doc: &Document) -> Option<Document> {
        document_id(doc).and_then(|id| self.remove(id))
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Looks up the entry for `id`.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Document> {
        self.entries.get(&id)
    }

    /// Returns true if `id` is indexed.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Finds the first entry whose `field` equals `value`.
    #[must_use]
    pub fn find_by(&self, field: &str, value: &Value) -> Option<(EntityId, &Document)> {
        self.entries
            .iter()
            .find(|(_, doc)| doc.get(field) == Some(value))
            .map(|(id, doc)| (*id, doc))
    }

    /// Returns a snapshot copy of every document.
    #[must_use]
    pub fn get_all(&self) -> Vec<Document> {
        self.entries.values().cloned().collect()
    }

    /// Iterates over every document without copying.
    pub fn raw(&self) -> impl Iterator<Item = &Document> {
        self.entries.values()
    }

    /// Iterates over every indexed ID.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entries.keys().copied()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn index_chunk<T: Entity>(
    dir: &CollectionDir,
    chunk: &[EntityId],
) -> CoreResult<Vec<(EntityId, Document)>> {
    chunk
        .iter()
        .map(|&id| {
            let entity = T::decode(&dir.read_data(id)?)?;
            if entity.entity_id() != id {
                return Err(CoreError::invalid_format(format!(
                    "data file {id} contains entity {}",
                    entity.entity_id()
                )));
            }
            Ok((id, entity.stamped_index()))
        })
        .collect()
}
