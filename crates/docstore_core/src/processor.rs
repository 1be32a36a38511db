//! Lock-owning access layer for one collection.
//!
//! The [`Processor`] owns the collection's on-disk layout and its in-memory
//! [`Index`]. Every read and write of either goes through one mutex, so index
//! mutations and the matching data file writes are never observably
//! interleaved with another operation.
//!
//! Callers that need several steps to be atomic use
//! [`Processor::while_locked`], which hands out a [`ProcessorGuard`]. The
//! guard exposes the same operations without re-acquiring the lock, so code
//! that already holds it cannot deadlock itself.

use crate::config::Config;
use crate::dir::CollectionDir;
use crate::entity::{document_id, Entity, EntityId};
use crate::error::{CoreError, CoreResult};
use crate::index::Index;
use docstore_codec::{decode_documents, encode_documents, Document};
use parking_lot::{Mutex, MutexGuard};
use std::fs;
use std::marker::PhantomData;
use std::time::SystemTime;
use tracing::{debug, info};

/// A record ready to be written: both serialized forms, computed up front.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRecord {
    /// Entity ID.
    pub id: EntityId,
    /// Full serialized form.
    pub bytes: Vec<u8>,
    /// Index projection, ID field included.
    pub index: Document,
}

impl PendingRecord {
    /// Serializes both forms of `entity`.
    ///
    /// # Errors
    ///
    /// Propagates the entity's encoding error.
    pub fn from_entity<T: Entity>(entity: &T) -> CoreResult<Self> {
        Ok(Self {
            id: entity.entity_id(),
            bytes: entity.encode()?,
            index: entity.stamped_index(),
        })
    }
}

/// Metadata of the index file, refreshed after every load and save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexFileInfo {
    /// Size in bytes.
    pub len: u64,
    /// Last modification time, where the platform reports one.
    pub modified: Option<SystemTime>,
}

#[derive(Debug, Default)]
struct ProcessorState {
    index: Index,
    index_info: Option<IndexFileInfo>,
    disposed: bool,
}

/// Owns the index file, the data files and the lock for one collection.
pub struct Processor<T: Entity> {
    dir: CollectionDir,
    config: Config,
    state: Mutex<ProcessorState>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Processor<T> {
    /// Opens the collection layout with an empty in-memory index.
    ///
    /// Call [`Processor::load_index`] or [`Processor::rebuild_index`] to
    /// populate it.
    pub fn open(dir: CollectionDir, config: Config) -> CoreResult<Self> {
        let dir = CollectionDir::open(dir.path(), config.create_if_missing)?;
        Ok(Self {
            dir,
            config,
            state: Mutex::new(ProcessorState::default()),
            _marker: PhantomData,
        })
    }

    /// Returns the collection layout.
    pub fn dir(&self) -> &CollectionDir {
        &self.dir
    }

    /// Returns the configuration the processor was opened with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Acquires the lock.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Disposed`] after [`Processor::dispose`].
    pub fn lock(&self) -> CoreResult<ProcessorGuard<'_, T>> {
        let state = self.state.lock();
        if state.disposed {
            return Err(CoreError::disposed("processor"));
        }
        Ok(ProcessorGuard {
            processor: self,
            state,
        })
    }

    /// Runs `action` while holding the lock.
    ///
    /// Everything `action` does through the guard is atomic with respect to
    /// every other processor operation.
    pub fn while_locked<R, E>(
        &self,
        action: impl FnOnce(&mut ProcessorGuard<'_, T>) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<CoreError>,
    {
        let mut guard = self.lock()?;
        action(&mut guard)
    }

    /// Replaces the index with the content of the index file.
    pub fn load_index(&self) -> CoreResult<()> {
        self.lock()?.load_index()
    }

    /// Writes the full current index to the index file.
    pub fn save_index(&self) -> CoreResult<()> {
        self.lock()?.save_index()
    }

    /// Replaces the index by parsing every data file.
    pub fn rebuild_index(&self) -> CoreResult<()> {
        self.lock()?.rebuild_index()
    }

    /// Updates the index for, then writes, every record.
    pub fn write_data(&self, records: &[PendingRecord]) -> CoreResult<()> {
        self.lock()?.write_data(records)
    }

    /// Removes the index entries and data files of `ids`.
    pub fn remove_data(&self, ids: &[EntityId]) -> CoreResult<usize> {
        self.lock()?.remove_data(ids)
    }

    /// Reads the full serialized form of one record.
    pub fn load_raw(&self, id: EntityId) -> CoreResult<Vec<u8>> {
        self.lock()?.load_raw(id)
    }

    /// Reads and decodes one record.
    pub fn load_data(&self, id: EntityId) -> CoreResult<T> {
        self.lock()?.load_data(id)
    }

    /// Returns a copy of every index document.
    pub fn snapshot(&self) -> CoreResult<Vec<Document>> {
        Ok(self.lock()?.index().get_all())
    }

    /// Returns the index document for `id`, if indexed.
    pub fn get(&self, id: EntityId) -> CoreResult<Option<Document>> {
        Ok(self.lock()?.index().get(id).cloned())
    }

    /// Number of indexed records.
    pub fn len(&self) -> CoreResult<usize> {
        Ok(self.lock()?.index().len())
    }

    /// Returns true if nothing is indexed.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.lock()?.index().is_empty())
    }

    /// Metadata of the index file as of the last load or save.
    pub fn index_file_info(&self) -> CoreResult<Option<IndexFileInfo>> {
        Ok(self.lock()?.state.index_info)
    }

    /// Makes the processor unusable. Idempotent.
    pub fn dispose(&self) {
        let mut state = self.state.lock();
        if !state.disposed {
            state.disposed = true;
            state.index.clear();
            debug!(root = %self.dir.path().display(), "processor disposed");
        }
    }

    /// Returns true once disposed.
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }
}

impl<T: Entity> std::fmt::Debug for Processor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("root", &self.dir.path())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

/// Proof that the processor lock is held.
///
/// Obtained from [`Processor::lock`] or inside [`Processor::while_locked`].
/// The lock is released when the guard is dropped.
pub struct ProcessorGuard<'a, T: Entity> {
    processor: &'a Processor<T>,
    state: MutexGuard<'a, ProcessorState>,
}

impl<T: Entity> ProcessorGuard<'_, T> {
    /// Returns the in-memory index.
    pub fn index(&self) -> &Index {
        &self.state.index
    }

    /// Replaces the index with the content of the index file.
    ///
    /// A missing index file loads as an empty index.
    pub fn load_index(&mut self) -> CoreResult<()> {
        let dir = &self.processor.dir;
        let docs = decode_documents(&dir.read_index()?)?;
        let index = Index::from_documents(docs)?;

        debug!(entries = index.len(), root = %dir.path().display(), "loaded index");
        self.state.index = index;
        self.refresh_index_info();
        Ok(())
    }

    /// Writes the full current index to the index file.
    pub fn save_index(&mut self) -> CoreResult<()> {
        let docs = self.state.index.get_all();
        let bytes = encode_documents(&docs)?;
        self.processor
            .dir
            .write_index(&bytes, self.processor.config.sync_writes)?;

        debug!(entries = docs.len(), bytes = bytes.len(), "saved index");
        self.refresh_index_info();
        Ok(())
    }

    /// Replaces the index by parsing every data file.
    ///
    /// On failure the previous index is kept.
    pub fn rebuild_index(&mut self) -> CoreResult<()> {
        let processor = self.processor;
        let index = Index::rebuild::<T>(&processor.dir, processor.config.rebuild_chunk_size)?;

        info!(entries = index.len(), root = %processor.dir.path().display(), "index rebuilt");
        self.state.index = index;
        Ok(())
    }

    /// Updates the index for, then writes, every record.
    ///
    /// All index entries are updated before any data file is written. If a
    /// write fails, entries of the records not yet written are put back to
    /// what they were before the call.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`], before touching anything, if
    /// a record's index document names a different ID than the record.
    pub fn write_data(&mut self, records: &[PendingRecord]) -> CoreResult<()> {
        if let Some(record) = records
            .iter()
            .find(|record| document_id(&record.index) != Some(record.id))
        {
            return Err(CoreError::invalid_operation(format!(
                "index document of record {} carries a different Id",
                record.id
            )));
        }

        let mut previous = Vec::with_capacity(records.len());
        for record in records {
            let old = self.state.index.get(record.id).cloned();
            self.state.index.set(record.index.clone())?;
            previous.push(old);
        }

        let sync = self.processor.config.sync_writes;
        for (written, record) in records.iter().enumerate() {
            if let Err(e) = self.processor.dir.write_data(record.id, &record.bytes, sync) {
                for (record, old) in records.iter().zip(previous).skip(written) {
                    match old {
                        Some(doc) => {
                            self.state.index.set(doc)?;
                        }
                        None => {
                            self.state.index.remove(record.id);
                        }
                    }
                }
                return Err(e);
            }
        }

        debug!(records = records.len(), "wrote data");
        Ok(())
    }

    /// Replaces the index document of an indexed record, leaving its data
    /// file alone.
    ///
    /// Returns false if the document's ID is not indexed.
    pub fn update_index(&mut self, doc: Document) -> CoreResult<bool> {
        let indexed = document_id(&doc).is_some_and(|id| self.state.index.contains(id));
        if indexed {
            self.state.index.set(doc)?;
        }
        Ok(indexed)
    }

    /// Serializes and writes entities.
    pub fn write_entities(&mut self, entities: &[T]) -> CoreResult<()> {
        let records = entities
            .iter()
            .map(PendingRecord::from_entity)
            .collect::<CoreResult<Vec<_>>>()?;
        self.write_data(&records)
    }

    /// Removes the index entries and data files of `ids`.
    ///
    /// Returns how many IDs were indexed.
    pub fn remove_data(&mut self, ids: &[EntityId]) -> CoreResult<usize> {
        let mut removed = 0;
        for &id in ids {
            if self.state.index.remove(id).is_some() {
                removed += 1;
            }
            self.processor.dir.remove_data(id)?;
        }

        debug!(requested = ids.len(), removed, "removed data");
        Ok(removed)
    }

    /// Reads the full serialized form of one record.
    pub fn load_raw(&self, id: EntityId) -> CoreResult<Vec<u8>> {
        self.processor.dir.read_data(id)
    }

    /// Reads and decodes one record.
    pub fn load_data(&self, id: EntityId) -> CoreResult<T> {
        T::decode(&self.load_raw(id)?)
    }

    fn refresh_index_info(&mut self) {
        self.state.index_info = fs::metadata(self.processor.dir.index_path())
            .ok()
            .map(|meta| IndexFileInfo {
                len: meta.len(),
                modified: meta.modified().ok(),
            });
    }
}
