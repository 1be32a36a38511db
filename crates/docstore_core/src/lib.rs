//! # Docstore Core
//!
//! Embedded, file-backed document store for one entity type per collection.
//!
//! This crate provides:
//! - The [`Entity`] contract: an ID, a full serialized form and an index projection
//! - An in-memory [`Index`], loadable from `index.dbi` or rebuilt from data files in parallel
//! - The [`Processor`], which serializes all index and data file access behind one lock
//! - Buffered, single-use [`Editor`]s and composable [`Query`] pipelines
//! - Forward-only [`DatabaseResult`] cursors
//! - The [`Database`] facade tying them together
//!
//! ## On-disk layout
//!
//! ```text
//! <root>/index.dbi         CBOR array of index documents
//! <root>/data/<id>.data    full serialized form of one entity
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod dir;
mod editor;
mod entity;
mod error;
mod index;
mod processor;
mod query;
mod result;

#[cfg(test)]
mod test_support;

pub use config::{Config, DEFAULT_REBUILD_CHUNK_SIZE};
pub use database::{Database, Lifecycle};
pub use dir::{sync_directory, write_atomic, CollectionDir, DATA_DIR, DATA_EXTENSION, INDEX_FILE};
pub use editor::{CommitSummary, Editor, EditorState};
pub use entity::{document_id, Entity, EntityId, HASH_FIELD, ID_FIELD};
pub use error::{CoreError, CoreResult};
pub use index::Index;
pub use processor::{IndexFileInfo, PendingRecord, Processor, ProcessorGuard};
pub use query::{Query, QueryEntry};
pub use result::{DatabaseResult, Records};

pub use docstore_codec::{Document, Value};
