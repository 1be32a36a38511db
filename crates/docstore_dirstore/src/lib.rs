//! # Docstore Directory Store
//!
//! Content-addressed storage of directory-shaped entities on top of a
//! docstore collection.
//!
//! This crate provides:
//! - [`DirectoryStore`]: import of tar / tar.zst archives with hash-based
//!   deduplication, orphan adoption on reload, and self-healing reads
//! - [`DirectoryStorage`]: one directory per entity, replaced through backup
//!   siblings so an interrupted operation can be rolled back
//! - [`hash_directory`]: SHA-256 content hash of a directory tree
//! - [`ChangeFeed`]: notifications for committed additions and removals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docstore_dirstore::{DirectoryStore, StoreEvent};
//!
//! let store = DirectoryStore::open("packages", PackageParser)?;
//! let events = store.subscribe();
//!
//! let package = store.import(Path::new("download.tar.zst"))?;
//! assert!(matches!(events.recv()?, StoreEvent::Added { .. }));
//!
//! for package in store.get_all()? {
//!     println!("{} at {}", package.name, package.directory().unwrap().display());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod archive;
mod entity;
mod error;
mod feed;
mod hash;
mod storage;
mod store;

pub use archive::{extract_archive, is_zstd, ZSTD_MAGIC};
pub use entity::{DirectoryEntity, DirectoryParser};
pub use error::{StoreError, StoreResult};
pub use feed::{ChangeFeed, StoreEvent};
pub use hash::{hash_bytes, hash_directory};
pub use storage::{DirectoryStorage, StoredDirectory, BACKUP_SUFFIX, PARTIAL_SUFFIX};
pub use store::{
    DirectoryStore, ReloadSummary, StoreConfig, DATABASE_DIR, STAGING_DIR, STORAGE_DIR,
};
