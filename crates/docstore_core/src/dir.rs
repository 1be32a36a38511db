//! Collection directory management.
//!
//! This module handles the file system layout of one collection:
//!
//! ```text
//! <root>/
//! ├─ index.dbi          # CBOR array of index documents
//! └─ data/
//!    ├─ <id>.data       # full serialized form of one entity
//!    └─ ...
//! ```
//!
//! Every file is replaced with write-then-rename so a crash never leaves a
//! half-written index or record behind.

use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Name of the index file.
pub const INDEX_FILE: &str = "index.dbi";
/// Name of the data subdirectory.
pub const DATA_DIR: &str = "data";
/// Extension of per-record data files.
pub const DATA_EXTENSION: &str = "data";
const TEMP_EXTENSION: &str = "tmp";

/// The on-disk layout of a single collection.
#[derive(Debug, Clone)]
pub struct CollectionDir {
    root: PathBuf,
}

impl CollectionDir {
    /// Describes the layout rooted at `root` without touching the disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Opens the layout.
    ///
    /// With `create_if_missing` the root and `data/` are created as needed;
    /// without it nothing on disk is touched, and `data/` is created by the
    /// first data write.
    ///
    /// # Errors
    ///
    /// Returns an [`io::ErrorKind::NotFound`] error if the root does not
    /// exist and `create_if_missing` is false, [`CoreError::InvalidFormat`]
    /// if the root is not a directory, or any other I/O failure.
    pub fn open(root: impl Into<PathBuf>, create_if_missing: bool) -> CoreResult<Self> {
        let dir = Self::new(root);

        if !dir.root.exists() {
            if !create_if_missing {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("collection directory does not exist: {}", dir.root.display()),
                )
                .into());
            }
            fs::create_dir_all(&dir.root)?;
        }

        if !dir.root.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                dir.root.display()
            )));
        }

        if create_if_missing {
            fs::create_dir_all(dir.data_dir())?;
        }
        Ok(dir)
    }

    /// Returns the collection root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Returns the path to the index file.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    /// Returns the path to the data subdirectory.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    /// Returns the path of the data file for `id`.
    #[must_use]
    pub fn data_path(&self, id: EntityId) -> PathBuf {
        self.data_dir().join(format!("{id}.{DATA_EXTENSION}"))
    }

    /// Reads the raw index file. A missing file reads as empty.
    pub fn read_index(&self) -> CoreResult<Vec<u8>> {
        match fs::read(self.index_path()) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the index file.
    pub fn write_index(&self, bytes: &[u8], sync: bool) -> CoreResult<()> {
        write_atomic(&self.index_path(), bytes, sync)?;
        if sync {
            sync_directory(&self.root)?;
        }
        Ok(())
    }

    /// Returns true if an index file exists.
    #[must_use]
    pub fn has_index(&self) -> bool {
        self.index_path().is_file()
    }

    /// Reads the data file for `id`.
    ///
    /// # Errors
    ///
    /// A missing file is reported as [`CoreError::DataNotFound`]; the index
    /// promised the record exists, so this is never mapped to `None`.
    pub fn read_data(&self, id: EntityId) -> CoreResult<Vec<u8>> {
        match fs::read(self.data_path(id)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CoreError::DataNotFound { id }),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the data file for `id`.
    pub fn write_data(&self, id: EntityId, bytes: &[u8], sync: bool) -> CoreResult<()> {
        let data_dir = self.data_dir();
        if !data_dir.is_dir() {
            fs::create_dir_all(&data_dir)?;
        }
        write_atomic(&self.data_path(id), bytes, sync)
    }

    /// Deletes the data file for `id`. Returns false if it did not exist.
    pub fn remove_data(&self, id: EntityId) -> CoreResult<bool> {
        match fs::remove_file(self.data_path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists the IDs of all data files.
    ///
    /// Files whose stem is not an entity ID (temporaries, strays) are skipped.
    /// The result is sorted so rebuilds partition work deterministically.
    pub fn list_data_ids(&self) -> CoreResult<Vec<EntityId>> {
        let data_dir = self.data_dir();
        if !data_dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&data_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DATA_EXTENSION) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(EntityId::parse)
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Writes `bytes` to `path` through a temporary sibling and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8], sync: bool) -> CoreResult<()> {
    let temp_path = path.with_extension(TEMP_EXTENSION);

    let mut file = File::create(&temp_path)?;
    file.write_all(bytes)?;
    if sync {
        file.sync_all()?;
    }
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Syncs a directory so renames inside it are durable.
#[cfg(unix)]
pub fn sync_directory(path: &Path) -> CoreResult<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

/// Syncs a directory so renames inside it are durable.
///
/// NTFS journals metadata, so there is nothing to do here.
#[cfg(not(unix))]
pub fn sync_directory(_path: &Path) -> CoreResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_layout() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("notes");

        let dir = CollectionDir::open(&root, true).unwrap();
        assert!(root.is_dir());
        assert!(dir.data_dir().is_dir());
        assert!(!dir.has_index());
    }

    #[test]
    fn open_fails_if_not_exists_and_no_create() {
        let temp = tempdir().unwrap();
        let result = CollectionDir::open(temp.path().join("missing"), false);
        assert!(matches!(
            result,
            Err(CoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound
        ));
    }

    #[test]
    fn open_without_create_leaves_existing_root_alone() {
        let temp = tempdir().unwrap();
        let dir = CollectionDir::open(temp.path(), false).unwrap();

        assert!(!dir.data_dir().exists());
        assert!(dir.list_data_ids().unwrap().is_empty());

        let id = EntityId::new();
        dir.write_data(id, b"x", false).unwrap();
        assert_eq!(dir.read_data(id).unwrap(), b"x");
    }

    #[test]
    fn paths_are_correct() {
        let dir = CollectionDir::new("/db");
        let id = EntityId::from_bytes([0; 16]);

        assert_eq!(dir.index_path(), PathBuf::from("/db/index.dbi"));
        assert_eq!(
            dir.data_path(id),
            PathBuf::from("/db/data/00000000-0000-0000-0000-000000000000.data")
        );
    }

    #[test]
    fn missing_index_reads_empty() {
        let temp = tempdir().unwrap();
        let dir = CollectionDir::open(temp.path(), true).unwrap();
        assert!(dir.read_index().unwrap().is_empty());
    }

    #[test]
    fn missing_data_is_not_found() {
        let temp = tempdir().unwrap();
        let dir = CollectionDir::open(temp.path(), true).unwrap();
        let id = EntityId::new();
        assert!(matches!(
            dir.read_data(id),
            Err(CoreError::DataNotFound { id: missing }) if missing == id
        ));
    }

    #[test]
    fn data_write_read_remove() {
        let temp = tempdir().unwrap();
        let dir = CollectionDir::open(temp.path(), true).unwrap();
        let id = EntityId::new();

        dir.write_data(id, b"first", false).unwrap();
        dir.write_data(id, b"second", true).unwrap();
        assert_eq!(dir.read_data(id).unwrap(), b"second");
        assert_eq!(dir.list_data_ids().unwrap(), vec![id]);

        assert!(dir.remove_data(id).unwrap());
        assert!(!dir.remove_data(id).unwrap());
        assert!(dir.list_data_ids().unwrap().is_empty());
    }

    #[test]
    fn listing_skips_foreign_files() {
        let temp = tempdir().unwrap();
        let dir = CollectionDir::open(temp.path(), true).unwrap();
        let id = EntityId::new();
        dir.write_data(id, b"x", false).unwrap();
        fs::write(dir.data_dir().join("notes.txt"), b"?").unwrap();
        fs::write(dir.data_dir().join("garbage.data"), b"?").unwrap();
        fs::write(dir.data_dir().join(format!("{id}.tmp")), b"?").unwrap();

        assert_eq!(dir.list_data_ids().unwrap(), vec![id]);
    }

    #[test]
    fn index_write_leaves_no_temporary() {
        let temp = tempdir().unwrap();
        let dir = CollectionDir::open(temp.path(), true).unwrap();
        dir.write_index(b"abc", true).unwrap();

        assert_eq!(dir.read_index().unwrap(), b"abc");
        assert!(!temp.path().join("index.tmp").exists());
    }
}
