//! Directory-of-directories storage with backup siblings.
//!
//! Every entity owns one subdirectory of the storage root, named by its ID:
//!
//! ```text
//! <storage>/
//! ├─ <id>/            managed content
//! ├─ <id>_backup/     previous content while a replacement is in flight
//! └─ <id>_partial/    copy in progress, renamed into place when complete
//! ```
//!
//! A directory is never deleted before its replacement is in place. An
//! existing target is first renamed to its `_backup` sibling; the backup is
//! only discarded once the new content sits at the target path. A crash in
//! between leaves the backup behind for [`DirectoryStorage::restore_backups`].

use crate::error::{StoreError, StoreResult};
use docstore_core::EntityId;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Suffix of backup siblings.
pub const BACKUP_SUFFIX: &str = "_backup";
/// Suffix of copies in progress.
pub const PARTIAL_SUFFIX: &str = "_partial";

/// One subdirectory of the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDirectory {
    /// Full path.
    pub path: PathBuf,
    /// The ID the directory name parses to, if any.
    pub id: Option<EntityId>,
}

/// Manages the per-entity directories under one storage root.
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    root: PathBuf,
}

impl DirectoryStorage {
    /// Opens the storage root, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Returns the storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the managed directory of `id`.
    pub fn path_for(&self, id: EntityId) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Returns true if the managed directory of `id` exists.
    pub fn contains(&self, id: EntityId) -> bool {
        self.path_for(id).is_dir()
    }

    /// Lists content directories, skipping backup and partial siblings.
    ///
    /// Sorted by path.
    pub fn list(&self) -> StoreResult<Vec<StoredDirectory>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(BACKUP_SUFFIX) || name.ends_with(PARTIAL_SUFFIX) {
                continue;
            }
            dirs.push(StoredDirectory {
                path: entry.path(),
                id: EntityId::parse(&name),
            });
        }
        dirs.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(dirs)
    }

    /// Moves `source` to the managed directory of `id`.
    ///
    /// Existing content at the target is kept as a backup until the move
    /// has completed, and put back if it fails.
    pub fn move_into(&self, source: &Path, id: EntityId) -> StoreResult<PathBuf> {
        let target = self.path_for(id);
        if source == target {
            return Ok(target);
        }
        self.replace(&target, |target| fs::rename(source, target))?;
        debug!(id = %id, source = %source.display(), "moved directory into storage");
        Ok(target)
    }

    /// Copies `source` to the managed directory of `id`.
    ///
    /// The copy is assembled in a `_partial` sibling and renamed into place,
    /// so the target never holds half-copied content.
    pub fn copy_into(&self, source: &Path, id: EntityId) -> StoreResult<PathBuf> {
        let target = self.path_for(id);
        let partial = sibling(&target, PARTIAL_SUFFIX);
        remove_if_exists(&partial)?;

        if let Err(e) = copy_dir(source, &partial) {
            let _ = remove_if_exists(&partial);
            return Err(e.into());
        }
        self.replace(&target, |target| fs::rename(&partial, target))?;
        debug!(id = %id, source = %source.display(), "copied directory into storage");
        Ok(target)
    }

    /// Deletes the managed directory of `id`. Returns false if absent.
    pub fn delete(&self, id: EntityId) -> StoreResult<bool> {
        remove_if_exists(&self.path_for(id))
    }

    /// Deletes a directory under the storage root.
    pub fn delete_path(&self, path: &Path) -> StoreResult<bool> {
        if !path.starts_with(&self.root) || path == self.root {
            return Err(StoreError::storage(path, "not inside the storage root"));
        }
        remove_if_exists(path)
    }

    /// Wipes and recreates the storage root.
    pub fn delete_all(&self) -> StoreResult<()> {
        remove_if_exists(&self.root)?;
        fs::create_dir_all(&self.root)?;
        info!(root = %self.root.display(), "storage wiped");
        Ok(())
    }

    /// Resolves leftovers of interrupted moves and copies.
    ///
    /// A backup whose target exists is stale and discarded: renames are
    /// atomic, so the target holds the completed replacement. A backup
    /// without a target is renamed back. Partial copies are discarded.
    /// Returns how many backups were renamed back.
    pub fn restore_backups(&self) -> StoreResult<usize> {
        let mut restored = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();

            if name.ends_with(PARTIAL_SUFFIX) {
                warn!(path = %path.display(), "discarding partial copy");
                remove_if_exists(&path)?;
            } else if let Some(base) = name.strip_suffix(BACKUP_SUFFIX) {
                let target = self.root.join(base);
                if target.exists() {
                    debug!(path = %path.display(), "discarding stale backup");
                    remove_if_exists(&path)?;
                } else {
                    fs::rename(&path, &target)?;
                    info!(target = %target.display(), "restored directory from backup");
                    restored += 1;
                }
            }
        }
        Ok(restored)
    }

    fn replace(
        &self,
        target: &Path,
        place: impl FnOnce(&Path) -> io::Result<()>,
    ) -> StoreResult<()> {
        let backup = sibling(target, BACKUP_SUFFIX);
        let had_target = target.exists();
        if had_target {
            remove_if_exists(&backup)?;
            fs::rename(target, &backup)?;
        }

        if let Err(e) = place(target) {
            if had_target {
                let _ = remove_if_exists(target);
                if let Err(restore) = fs::rename(&backup, target) {
                    warn!(
                        target = %target.display(),
                        error = %restore,
                        "could not restore backup, left in place"
                    );
                }
            }
            return Err(e.into());
        }

        if had_target {
            remove_if_exists(&backup)?;
        }
        Ok(())
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

fn remove_if_exists(path: &Path) -> StoreResult<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Recursively copies a directory tree.
pub(crate) fn copy_dir(source: &Path, target: &Path) -> io::Result<()> {
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let destination = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &destination)?;
        } else {
            fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}
