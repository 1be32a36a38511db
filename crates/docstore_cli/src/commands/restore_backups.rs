//! Restore-backups command implementation.

use docstore_dirstore::DirectoryStorage;
use std::path::Path;
use tracing::info;

/// Runs the restore-backups command.
pub fn run(storage: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let restored = restore(storage)?;
    println!("Restored {restored} director{} from backup", if restored == 1 { "y" } else { "ies" });
    Ok(())
}

/// Resolves backup and partial siblings under `storage`.
///
/// Returns how many directories were renamed back.
pub fn restore(storage: &Path) -> Result<usize, Box<dyn std::error::Error>> {
    if !storage.is_dir() {
        return Err(format!("No storage directory at {}", storage.display()).into());
    }

    info!(storage = %storage.display(), "restoring backups");
    let restored = DirectoryStorage::open(storage)?.restore_backups()?;
    info!(restored, "backup restoration finished");
    Ok(restored)
}
