//! Verify command implementation.

use super::read_index;
use docstore_core::{document_id, EntityId};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of index documents checked.
    pub entries_checked: usize,
    /// Indexed IDs without a data file.
    pub missing_data: Vec<EntityId>,
    /// Data files without an index document.
    pub unindexed_data: Vec<EntityId>,
    /// Index documents without a valid ID.
    pub invalid_entries: usize,
}

impl VerifyResult {
    /// Returns true if index and data files agree.
    pub fn is_ok(&self) -> bool {
        self.missing_data.is_empty() && self.unindexed_data.is_empty() && self.invalid_entries == 0
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying collection at {}", path.display());
    println!();

    let result = verify(path)?;
    info!(
        entries = result.entries_checked,
        missing_data = result.missing_data.len(),
        unindexed_data = result.unindexed_data.len(),
        invalid_entries = result.invalid_entries,
        "verification finished"
    );
    println!("Entries checked: {}", result.entries_checked);
    for id in &result.missing_data {
        println!("  missing data file: {id}");
    }
    for id in &result.unindexed_data {
        println!("  data file not in index: {id}");
    }
    if result.invalid_entries > 0 {
        println!("  index documents without a valid Id: {}", result.invalid_entries);
    }

    println!();
    if result.is_ok() {
        println!("✓ Collection verification passed");
        Ok(())
    } else {
        warn!(path = %path.display(), "collection is inconsistent");
        println!("✗ Collection verification failed");
        Err("Verification failed".into())
    }
}

/// Cross-checks the index of the collection at `path` against its data files.
pub fn verify(path: &Path) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let (dir, docs) = read_index(path)?;
    let mut result = VerifyResult {
        entries_checked: docs.len(),
        ..VerifyResult::default()
    };

    let mut indexed = BTreeSet::new();
    for doc in &docs {
        match document_id(doc) {
            Some(id) => {
                indexed.insert(id);
            }
            None => result.invalid_entries += 1,
        }
    }

    let on_disk: BTreeSet<EntityId> = dir.list_data_ids()?.into_iter().collect();
    result.missing_data = indexed.difference(&on_disk).copied().collect();
    result.unindexed_data = on_disk.difference(&indexed).copied().collect();
    Ok(result)
}
