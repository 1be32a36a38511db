//! Inspect command implementation.

use super::read_index;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Collection inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Collection path.
    pub path: String,
    /// Number of index documents.
    pub index_entries: usize,
    /// Index file size in bytes.
    pub index_size: u64,
    /// Number of data files.
    pub data_files: usize,
    /// Total size of the data files in bytes.
    pub data_size: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

/// Collects statistics about the collection at `path`.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let (dir, docs) = read_index(path)?;

    let index_size = fs::metadata(dir.index_path()).map(|m| m.len()).unwrap_or(0);
    let ids = dir.list_data_ids()?;
    let mut data_size = 0;
    for &id in &ids {
        data_size += fs::metadata(dir.data_path(id))?.len();
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        index_entries: docs.len(),
        index_size,
        data_files: ids.len(),
        data_size,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("Docstore Collection Inspection");
    println!("==============================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Index:");
    println!("  Entries: {}", result.index_entries);
    println!("  Size:    {} bytes", result.index_size);
    println!();
    println!("Data:");
    println!("  Files:   {}", result.data_files);
    println!("  Size:    {} bytes", result.data_size);
}
