//! CLI command implementations.

pub mod dump_index;
pub mod inspect;
pub mod restore_backups;
pub mod verify;

use docstore_codec::{decode_documents, Document};
use docstore_core::CollectionDir;
use std::path::Path;

/// Opens an existing collection and decodes its index file.
pub(crate) fn read_index(
    path: &Path,
) -> Result<(CollectionDir, Vec<Document>), Box<dyn std::error::Error>> {
    let dir = CollectionDir::open(path, false)?;
    let docs = decode_documents(&dir.read_index()?)?;
    Ok((dir, docs))
}
