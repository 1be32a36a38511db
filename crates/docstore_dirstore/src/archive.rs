//! Archive extraction for imports.
//!
//! Archives are tar files, optionally zstd-compressed. Compression is
//! detected from the zstd frame magic, not from the file name.

use crate::error::{StoreError, StoreResult};
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};
use tracing::debug;

/// Magic number opening every zstd frame.
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Returns true if `bytes` start with a zstd frame.
pub fn is_zstd(bytes: &[u8]) -> bool {
    bytes.starts_with(&ZSTD_MAGIC)
}

/// Extracts `archive` into `destination`.
///
/// Only directories and regular files are extracted; links and special
/// files are skipped.
///
/// # Errors
///
/// Returns [`StoreError::NotImportable`] if the archive cannot be read or
/// decompressed, or if an entry would land outside `destination`.
pub fn extract_archive(archive: &Path, destination: &Path) -> StoreResult<usize> {
    let mut file = File::open(archive).map_err(|e| {
        StoreError::not_importable(format!("cannot open {}: {e}", archive.display()))
    })?;

    let mut magic = [0u8; 4];
    let read = read_prefix(&mut file, &mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    let reader = BufReader::new(file);
    let extracted = if is_zstd(&magic[..read]) {
        let decoder = zstd::Decoder::new(reader)
            .map_err(|e| StoreError::not_importable(format!("zstd decode: {e}")))?;
        unpack(Archive::new(decoder), destination)?
    } else {
        unpack(Archive::new(reader), destination)?
    };

    debug!(
        archive = %archive.display(),
        entries = extracted,
        "extracted archive"
    );
    Ok(extracted)
}

fn read_prefix(file: &mut File, buf: &mut [u8]) -> StoreResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

fn unpack<R: Read>(mut archive: Archive<R>, destination: &Path) -> StoreResult<usize> {
    fs::create_dir_all(destination)?;
    let mut extracted = 0;

    let entries = archive
        .entries()
        .map_err(|e| StoreError::not_importable(format!("tar: {e}")))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| StoreError::not_importable(format!("tar: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| StoreError::not_importable(format!("tar path: {e}")))?
            .into_owned();
        let target = confined_path(destination, &path)?;

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&target)?;
            }
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                entry.unpack(&target).map_err(|e| {
                    StoreError::not_importable(format!("unpack {}: {e}", path.display()))
                })?;
                extracted += 1;
            }
            other => {
                debug!(path = %path.display(), kind = ?other, "skipping archive entry");
            }
        }
    }
    Ok(extracted)
}

/// Resolves an archive entry path under `destination`.
///
/// Absolute paths and parent components are rejected.
fn confined_path(destination: &Path, entry: &Path) -> StoreResult<PathBuf> {
    let mut target = destination.to_path_buf();
    for component in entry.components() {
        match component {
            Component::Normal(part) => target.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(StoreError::not_importable(format!(
                    "entry escapes the archive root: {}",
                    entry.display()
                )));
            }
        }
    }
    Ok(target)
}
