//! Contracts for entities backed by a managed directory.

use crate::error::StoreResult;
use docstore_core::{CoreResult, Entity, EntityId, PendingRecord, HASH_FIELD};
use std::path::{Path, PathBuf};

/// An entity whose content lives in a directory under the store's storage root.
///
/// The content hash is computed once, when the entity is parsed from its
/// directory, and is what import deduplication compares. The store always
/// recomputes the directory as `<storage root>/<Id>` after loading; a
/// serialized directory path is never trusted.
///
/// The store records [`HASH_FIELD`] in the index projection on every write,
/// and puts it back on reload when an index rebuilt from data files lacks
/// it. Implementations do not need to return it from
/// [`Entity::index_document`].
pub trait DirectoryEntity: Entity {
    /// Content hash of the directory this entity was parsed from.
    fn hash_code(&self) -> &str;

    /// The managed directory, once assigned.
    fn directory(&self) -> Option<&Path>;

    /// Assigns the identity and managed directory of the entity.
    fn assign(&mut self, id: EntityId, directory: PathBuf);
}

/// Turns a directory into an entity.
///
/// Returns `Ok(None)` when the directory does not hold a recognisable entity.
/// The returned entity carries its content hash; its ID and directory are
/// assigned by the store.
///
/// Closures with the matching signature are parsers too.
pub trait DirectoryParser<T: DirectoryEntity>: Send + Sync {
    /// Parses the directory at `directory`.
    fn parse(&self, directory: &Path) -> StoreResult<Option<T>>;
}

impl<T, F> DirectoryParser<T> for F
where
    T: DirectoryEntity,
    F: Fn(&Path) -> StoreResult<Option<T>> + Send + Sync,
{
    fn parse(&self, directory: &Path) -> StoreResult<Option<T>> {
        self(directory)
    }
}

/// Builds the pending record for a directory entity, hash field included.
pub(crate) fn directory_record<T: DirectoryEntity>(entity: &T) -> CoreResult<PendingRecord> {
    let mut record = PendingRecord::from_entity(entity)?;
    record.index.insert(HASH_FIELD, entity.hash_code());
    Ok(record)
}
