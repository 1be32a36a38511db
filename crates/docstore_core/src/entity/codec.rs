//! The contract every stored entity fulfils.

use crate::entity::EntityId;
use crate::error::CoreResult;
use docstore_codec::Document;

/// Index field holding the entity ID as hyphenated text.
pub const ID_FIELD: &str = "Id";

/// Conventional index field holding an entity's content hash.
pub const HASH_FIELD: &str = "HashCode";

/// Trait for types that can be stored in a [`crate::Database`].
///
/// Implementors must provide:
/// - `entity_id()`: the stable, immutable identifier
/// - `encode()` / `decode()`: the full serialized form written to the data file
/// - `index_document()`: the projection kept in memory for filtering and sorting
///
/// The projection must be derivable from the full form. The store stamps
/// [`ID_FIELD`] onto every projection it keeps, so implementations do not need
/// to include it themselves.
///
/// # Example
///
/// ```rust,ignore
/// use docstore_codec::{from_cbor, to_cbor, Document};
/// use docstore_core::{CoreResult, Entity, EntityId};
///
/// #[derive(serde::Serialize, serde::Deserialize)]
/// struct User {
///     id: EntityId,
///     name: String,
///     bio: String,
/// }
///
/// impl Entity for User {
///     fn entity_id(&self) -> EntityId {
///         self.id
///     }
///
///     fn encode(&self) -> CoreResult<Vec<u8>> {
///         Ok(to_cbor(self)?)
///     }
///
///     fn decode(bytes: &[u8]) -> CoreResult<Self> {
///         Ok(from_cbor(bytes)?)
///     }
///
///     fn index_document(&self) -> Document {
///         Document::new().with("Name", self.name.as_str())
///     }
/// }
/// ```
pub trait Entity: Sized + Send + Sync + 'static {
    /// Returns the entity's stable, immutable identifier.
    fn entity_id(&self) -> EntityId;

    /// Encodes the full form of the entity.
    fn encode(&self) -> CoreResult<Vec<u8>>;

    /// Decodes an entity from its full form.
    fn decode(bytes: &[u8]) -> CoreResult<Self>;

    /// Returns the index projection of the entity.
    fn index_document(&self) -> Document;

    /// Returns the projection with the [`ID_FIELD`] set to this entity's ID.
    fn stamped_index(&self) -> Document {
        self.index_document().with(ID_FIELD, self.entity_id())
    }
}

/// Reads the ID out of an index document.
///
/// Returns `None` when the field is missing or is not a valid ID.
pub fn document_id(doc: &Document) -> Option<EntityId> {
    doc.get_text(ID_FIELD).and_then(EntityId::parse)
}
