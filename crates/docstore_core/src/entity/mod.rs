//! Entity identity and the stored-entity contract.

mod codec;
mod id;

pub use codec::{document_id, Entity, HASH_FIELD, ID_FIELD};
pub use id::EntityId;
