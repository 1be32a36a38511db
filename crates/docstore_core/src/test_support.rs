//! Entity fixture shared by the unit tests of this crate.

use crate::entity::{Entity, EntityId};
use crate::error::CoreResult;
use docstore_codec::{from_cbor, to_cbor, Document};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: EntityId,
    pub name: String,
    pub rank: i64,
    pub body: String,
}

impl Item {
    pub fn new(name: &str, rank: i64) -> Self {
        Self {
            id: EntityId::new(),
            name: name.to_string(),
            rank,
            body: format!("body of {name}"),
        }
    }
}

impl Entity for Item {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn encode(&self) -> CoreResult<Vec<u8>> {
        Ok(to_cbor(self)?)
    }

    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        Ok(from_cbor(bytes)?)
    }

    fn index_document(&self) -> Document {
        Document::new()
            .with("Name", self.name.as_str())
            .with("Rank", self.rank)
    }
}
