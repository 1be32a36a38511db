//! # Docstore Codec
//!
//! Schema-less documents and their CBOR encoding.
//!
//! Index projections are [`Document`]s: ordered maps from field name to a
//! small tagged [`Value`]. Any entity can contribute any index fields without
//! a fixed schema, and documents encode deterministically so the on-disk
//! index is stable across rewrites.
//!
//! ## Usage
//!
//! ```
//! use docstore_codec::{decode_document, encode_document, Document, Value};
//!
//! let doc = Document::new().with("Id", "abc").with("Priority", 3i64);
//! let bytes = encode_document(&doc).unwrap();
//!
//! let decoded = decode_document(&bytes).unwrap();
//! assert_eq!(decoded["Priority"], Value::Integer(3));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod document;
mod error;
mod value;

pub use cbor::{
    decode_document, decode_documents, encode_document, encode_documents, from_cbor, to_cbor,
};
pub use document::Document;
pub use error::{CodecError, CodecResult};
pub use value::Value;
