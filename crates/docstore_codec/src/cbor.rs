//! CBOR encoding of documents.
//!
//! Documents map onto CBOR maps with text keys. Values map onto the matching
//! CBOR major types; anything without a [`Value`] counterpart is rejected on
//! decode rather than silently converted.

use crate::document::Document;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use ciborium::value::{Integer, Value as Cbor};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode any serde value to CBOR bytes.
///
/// Entities typically use this for their full serialized form.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buf)
}

/// Decode a serde value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR for `T`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}

/// Encode one document as a CBOR map.
pub fn encode_document(doc: &Document) -> CodecResult<Vec<u8>> {
    to_cbor(&document_to_cbor(doc))
}

/// Decode one document from a CBOR map.
pub fn decode_document(bytes: &[u8]) -> CodecResult<Document> {
    let raw: Cbor = from_cbor(bytes)?;
    document_from_cbor(raw)
}

/// Encode a list of documents as a CBOR array of maps.
pub fn encode_documents(docs: &[Document]) -> CodecResult<Vec<u8>> {
    let array = Cbor::Array(docs.iter().map(document_to_cbor).collect());
    to_cbor(&array)
}

/// Decode a CBOR array of maps into documents.
///
/// An empty input decodes to an empty list.
pub fn decode_documents(bytes: &[u8]) -> CodecResult<Vec<Document>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    match from_cbor::<Cbor>(bytes)? {
        Cbor::Array(items) => items.into_iter().map(document_from_cbor).collect(),
        _ => Err(CodecError::invalid_structure("expected an array of documents")),
    }
}

fn document_to_cbor(doc: &Document) -> Cbor {
    Cbor::Map(
        doc.iter()
            .map(|(k, v)| (Cbor::Text(k.clone()), value_to_cbor(v)))
            .collect(),
    )
}

fn document_from_cbor(raw: Cbor) -> CodecResult<Document> {
    let Cbor::Map(pairs) = raw else {
        return Err(CodecError::invalid_structure("expected a map"));
    };

    let mut doc = Document::new();
    for (key, value) in pairs {
        let Cbor::Text(key) = key else {
            return Err(CodecError::invalid_structure("document keys must be text"));
        };
        doc.insert(key, value_from_cbor(value)?);
    }
    Ok(doc)
}

fn value_to_cbor(value: &Value) -> Cbor {
    match value {
        Value::Null => Cbor::Null,
        Value::Bool(b) => Cbor::Bool(*b),
        Value::Integer(n) => Cbor::Integer(Integer::from(*n)),
        Value::Text(s) => Cbor::Text(s.clone()),
        Value::Bytes(b) => Cbor::Bytes(b.clone()),
        Value::Array(items) => Cbor::Array(items.iter().map(value_to_cbor).collect()),
    }
}

fn value_from_cbor(raw: Cbor) -> CodecResult<Value> {
    match raw {
        Cbor::Null => Ok(Value::Null),
        Cbor::Bool(b) => Ok(Value::Bool(b)),
        Cbor::Integer(n) => i64::try_from(n)
            .map(Value::Integer)
            .map_err(|_| CodecError::unsupported_type("integer outside i64 range")),
        Cbor::Text(s) => Ok(Value::Text(s)),
        Cbor::Bytes(b) => Ok(Value::Bytes(b)),
        Cbor::Array(items) => items
            .into_iter()
            .map(value_from_cbor)
            .collect::<CodecResult<Vec<_>>>()
            .map(Value::Array),
        Cbor::Float(_) => Err(CodecError::unsupported_type("float")),
        Cbor::Tag(tag, _) => Err(CodecError::unsupported_type(format!("tag {tag}"))),
        Cbor::Map(_) => Err(CodecError::unsupported_type("nested map")),
        _ => Err(CodecError::unsupported_type("unknown")),
    }
}
