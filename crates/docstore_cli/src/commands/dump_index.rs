//! Dump-index command implementation.

use super::read_index;
use docstore_codec::{Document, Value};
use serde_json::{json, Map};
use std::path::Path;

/// Runs the dump-index command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_, docs) = read_index(path)?;
    let limit = limit.unwrap_or(docs.len());

    match format {
        "json" => {
            let docs: Vec<_> = docs.iter().take(limit).map(document_to_json).collect();
            println!("{}", serde_json::to_string_pretty(&docs)?);
        }
        _ => {
            println!("Index documents: {}", docs.len());
            println!();
            for (i, doc) in docs.iter().take(limit).enumerate() {
                println!("[{i}]");
                for (field, value) in doc {
                    println!("  {field}: {value}");
                }
            }
        }
    }
    Ok(())
}

/// Converts an index document to JSON. Bytes become lowercase hex strings.
pub fn document_to_json(doc: &Document) -> serde_json::Value {
    let fields: Map<String, serde_json::Value> = doc
        .iter()
        .map(|(field, value)| (field.clone(), value_to_json(value)))
        .collect();
    serde_json::Value::Object(fields)
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Integer(i) => json!(i),
        Value::Text(s) => json!(s),
        Value::Bytes(bytes) => json!(bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_every_value_kind() {
        let doc = Document::new()
            .with("Id", "abc")
            .with("Priority", 3i64)
            .with("Done", true)
            .with("Blob", vec![0xde_u8, 0xad])
            .with("Tags", vec![Value::from("a"), Value::Null]);

        assert_eq!(
            document_to_json(&doc),
            json!({
                "Id": "abc",
                "Priority": 3,
                "Done": true,
                "Blob": "dead",
                "Tags": ["a", null],
            })
        );
    }
}
