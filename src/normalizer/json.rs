//! JSON codec for stored documents

use serde_json::Value;

use crate::adapter::{AdapterError, AdapterResult, Document};

/// Encodes documents to UTF-8 JSON text and decodes them back.
#[derive(Debug, Clone, Copy)]
pub struct JsonCodec {
    pretty: bool,
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl JsonCodec {
    /// Pretty-printing codec (the on-disk default)
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-line codec
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    pub fn encode(&self, document: &Document) -> AdapterResult<Vec<u8>> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(document)
        } else {
            serde_json::to_vec(document)
        };
        encoded.map_err(|e| AdapterError::normalization_failed(e.to_string()).with_source(e))
    }

    /// Decode a stored payload.
    ///
    /// The payload must be a JSON object; an empty array is accepted as an
    /// empty document.
    pub fn decode(&self, bytes: &[u8]) -> AdapterResult<Document> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| AdapterError::normalization_failed(e.to_string()).with_source(e))?;

        match value {
            Value::Object(map) => Ok(map),
            Value::Array(items) if items.is_empty() => Ok(Document::new()),
            other => Err(AdapterError::normalization_failed(format!(
                "expected a JSON object, found {}",
                json_type_name(&other)
            ))),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
