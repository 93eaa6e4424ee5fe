//! Persisted index format
//!
//! One meta-document per collection:
//!
//! ```text
//! {
//!   "collection": "users",
//!   "ids": {
//!     "42": {"id": "42", "created": "...", "updated": "...", "extractedValues": {...}}
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapter::{AdapterError, AdapterResult, Document, DocumentId, IndexValues};

/// Index record of one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub id: DocumentId,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub extracted_values: IndexValues,
}

/// Index of one collection, entries sorted by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub collection: String,
    #[serde(default)]
    pub ids: BTreeMap<DocumentId, IndexEntry>,
}

impl IndexDocument {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ids: BTreeMap::new(),
        }
    }

    /// Insert or refresh an entry; `created` survives updates.
    pub fn upsert(&mut self, id: &DocumentId, extracted_values: IndexValues, now: DateTime<Utc>) {
        let created = self.ids.get(id).map_or(now, |entry| entry.created);
        self.ids.insert(
            id.clone(),
            IndexEntry {
                id: id.clone(),
                created,
                updated: now,
                extracted_values,
            },
        );
    }

    pub fn remove(&mut self, id: &DocumentId) -> Option<IndexEntry> {
        self.ids.remove(id)
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.ids.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn to_document(&self) -> AdapterResult<Document> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(AdapterError::normalization_failed("index did not encode to an object")),
            Err(e) => Err(AdapterError::normalization_failed(e.to_string()).with_source(e)),
        }
    }

    pub fn from_document(document: Document) -> AdapterResult<Self> {
        serde_json::from_value(Value::Object(document))
            .map_err(|e| AdapterError::normalization_failed(format!("invalid index document: {}", e)).with_source(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_upsert_keeps_created() {
        let mut index = IndexDocument::new("users");
        let id = DocumentId::from(1);
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(10);

        index.upsert(&id, IndexValues::new(), t0);
        index.upsert(&id, IndexValues::new(), t1);

        let entry = &index.ids[&id];
        assert_eq!(entry.created, t0);
        assert_eq!(entry.updated, t1);
    }

    #[test]
    fn test_document_round_trip_uses_camel_case() {
        let mut index = IndexDocument::new("users");
        let mut values = IndexValues::new();
        values.insert("type".to_string(), json!("foo"));
        index.upsert(&DocumentId::from(42), values, Utc::now());

        let doc = index.to_document().unwrap();
        assert_eq!(doc["collection"], json!("users"));
        assert_eq!(doc["ids"]["42"]["extractedValues"]["type"], json!("foo"));
        assert_eq!(IndexDocument::from_document(doc).unwrap(), index);
    }

    #[test]
    fn test_entries_iterate_in_id_order() {
        let mut index = IndexDocument::new("c");
        for id in [10, 9, 100] {
            index.upsert(&DocumentId::from(id), IndexValues::new(), Utc::now());
        }
        let ids: Vec<_> = index.ids.keys().map(|id| id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["9", "10", "100"]);
    }

    #[test]
    fn test_rejects_foreign_document() {
        let doc = json!({"ids": 3}).as_object().cloned().unwrap();
        assert!(IndexDocument::from_document(doc).is_err());
    }
}
