//! Read-through fallback middleware
//!
//! Reads try the primary (fast) tier first and fall back to the secondary
//! (authoritative) tier. With resync enabled, a document found only in the
//! secondary is written back into the primary, and mutations keep the
//! primary coherent.

use super::passthrough::PassThroughAdapter;
use crate::adapter::{
    AdapterError, AdapterResult, CollectionIter, Document, DocumentFilter, DocumentId,
    DocumentIter, SharedAdapter, StorageAdapter,
};
use crate::observability::{log_event, Event};

#[derive(Debug)]
pub struct FallbackAdapter {
    primary: SharedAdapter,
    /// Forwards to the secondary tier
    secondary: PassThroughAdapter,
    resync: bool,
}

impl FallbackAdapter {
    pub fn new(primary: SharedAdapter, secondary: SharedAdapter, resync: bool) -> Self {
        Self {
            primary,
            secondary: PassThroughAdapter::new(secondary),
            resync,
        }
    }

    pub fn resync_enabled(&self) -> bool {
        self.resync
    }

    /// Read from the secondary and, with resync, copy into the primary.
    ///
    /// Missing source data stays NotFound; a failed copy is ReplicationFailed.
    fn sync_primary(&self, collection: &str, id: &DocumentId) -> AdapterResult<Document> {
        let data = self.secondary.read(collection, id)?;

        if self.resync {
            self.primary.write(collection, id, &data).map_err(|e| {
                AdapterError::replication_failed("write", collection, id, e)
            })?;
            log_event(Event::FallbackResync, &[("collection", collection), ("id", id.as_str())]);
        }
        Ok(data)
    }
}

impl StorageAdapter for FallbackAdapter {
    fn write(&self, collection: &str, id: &DocumentId, data: &Document) -> AdapterResult<()> {
        self.secondary.write(collection, id, data)?;
        if self.resync {
            self.primary
                .write(collection, id, data)
                .map_err(|e| AdapterError::replication_failed("write", collection, id, e))?;
        }
        Ok(())
    }

    fn read(&self, collection: &str, id: &DocumentId) -> AdapterResult<Document> {
        match self.primary.read(collection, id) {
            Err(e) if e.is_not_found() => self.sync_primary(collection, id),
            result => result,
        }
    }

    fn has(&self, collection: &str, id: &DocumentId) -> AdapterResult<bool> {
        if self.primary.has(collection, id)? {
            return Ok(true);
        }
        if self.secondary.has(collection, id)? {
            self.sync_primary(collection, id)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn delete(&self, collection: &str, id: &DocumentId) -> AdapterResult<()> {
        self.secondary.delete(collection, id)?;
        if self.resync && self.primary.has(collection, id)? {
            self.primary
                .delete(collection, id)
                .map_err(|e| AdapterError::replication_failed("delete", collection, id, e))?;
        }
        Ok(())
    }

    fn read_all<'a>(
        &'a self,
        collection: &str,
        filter: &'a dyn DocumentFilter,
    ) -> AdapterResult<DocumentIter<'a>> {
        match self.primary.read_all(collection, filter) {
            Err(e) if e.is_not_found() => self.secondary.read_all(collection, filter),
            result => result,
        }
    }

    fn list_collections(&self) -> AdapterResult<CollectionIter<'_>> {
        match self.primary.list_collections() {
            Err(e) if e.is_not_found() => self.secondary.list_collections(),
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AcceptAll, ErrorKind, MemoryAdapter};
    use crate::middleware::ReadOnlyAdapter;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn tiers() -> (Arc<MemoryAdapter>, Arc<MemoryAdapter>) {
        (Arc::new(MemoryAdapter::new()), Arc::new(MemoryAdapter::new()))
    }

    #[test]
    fn test_primary_wins() {
        let (primary, secondary) = tiers();
        let id = DocumentId::from(1);
        primary.write("test", &id, &doc(json!({"foo": "bar"}))).unwrap();
        secondary.write("test", &id, &doc(json!({"foo": "baz"}))).unwrap();

        let adapter = FallbackAdapter::new(primary, secondary, false);
        assert_eq!(adapter.read("test", &id).unwrap(), doc(json!({"foo": "bar"})));
    }

    #[test]
    fn test_secondary_read_without_resync() {
        let (primary, secondary) = tiers();
        let id = DocumentId::from(1);
        secondary.write("test", &id, &doc(json!({"foo": "bar"}))).unwrap();

        let adapter = FallbackAdapter::new(primary.clone(), secondary, false);
        assert_eq!(adapter.read("test", &id).unwrap(), doc(json!({"foo": "bar"})));
        assert!(!primary.has("test", &id).unwrap());
    }

    #[test]
    fn test_secondary_read_with_resync() {
        let (primary, secondary) = tiers();
        let id = DocumentId::from(1);
        secondary.write("test", &id, &doc(json!({"foo": "bar"}))).unwrap();

        let adapter = FallbackAdapter::new(primary.clone(), secondary, true);
        assert!(adapter.has("test", &id).unwrap());
        assert!(primary.has("test", &id).unwrap());
        assert_eq!(primary.read("test", &id).unwrap(), doc(json!({"foo": "bar"})));
    }

    #[test]
    fn test_missing_everywhere_is_not_found() {
        let (primary, secondary) = tiers();
        let adapter = FallbackAdapter::new(primary, secondary, true);
        let id = DocumentId::from(1);
        assert!(!adapter.has("test", &id).unwrap());
        assert!(adapter.read("test", &id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_failed_resync_is_replication_failure() {
        let (primary, secondary) = tiers();
        let id = DocumentId::from(1);
        secondary.write("test", &id, &doc(json!({"foo": "bar"}))).unwrap();

        let frozen = Arc::new(ReadOnlyAdapter::new(primary));
        let adapter = FallbackAdapter::new(frozen, secondary, true);
        let err = adapter.read("test", &id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReplicationFailed);
        assert_eq!(err.action(), Some("write"));
    }

    #[test]
    fn test_mutations_keep_primary_coherent() {
        let (primary, secondary) = tiers();
        let adapter = FallbackAdapter::new(primary.clone(), secondary.clone(), true);
        let id = DocumentId::from("k");

        adapter.write("c", &id, &doc(json!({"v": 1}))).unwrap();
        assert!(primary.has("c", &id).unwrap());
        assert!(secondary.has("c", &id).unwrap());

        adapter.delete("c", &id).unwrap();
        assert!(!primary.has("c", &id).unwrap());
        assert!(!secondary.has("c", &id).unwrap());
    }

    #[test]
    fn test_listing_falls_back_only_for_unknown_collection() {
        let (primary, secondary) = tiers();
        secondary.write("c", &DocumentId::from(1), &doc(json!({}))).unwrap();
        secondary.write("c", &DocumentId::from(2), &doc(json!({}))).unwrap();

        let adapter = FallbackAdapter::new(primary.clone(), secondary, false);
        assert_eq!(adapter.read_all("c", &AcceptAll).unwrap().count(), 2);

        primary.write("c", &DocumentId::from(1), &doc(json!({}))).unwrap();
        assert_eq!(adapter.read_all("c", &AcceptAll).unwrap().count(), 1);
    }
}
