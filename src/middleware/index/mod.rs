//! Indexing middleware
//!
//! Keeps, per collection, the sorted list of ids written through it (plus
//! extracted values) as one meta-document, so listings walk the index and
//! can reject candidates before reading their bodies.
//!
//! # Invariants
//!
//! - Index updates happen AFTER the inner write/delete succeeded
//! - Every index mutation is persisted before the call returns
//! - `has` and `read_all` see only indexed ids; documents written around
//!   this adapter stay invisible until the index is rebuilt
//! - An absent meta-document triggers a rebuild from the inner adapter
//!
//! # Rebuilds over files
//!
//! A rebuild keys entries by the ids the inner listing yields. File
//! adapters list the normalized on-disk names, so an id written as `Ann`
//! comes back as `ann`: after a rebuild `has("Ann")` is false while the
//! inner adapter still finds the file. Ids that are already normalized
//! (lower-case `[a-z0-9.+_]`) survive a rebuild unchanged.

mod entry;
mod extractor;

pub use entry::{IndexDocument, IndexEntry};
pub use extractor::{
    CallbackIndexValueExtractor, FieldIndexValueExtractor, IndexValueExtractor,
    NoIndexValueExtractor,
};

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::adapter::{
    meta_document_id, AcceptAll, AdapterError, AdapterResult, CollectionIter, Document,
    DocumentFilter, DocumentId, DocumentIter, SharedAdapter, StorageAdapter, META_COLLECTION,
};
use crate::observability::{log_event, Event};

const FEATURE: &str = "index";

/// Middleware maintaining a per-collection id index.
pub struct IndexAdapter {
    inner: SharedAdapter,
    meta_collection: String,
    extractor: Box<dyn IndexValueExtractor>,
    /// Loaded indexes; the keys are the known collections
    indexes: Mutex<HashMap<String, IndexDocument>>,
}

impl fmt::Debug for IndexAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexAdapter")
            .field("inner", &self.inner)
            .field("meta_collection", &self.meta_collection)
            .finish_non_exhaustive()
    }
}

impl IndexAdapter {
    /// Index stored in `.meta`, no extracted values.
    pub fn new(inner: SharedAdapter) -> Self {
        Self {
            inner,
            meta_collection: META_COLLECTION.to_string(),
            extractor: Box::new(NoIndexValueExtractor),
            indexes: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_meta_collection(mut self, meta_collection: impl Into<String>) -> Self {
        self.meta_collection = meta_collection.into();
        self
    }

    pub fn with_extractor(mut self, extractor: impl IndexValueExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn meta_collection(&self) -> &str {
        &self.meta_collection
    }

    /// Collections whose index is loaded in this process
    pub fn known_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock_indexes().keys().cloned().collect();
        names.sort();
        names
    }

    /// Forget and delete the index of a collection.
    ///
    /// The next index-dependent call rebuilds it.
    pub fn delete_index(&self, collection: &str) -> AdapterResult<()> {
        self.check_collection(collection)?;
        let mut indexes = self.lock_indexes();
        self.delete_index_locked(&mut indexes, collection)
    }

    /// Rebuild the index of a collection from the inner adapter.
    pub fn recreate_index(&self, collection: &str) -> AdapterResult<()> {
        self.check_collection(collection)?;
        let mut indexes = self.lock_indexes();
        self.delete_index_locked(&mut indexes, collection)?;
        self.loaded(&mut indexes, collection)?;
        Ok(())
    }

    /// Delete the indexes of every known collection.
    pub fn dispose(&self) -> AdapterResult<()> {
        let mut indexes = self.lock_indexes();
        let known: Vec<String> = indexes.keys().cloned().collect();
        for collection in known {
            self.delete_index_locked(&mut indexes, &collection)?;
        }
        Ok(())
    }

    /// Rebuild the indexes of every known collection.
    pub fn refresh(&self) -> AdapterResult<()> {
        let mut indexes = self.lock_indexes();
        let known: Vec<String> = indexes.keys().cloned().collect();
        for collection in known {
            self.delete_index_locked(&mut indexes, &collection)?;
            self.loaded(&mut indexes, &collection)?;
        }
        Ok(())
    }

    fn lock_indexes(&self) -> MutexGuard<'_, HashMap<String, IndexDocument>> {
        self.indexes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_collection(&self, collection: &str) -> AdapterResult<()> {
        if collection == self.meta_collection {
            return Err(AdapterError::reserved_collection(collection));
        }
        Ok(())
    }

    fn index_id(collection: &str) -> DocumentId {
        meta_document_id(collection, FEATURE)
    }

    fn delete_index_locked(
        &self,
        indexes: &mut HashMap<String, IndexDocument>,
        collection: &str,
    ) -> AdapterResult<()> {
        indexes.remove(collection);
        let id = Self::index_id(collection);
        if self.inner.has(&self.meta_collection, &id)? {
            self.inner.delete(&self.meta_collection, &id)?;
        }
        log_event(Event::IndexDeleted, &[("collection", collection)]);
        Ok(())
    }

    /// The loaded index of `collection`, reading or rebuilding it on first use.
    fn loaded<'m>(
        &self,
        indexes: &'m mut HashMap<String, IndexDocument>,
        collection: &str,
    ) -> AdapterResult<&'m mut IndexDocument> {
        if !indexes.contains_key(collection) {
            let id = Self::index_id(collection);
            let index = if self.inner.has(&self.meta_collection, &id)? {
                IndexDocument::from_document(self.inner.read(&self.meta_collection, &id)?)?
            } else {
                self.rebuild(collection)?
            };
            indexes.insert(collection.to_string(), index);
        }
        indexes
            .get_mut(collection)
            .ok_or_else(|| AdapterError::collection_not_found(collection))
    }

    fn rebuild(&self, collection: &str) -> AdapterResult<IndexDocument> {
        log_event(Event::IndexRebuildBegin, &[("collection", collection)]);

        let mut index = IndexDocument::new(collection);
        let now = Utc::now();
        match self.inner.read_all(collection, &AcceptAll) {
            Ok(documents) => {
                for item in documents {
                    let (id, document) = item?;
                    index.upsert(&id, self.extractor.extract(&document), now);
                }
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        self.persist(&index)?;

        log_event(
            Event::IndexRebuildComplete,
            &[("collection", collection), ("entries", &index.len().to_string())],
        );
        Ok(index)
    }

    fn persist(&self, index: &IndexDocument) -> AdapterResult<()> {
        self.inner.write(
            &self.meta_collection,
            &Self::index_id(&index.collection),
            &index.to_document()?,
        )
    }
}

impl StorageAdapter for IndexAdapter {
    fn write(&self, collection: &str, id: &DocumentId, data: &Document) -> AdapterResult<()> {
        self.check_collection(collection)?;
        self.inner.write(collection, id, data)?;

        let mut indexes = self.lock_indexes();
        let index = self.loaded(&mut indexes, collection)?;
        index.upsert(id, self.extractor.extract(data), Utc::now());
        self.persist(index)
    }

    fn read(&self, collection: &str, id: &DocumentId) -> AdapterResult<Document> {
        self.check_collection(collection)?;
        self.inner.read(collection, id)
    }

    fn has(&self, collection: &str, id: &DocumentId) -> AdapterResult<bool> {
        self.check_collection(collection)?;
        let mut indexes = self.lock_indexes();
        Ok(self.loaded(&mut indexes, collection)?.contains(id))
    }

    fn delete(&self, collection: &str, id: &DocumentId) -> AdapterResult<()> {
        self.check_collection(collection)?;
        self.inner.delete(collection, id)?;

        let mut indexes = self.lock_indexes();
        let index = self.loaded(&mut indexes, collection)?;
        index.remove(id);
        self.persist(index)
    }

    fn read_all<'a>(
        &'a self,
        collection: &str,
        filter: &'a dyn DocumentFilter,
    ) -> AdapterResult<DocumentIter<'a>> {
        self.check_collection(collection)?;

        // Snapshot the candidates; the cache lock is not held while iterating
        let candidates: Vec<_> = {
            let mut indexes = self.lock_indexes();
            let index = self.loaded(&mut indexes, collection)?;
            let pre_filter = filter.index_pre_filter();
            index
                .ids
                .values()
                .filter(|entry| pre_filter.map_or(true, |pre| pre.includes_index_values(&entry.extracted_values)))
                .map(|entry| entry.id.clone())
                .collect()
        };

        let collection = collection.to_string();
        Ok(Box::new(candidates.into_iter().filter_map(move |id| {
            match self.inner.read(&collection, &id) {
                Ok(document) if filter.includes(&id, &document) => Some(Ok((id, document))),
                Ok(_) => None,
                // Deleted around the index
                Err(e) if e.is_not_found() => None,
                Err(e) => Some(Err(e)),
            }
        })))
    }

    fn list_collections(&self) -> AdapterResult<CollectionIter<'_>> {
        let collections = self.inner.list_collections()?;
        Ok(Box::new(collections.filter(move |name| {
            name.as_ref().map_or(true, |name| *name != self.meta_collection)
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{CallbackIndexPreFilter, ErrorKind, FieldEquals, IndexValues, MemoryAdapter};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    /// Memory store recording which ids were read
    #[derive(Debug, Default)]
    struct CountingStore {
        memory: MemoryAdapter,
        reads: Mutex<Vec<DocumentId>>,
    }

    impl CountingStore {
        fn take_reads(&self) -> Vec<DocumentId> {
            std::mem::take(&mut *self.reads.lock().unwrap())
        }
    }

    impl StorageAdapter for CountingStore {
        fn write(&self, collection: &str, id: &DocumentId, data: &Document) -> AdapterResult<()> {
            self.memory.write(collection, id, data)
        }

        fn read(&self, collection: &str, id: &DocumentId) -> AdapterResult<Document> {
            if collection != META_COLLECTION {
                self.reads.lock().unwrap().push(id.clone());
            }
            self.memory.read(collection, id)
        }

        fn has(&self, collection: &str, id: &DocumentId) -> AdapterResult<bool> {
            self.memory.has(collection, id)
        }

        fn delete(&self, collection: &str, id: &DocumentId) -> AdapterResult<()> {
            self.memory.delete(collection, id)
        }

        fn read_all<'a>(
            &'a self,
            collection: &str,
            filter: &'a dyn DocumentFilter,
        ) -> AdapterResult<DocumentIter<'a>> {
            self.memory.read_all(collection, filter)
        }

        fn list_collections(&self) -> AdapterResult<CollectionIter<'_>> {
            self.memory.list_collections()
        }
    }

    fn typed_fixture(store: SharedAdapter) -> IndexAdapter {
        let adapter = IndexAdapter::new(store).with_extractor(FieldIndexValueExtractor::new(["type"]));
        let types = ["foo", "bar", "baz"];
        for n in 1..=9 {
            let data = doc(json!({"type": types[(n - 1) % 3], "group": (n - 1) / 3 + 1}));
            adapter.write("test", &DocumentId::from(n), &data).unwrap();
        }
        adapter
    }

    #[test]
    fn test_write_creates_index_document() {
        let memory = Arc::new(MemoryAdapter::new());
        let adapter = IndexAdapter::new(memory.clone()).with_meta_collection("meta-test");
        adapter.write("test", &DocumentId::from(1), &doc(json!({"foo": "bar"}))).unwrap();

        assert!(memory.has("test", &DocumentId::from(1)).unwrap());
        assert!(memory.has("meta-test", &DocumentId::from("test.index")).unwrap());
    }

    #[test]
    fn test_lazy_rebuild_after_delete_index() {
        let memory = Arc::new(MemoryAdapter::new());
        let adapter = IndexAdapter::new(memory.clone());
        let id = DocumentId::from(1);

        assert!(!adapter.has("test", &id).unwrap());
        memory.write("test", &id, &doc(json!({"foo": "bar"}))).unwrap();
        // Written around the index
        assert!(!adapter.has("test", &id).unwrap());

        adapter.delete_index("test").unwrap();
        assert!(adapter.has("test", &id).unwrap());
    }

    #[test]
    fn test_recreate_index() {
        let memory = Arc::new(MemoryAdapter::new());
        let adapter = IndexAdapter::new(memory.clone());
        memory.write("test", &DocumentId::from(1), &doc(json!({}))).unwrap();
        adapter.recreate_index("test").unwrap();
        assert!(adapter.has("test", &DocumentId::from(1)).unwrap());
    }

    #[test]
    fn test_dispose_and_refresh_cover_known_collections() {
        for use_refresh in [false, true] {
            let memory = Arc::new(MemoryAdapter::new());
            let adapter = IndexAdapter::new(memory.clone());
            let id = DocumentId::from(1);

            assert!(!adapter.has("test", &id).unwrap());
            assert!(!adapter.has("test-two", &id).unwrap());
            memory.write("test", &id, &doc(json!({}))).unwrap();
            memory.write("test-two", &id, &doc(json!({}))).unwrap();
            assert!(!adapter.has("test", &id).unwrap());

            if use_refresh {
                adapter.refresh().unwrap();
            } else {
                adapter.dispose().unwrap();
            }
            assert!(adapter.has("test", &id).unwrap());
            assert!(adapter.has("test-two", &id).unwrap());
        }
    }

    #[test]
    fn test_extracted_values_persisted() {
        let memory = Arc::new(MemoryAdapter::new());
        let adapter = typed_fixture(memory.clone());

        let stored = memory.read(META_COLLECTION, &DocumentId::from("test.index")).unwrap();
        let index = IndexDocument::from_document(stored).unwrap();
        assert_eq!(index.len(), 9);
        for entry in index.ids.values() {
            assert_eq!(entry.extracted_values.len(), 1);
            assert!(entry.extracted_values.contains_key("type"));
        }
        assert_eq!(adapter.read_all("test", &AcceptAll).unwrap().count(), 9);
    }

    #[test]
    fn test_pre_filter_skips_inner_reads() {
        let store = Arc::new(CountingStore::default());
        let adapter = typed_fixture(store.clone());
        store.take_reads();

        let filter = CallbackIndexPreFilter::new(
            |_id: &DocumentId, _d: &Document| true,
            |values: &IndexValues| values.get("type") == Some(&json!("foo")),
        );
        let found: Vec<_> = adapter.read_all("test", &filter).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|(_, d)| d["type"] == json!("foo")));
        assert_eq!(
            store.take_reads(),
            vec![DocumentId::from(1), DocumentId::from(4), DocumentId::from(7)]
        );

        let found: Vec<_> = adapter
            .read_all("test", &FieldEquals::new("type", "bar"))
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(found, vec![DocumentId::from(2), DocumentId::from(5), DocumentId::from(8)]);
        assert_eq!(store.take_reads(), found);
    }

    #[test]
    fn test_delete_removes_entry_and_keeps_created() {
        let memory = Arc::new(MemoryAdapter::new());
        let adapter = IndexAdapter::new(memory.clone());
        let id = DocumentId::from("a");

        adapter.write("c", &id, &doc(json!({"v": 1}))).unwrap();
        let created = |m: &MemoryAdapter| {
            let stored = m.read(META_COLLECTION, &DocumentId::from("c.index")).unwrap();
            IndexDocument::from_document(stored).unwrap().ids[&DocumentId::from("a")].created
        };
        let first = created(&memory);
        adapter.write("c", &id, &doc(json!({"v": 2}))).unwrap();
        assert_eq!(created(&memory), first);

        adapter.delete("c", &id).unwrap();
        assert!(!adapter.has("c", &id).unwrap());
        assert_eq!(adapter.read_all("c", &AcceptAll).unwrap().count(), 0);
    }

    #[test]
    fn test_meta_collection_is_reserved() {
        let adapter = IndexAdapter::new(Arc::new(MemoryAdapter::new()));
        let err = adapter.write(META_COLLECTION, &DocumentId::from(1), &Document::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReservedCollection);
        assert!(adapter.read_all(META_COLLECTION, &AcceptAll).is_err());
    }

    #[test]
    fn test_list_collections_hides_meta() {
        let adapter = IndexAdapter::new(Arc::new(MemoryAdapter::new()));
        adapter.write("users", &DocumentId::from(1), &Document::new()).unwrap();
        let names: Vec<_> = adapter.list_collections().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(names, vec!["users".to_string()]);
    }
}
