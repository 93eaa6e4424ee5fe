//! Volatile in-process adapter

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::document::{Document, DocumentId};
use super::errors::{AdapterError, AdapterResult};
use super::filter::DocumentFilter;
use super::{CollectionIter, DocumentIter, StorageAdapter};

type Collection = BTreeMap<DocumentId, Document>;

/// Map of collections, each a map of documents sorted by id.
///
/// Deleting an absent document is a no-op. A collection exists from its
/// first write until [`dispose`](Self::dispose).
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    collections: RwLock<BTreeMap<String, Collection>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every collection.
    pub fn dispose(&self) {
        self.write_lock().clear();
    }

    /// Number of documents held across all collections
    pub fn len(&self) -> usize {
        self.read_lock().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, BTreeMap<String, Collection>> {
        self.collections.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Collection>> {
        self.collections.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageAdapter for MemoryAdapter {
    fn write(&self, collection: &str, id: &DocumentId, data: &Document) -> AdapterResult<()> {
        self.write_lock()
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data.clone());
        Ok(())
    }

    fn read(&self, collection: &str, id: &DocumentId) -> AdapterResult<Document> {
        self.read_lock()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
            .ok_or_else(|| AdapterError::not_found(collection, id))
    }

    fn has(&self, collection: &str, id: &DocumentId) -> AdapterResult<bool> {
        Ok(self
            .read_lock()
            .get(collection)
            .map_or(false, |docs| docs.contains_key(id)))
    }

    fn delete(&self, collection: &str, id: &DocumentId) -> AdapterResult<()> {
        if let Some(docs) = self.write_lock().get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    fn read_all<'a>(
        &'a self,
        collection: &str,
        filter: &'a dyn DocumentFilter,
    ) -> AdapterResult<DocumentIter<'a>> {
        // Snapshot so the lock is not held while the caller iterates
        let snapshot = self
            .read_lock()
            .get(collection)
            .cloned()
            .ok_or_else(|| AdapterError::collection_not_found(collection))?;

        Ok(Box::new(
            snapshot
                .into_iter()
                .filter(move |(id, doc)| filter.includes(id, doc))
                .map(Ok),
        ))
    }

    fn list_collections(&self) -> AdapterResult<CollectionIter<'_>> {
        let names: Vec<String> = self.read_lock().keys().cloned().collect();
        Ok(Box::new(names.into_iter().map(Ok)))
    }
}
