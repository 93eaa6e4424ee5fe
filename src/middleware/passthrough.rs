//! Identity middleware

use crate::adapter::{
    AdapterResult, CollectionIter, Document, DocumentFilter, DocumentId, DocumentIter,
    SharedAdapter, StorageAdapter,
};

/// Forwards every operation unchanged.
///
/// Other middleware embed one and delegate the operations they leave alone.
#[derive(Debug, Clone)]
pub struct PassThroughAdapter {
    inner: SharedAdapter,
}

impl PassThroughAdapter {
    pub fn new(inner: SharedAdapter) -> Self {
        Self { inner }
    }

    /// The wrapped adapter
    pub fn inner(&self) -> &SharedAdapter {
        &self.inner
    }
}

impl StorageAdapter for PassThroughAdapter {
    fn write(&self, collection: &str, id: &DocumentId, data: &Document) -> AdapterResult<()> {
        self.inner.write(collection, id, data)
    }

    fn read(&self, collection: &str, id: &DocumentId) -> AdapterResult<Document> {
        self.inner.read(collection, id)
    }

    fn has(&self, collection: &str, id: &DocumentId) -> AdapterResult<bool> {
        self.inner.has(collection, id)
    }

    fn delete(&self, collection: &str, id: &DocumentId) -> AdapterResult<()> {
        self.inner.delete(collection, id)
    }

    fn read_all<'a>(
        &'a self,
        collection: &str,
        filter: &'a dyn DocumentFilter,
    ) -> AdapterResult<DocumentIter<'a>> {
        self.inner.read_all(collection, filter)
    }

    fn list_collections(&self) -> AdapterResult<CollectionIter<'_>> {
        self.inner.list_collections()
    }
}
