//! Read-only middleware

use super::passthrough::PassThroughAdapter;
use crate::adapter::{
    AdapterError, AdapterResult, CollectionIter, Document, DocumentFilter, DocumentId,
    DocumentIter, SharedAdapter, StorageAdapter,
};

/// Passes reads through; refuses writes and deletes with `AERO_READ_ONLY`,
/// or silently drops them when built with [`ReadOnlyAdapter::silent`].
#[derive(Debug, Clone)]
pub struct ReadOnlyAdapter {
    base: PassThroughAdapter,
    refuse: bool,
}

impl ReadOnlyAdapter {
    /// Mutations fail with `AERO_READ_ONLY`.
    pub fn new(inner: SharedAdapter) -> Self {
        Self {
            base: PassThroughAdapter::new(inner),
            refuse: true,
        }
    }

    /// Mutations succeed without effect.
    pub fn silent(inner: SharedAdapter) -> Self {
        Self {
            base: PassThroughAdapter::new(inner),
            refuse: false,
        }
    }

    fn mutation(&self, action: &'static str, collection: &str, id: &DocumentId) -> AdapterResult<()> {
        if self.refuse {
            Err(AdapterError::read_only(action, collection, id))
        } else {
            Ok(())
        }
    }
}

impl StorageAdapter for ReadOnlyAdapter {
    fn write(&self, collection: &str, id: &DocumentId, _data: &Document) -> AdapterResult<()> {
        self.mutation("write", collection, id)
    }

    fn read(&self, collection: &str, id: &DocumentId) -> AdapterResult<Document> {
        self.base.read(collection, id)
    }

    fn has(&self, collection: &str, id: &DocumentId) -> AdapterResult<bool> {
        self.base.has(collection, id)
    }

    fn delete(&self, collection: &str, id: &DocumentId) -> AdapterResult<()> {
        self.mutation("delete", collection, id)
    }

    fn read_all<'a>(
        &'a self,
        collection: &str,
        filter: &'a dyn DocumentFilter,
    ) -> AdapterResult<DocumentIter<'a>> {
        self.base.read_all(collection, filter)
    }

    fn list_collections(&self) -> AdapterResult<CollectionIter<'_>> {
        self.base.list_collections()
    }
}
