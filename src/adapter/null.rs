//! Adapter that stores nothing

use std::iter;

use super::document::{Document, DocumentId};
use super::errors::{AdapterError, AdapterResult};
use super::filter::DocumentFilter;
use super::{CollectionIter, DocumentIter, StorageAdapter};

/// Writes vanish, reads find nothing, deletes fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAdapter;

impl NullAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl StorageAdapter for NullAdapter {
    fn write(&self, _collection: &str, _id: &DocumentId, _data: &Document) -> AdapterResult<()> {
        Ok(())
    }

    fn read(&self, collection: &str, id: &DocumentId) -> AdapterResult<Document> {
        Err(AdapterError::not_found(collection, id))
    }

    fn has(&self, _collection: &str, _id: &DocumentId) -> AdapterResult<bool> {
        Ok(false)
    }

    fn delete(&self, collection: &str, id: &DocumentId) -> AdapterResult<()> {
        Err(AdapterError::delete_failed(collection, id))
    }

    fn read_all<'a>(
        &'a self,
        _collection: &str,
        _filter: &'a dyn DocumentFilter,
    ) -> AdapterResult<DocumentIter<'a>> {
        Ok(Box::new(iter::empty()))
    }

    fn list_collections(&self) -> AdapterResult<CollectionIter<'_>> {
        Ok(Box::new(iter::empty()))
    }
}
