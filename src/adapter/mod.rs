//! Storage adapters
//!
//! Every adapter, terminal or middleware, implements [`StorageAdapter`]:
//! documents addressed by `(collection, id)` with six operations.
//!
//! # Terminal adapters
//!
//! - [`FileAdapter`]: one JSON file per document, in-place writes
//! - [`AtomicFileAdapter`]: temp-file + rename writes, tombstone deletes
//! - [`MemoryAdapter`]: volatile map of maps
//! - [`NullAdapter`]: stores nothing
//!
//! Middleware adapters live in [`crate::middleware`] and wrap a
//! [`SharedAdapter`].

mod atomic;
mod config;
mod document;
mod errors;
mod factory;
mod file;
mod filter;
mod memory;
mod null;

pub use atomic::AtomicFileAdapter;
pub use config::{FileAdapterConfig, ScanMode};
pub use document::{Document, DocumentId};
pub use errors::{
    AdapterError, AdapterErrorCode, AdapterResult, BoxError, ErrorKind, FsFunctionFailed, Severity,
};
pub use factory::AdapterFactory;
pub use file::FileAdapter;
pub use filter::{
    AcceptAll, CallbackFilter, CallbackIndexPreFilter, DocumentFilter, FieldEquals, IndexPreFilter,
    IndexValues,
};
pub use memory::MemoryAdapter;
pub use null::NullAdapter;

use std::fmt;
use std::sync::Arc;

/// Reserved collection holding index and lock documents.
pub const META_COLLECTION: &str = ".meta";

/// Lazy listing of `(id, document)` pairs.
pub type DocumentIter<'a> = Box<dyn Iterator<Item = AdapterResult<(DocumentId, Document)>> + 'a>;

/// Lazy listing of collection names.
pub type CollectionIter<'a> = Box<dyn Iterator<Item = AdapterResult<String>> + 'a>;

/// Adapter handle shared between a stack and its callers.
pub type SharedAdapter = Arc<dyn StorageAdapter>;

/// The storage contract.
pub trait StorageAdapter: Send + Sync + fmt::Debug {
    /// Store `data` under `(collection, id)`, replacing any previous content.
    fn write(&self, collection: &str, id: &DocumentId, data: &Document) -> AdapterResult<()>;

    /// Read a document. Absence is `AERO_NOT_FOUND`.
    fn read(&self, collection: &str, id: &DocumentId) -> AdapterResult<Document>;

    /// Whether a document exists.
    fn has(&self, collection: &str, id: &DocumentId) -> AdapterResult<bool>;

    /// Remove a document.
    fn delete(&self, collection: &str, id: &DocumentId) -> AdapterResult<()>;

    /// Lazily list the documents of a collection accepted by `filter`.
    ///
    /// Each call lists afresh. The outer error is for failures affecting the
    /// whole collection; per-document failures surface as items.
    fn read_all<'a>(
        &'a self,
        collection: &str,
        filter: &'a dyn DocumentFilter,
    ) -> AdapterResult<DocumentIter<'a>>;

    /// Lazily list collection names.
    fn list_collections(&self) -> AdapterResult<CollectionIter<'_>>;
}

/// Id of the bookkeeping document `feature` keeps for `collection`.
pub fn meta_document_id(collection: &str, feature: &str) -> DocumentId {
    DocumentId::new(format!("{}.{}", collection, feature))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_document_id() {
        assert_eq!(meta_document_id("users", "index").as_str(), "users.index");
        assert_eq!(meta_document_id("users", "lock").as_str(), "users.lock");
    }
}
