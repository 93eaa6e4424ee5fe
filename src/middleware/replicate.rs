//! Main/replica mirroring middleware
//!
//! Every write and delete is applied to the main adapter, then to the
//! replica. When the replica fails, the main adapter is restored to the
//! state captured before the call:
//!
//! 1. Capture prior content of the key in main (or its absence)
//! 2. Mutate main
//! 3. Mutate replica
//! 4. On replica failure: restore or remove the key in main, then raise
//!    ReplicationFailed
//!
//! Restoration is best effort. If it fails too, the error is FATAL and
//! carries the restore failure as its compensation; main state is then
//! undefined for that key.

use super::passthrough::PassThroughAdapter;
use crate::adapter::{
    AdapterError, AdapterResult, CollectionIter, Document, DocumentFilter, DocumentId,
    DocumentIter, SharedAdapter, StorageAdapter,
};
use crate::observability::{log_event, Event};

#[derive(Debug)]
pub struct ReplicateAdapter {
    /// Forwards reads to main
    main: PassThroughAdapter,
    replica: SharedAdapter,
}

impl ReplicateAdapter {
    pub fn new(main: SharedAdapter, replica: SharedAdapter) -> Self {
        Self {
            main: PassThroughAdapter::new(main),
            replica,
        }
    }

    fn capture(&self, collection: &str, id: &DocumentId) -> AdapterResult<Option<Document>> {
        if !self.main.has(collection, id)? {
            return Ok(None);
        }
        match self.main.read(collection, id) {
            Ok(document) => Ok(Some(document)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Undo the main mutation and build the error to surface.
    fn rollback(
        &self,
        action: &'static str,
        collection: &str,
        id: &DocumentId,
        prior: Option<Document>,
        cause: AdapterError,
    ) -> AdapterError {
        log_event(
            Event::ReplicationRollback,
            &[
                ("action", action),
                ("collection", collection),
                ("id", id.as_str()),
                ("cause", &cause.to_string()),
            ],
        );

        let restored = match prior {
            Some(document) => self.main.write(collection, id, &document),
            None if action == "write" => self.main.delete(collection, id),
            None => Ok(()),
        };

        let error = AdapterError::replication_failed(action, collection, id, cause);
        match restored {
            Ok(()) => error,
            Err(failure) => {
                log_event(
                    Event::ReplicationRollbackFailed,
                    &[
                        ("action", action),
                        ("collection", collection),
                        ("id", id.as_str()),
                        ("error", &failure.to_string()),
                    ],
                );
                error.with_compensation(failure)
            }
        }
    }
}

impl StorageAdapter for ReplicateAdapter {
    fn write(&self, collection: &str, id: &DocumentId, data: &Document) -> AdapterResult<()> {
        let prior = self.capture(collection, id)?;
        self.main.write(collection, id, data)?;

        self.replica
            .write(collection, id, data)
            .map_err(|e| self.rollback("write", collection, id, prior, e))
    }

    fn read(&self, collection: &str, id: &DocumentId) -> AdapterResult<Document> {
        self.main.read(collection, id)
    }

    fn has(&self, collection: &str, id: &DocumentId) -> AdapterResult<bool> {
        self.main.has(collection, id)
    }

    fn delete(&self, collection: &str, id: &DocumentId) -> AdapterResult<()> {
        let prior = self.capture(collection, id)?;
        self.main.delete(collection, id)?;

        self.replica
            .delete(collection, id)
            .map_err(|e| self.rollback("delete", collection, id, prior, e))
    }

    fn read_all<'a>(
        &'a self,
        collection: &str,
        filter: &'a dyn DocumentFilter,
    ) -> AdapterResult<DocumentIter<'a>> {
        self.main.read_all(collection, filter)
    }

    fn list_collections(&self) -> AdapterResult<CollectionIter<'_>> {
        self.main.list_collections()
    }
}
