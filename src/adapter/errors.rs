//! Adapter error types
//!
//! Error codes:
//! - AERO_NOT_FOUND (ERROR)
//! - AERO_WRITE_FAILED (ERROR)
//! - AERO_DELETE_FAILED (ERROR)
//! - AERO_READ_ONLY (ERROR, a write-failed kind)
//! - AERO_REPLICATION_FAILED (ERROR, FATAL when its compensation also failed)
//! - AERO_LOCK_FAILED (ERROR)
//! - AERO_ALREADY_EXISTS (ERROR)
//! - AERO_ADAPTER_INIT_FAILED (ERROR)
//! - AERO_NORMALIZATION_FAILED (ERROR)
//! - AERO_RESERVED_COLLECTION (ERROR)
//! - AERO_ADAPTER_IO (ERROR)

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::config::ScanMode;
use super::document::DocumentId;

/// Boxed error used as the cause of an [`AdapterError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Severity levels for adapter errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, storage state is known
    Error,
    /// Operation fails and storage state is undefined
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// The error kinds callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    WriteFailed,
    DeleteFailed,
    ReplicationFailed,
    LockFailed,
    AlreadyExists,
    AdapterInitializationFailed,
    NormalizationFailed,
    ReservedCollection,
    Io,
}

/// Adapter error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterErrorCode {
    /// Collection or document absent
    AeroNotFound,
    /// Document could not be written
    AeroWriteFailed,
    /// Document could not be deleted
    AeroDeleteFailed,
    /// Mutation refused by a read-only adapter
    AeroReadOnly,
    /// Secondary tier failed during resync or replication
    AeroReplicationFailed,
    /// Lock could not be acquired or released
    AeroLockFailed,
    /// Target already exists
    AeroAlreadyExists,
    /// Adapter misconfigured at construction
    AeroAdapterInitFailed,
    /// Stored payload could not be encoded or decoded
    AeroNormalizationFailed,
    /// Collection name reserved for bookkeeping
    AeroReservedCollection,
    /// Filesystem failure outside a write or delete
    AeroAdapterIo,
}

impl AdapterErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            AdapterErrorCode::AeroNotFound => "AERO_NOT_FOUND",
            AdapterErrorCode::AeroWriteFailed => "AERO_WRITE_FAILED",
            AdapterErrorCode::AeroDeleteFailed => "AERO_DELETE_FAILED",
            AdapterErrorCode::AeroReadOnly => "AERO_READ_ONLY",
            AdapterErrorCode::AeroReplicationFailed => "AERO_REPLICATION_FAILED",
            AdapterErrorCode::AeroLockFailed => "AERO_LOCK_FAILED",
            AdapterErrorCode::AeroAlreadyExists => "AERO_ALREADY_EXISTS",
            AdapterErrorCode::AeroAdapterInitFailed => "AERO_ADAPTER_INIT_FAILED",
            AdapterErrorCode::AeroNormalizationFailed => "AERO_NORMALIZATION_FAILED",
            AdapterErrorCode::AeroReservedCollection => "AERO_RESERVED_COLLECTION",
            AdapterErrorCode::AeroAdapterIo => "AERO_ADAPTER_IO",
        }
    }

    /// Returns the kind this code belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdapterErrorCode::AeroNotFound => ErrorKind::NotFound,
            AdapterErrorCode::AeroWriteFailed | AdapterErrorCode::AeroReadOnly => {
                ErrorKind::WriteFailed
            }
            AdapterErrorCode::AeroDeleteFailed => ErrorKind::DeleteFailed,
            AdapterErrorCode::AeroReplicationFailed => ErrorKind::ReplicationFailed,
            AdapterErrorCode::AeroLockFailed => ErrorKind::LockFailed,
            AdapterErrorCode::AeroAlreadyExists => ErrorKind::AlreadyExists,
            AdapterErrorCode::AeroAdapterInitFailed => ErrorKind::AdapterInitializationFailed,
            AdapterErrorCode::AeroNormalizationFailed => ErrorKind::NormalizationFailed,
            AdapterErrorCode::AeroReservedCollection => ErrorKind::ReservedCollection,
            AdapterErrorCode::AeroAdapterIo => ErrorKind::Io,
        }
    }
}

impl fmt::Display for AdapterErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A filesystem primitive that returned a failure, with the adapter
/// configuration it ran under.
#[derive(Debug, Error)]
#[error("{function}() failed for path {path:?}: {source}")]
pub struct FsFunctionFailed {
    /// Name of the failed primitive (`mkdir`, `rename`, ...)
    pub function: &'static str,
    /// Path the primitive was applied to
    pub path: PathBuf,
    /// Adapter root directory
    pub root: PathBuf,
    /// Configured file permission bits
    pub file_permissions: u32,
    /// Configured directory permission bits
    pub directory_permissions: u32,
    /// Configured collection scan mode
    pub scan_mode: ScanMode,
    /// OS error
    #[source]
    pub source: io::Error,
}

/// Adapter error with full context
#[derive(Debug)]
pub struct AdapterError {
    code: AdapterErrorCode,
    message: String,
    collection: Option<String>,
    id: Option<DocumentId>,
    action: Option<&'static str>,
    source: Option<BoxError>,
    /// Failure of the rollback/resync attempted before this error surfaced
    compensation: Option<Box<AdapterError>>,
}

impl AdapterError {
    fn new(code: AdapterErrorCode, message: String) -> Self {
        Self {
            code,
            message,
            collection: None,
            id: None,
            action: None,
            source: None,
            compensation: None,
        }
    }

    fn for_document(mut self, collection: &str, id: &DocumentId) -> Self {
        self.collection = Some(collection.to_string());
        self.id = Some(id.clone());
        self
    }

    /// Document absent from a collection
    pub fn not_found(collection: &str, id: &DocumentId) -> Self {
        Self::new(
            AdapterErrorCode::AeroNotFound,
            format!("Document with id \"{}\" not found in collection \"{}\"", id, collection),
        )
        .for_document(collection, id)
    }

    /// Whole collection absent
    pub fn collection_not_found(collection: &str) -> Self {
        let mut err = Self::new(
            AdapterErrorCode::AeroNotFound,
            format!("Collection \"{}\" not found", collection),
        );
        err.collection = Some(collection.to_string());
        err
    }

    /// Write of one document failed
    pub fn write_failed(collection: &str, id: &DocumentId) -> Self {
        Self::new(
            AdapterErrorCode::AeroWriteFailed,
            format!("Failed to write document with id \"{}\" in collection \"{}\"", id, collection),
        )
        .for_document(collection, id)
    }

    /// Delete of one document failed
    pub fn delete_failed(collection: &str, id: &DocumentId) -> Self {
        Self::new(
            AdapterErrorCode::AeroDeleteFailed,
            format!("Failed to delete document with id \"{}\" in collection \"{}\"", id, collection),
        )
        .for_document(collection, id)
    }

    /// Mutation refused by a read-only adapter
    pub fn read_only(action: &'static str, collection: &str, id: &DocumentId) -> Self {
        let mut err = Self::new(
            AdapterErrorCode::AeroReadOnly,
            format!(
                "Failed to {} document with id \"{}\" in collection \"{}\" because the adapter is read-only",
                action, id, collection
            ),
        )
        .for_document(collection, id);
        err.action = Some(action);
        err
    }

    /// Secondary tier failed; `cause` is the original failure
    pub fn replication_failed(
        action: &'static str,
        collection: &str,
        id: &DocumentId,
        cause: AdapterError,
    ) -> Self {
        let mut err = Self::new(
            AdapterErrorCode::AeroReplicationFailed,
            format!(
                "Failed to replicate {} of document with id \"{}\" in collection \"{}\"",
                action, id, collection
            ),
        )
        .for_document(collection, id);
        err.action = Some(action);
        err.source = Some(Box::new(cause));
        err
    }

    /// Lock could not be acquired (`get`) or released (`release`)
    pub fn lock_failed(action: &'static str, collection: &str) -> Self {
        let mut err = Self::new(
            AdapterErrorCode::AeroLockFailed,
            format!("Could not {} lock for collection \"{}\"", action, collection),
        );
        err.collection = Some(collection.to_string());
        err.action = Some(action);
        err
    }

    /// Target document already exists
    ///
    /// No adapter in this crate raises it; it is the collision error for
    /// move operations built on top of the adapters.
    pub fn already_exists(collection: &str, id: &DocumentId) -> Self {
        Self::new(
            AdapterErrorCode::AeroAlreadyExists,
            format!("Document with id \"{}\" already exists in collection \"{}\"", id, collection),
        )
        .for_document(collection, id)
    }

    /// Adapter misconfigured
    pub fn init_failed(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorCode::AeroAdapterInitFailed, message.into())
    }

    /// Payload could not be encoded or decoded
    pub fn normalization_failed(message: impl Into<String>) -> Self {
        Self::new(
            AdapterErrorCode::AeroNormalizationFailed,
            format!("Normalization failed due to error: {}", message.into()),
        )
    }

    /// Collection or id whose normalized form is not a usable file name.
    ///
    /// `id` is `None` when the collection name itself is the problem.
    pub fn unsafe_name(collection: &str, id: Option<&DocumentId>, normalized: &str) -> Self {
        let subject = match id {
            Some(id) => format!("document id \"{}\" in collection \"{}\"", id, collection),
            None => format!("collection name \"{}\"", collection),
        };
        let mut err = Self::normalization_failed(format!(
            "{} normalizes to \"{}\", which is not a safe file name",
            subject, normalized
        ));
        err.collection = Some(collection.to_string());
        err.id = id.cloned();
        err
    }

    /// Collection name reserved for bookkeeping
    pub fn reserved_collection(collection: &str) -> Self {
        let mut err = Self::new(
            AdapterErrorCode::AeroReservedCollection,
            format!("Collection name \"{}\" is reserved for adapter metadata", collection),
        );
        err.collection = Some(collection.to_string());
        err
    }

    /// Filesystem failure on the read side
    pub fn io(failure: FsFunctionFailed) -> Self {
        Self::new(AdapterErrorCode::AeroAdapterIo, failure.to_string()).with_source(failure)
    }

    /// Attach the underlying cause
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach the failure of a compensating action
    pub fn with_compensation(mut self, failure: AdapterError) -> Self {
        self.compensation = Some(Box::new(failure));
        self
    }

    /// Returns the error code
    pub fn code(&self) -> AdapterErrorCode {
        self.code
    }

    /// Returns the error kind
    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Returns true for NotFound
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        if self.compensation.is_some() {
            Severity::Fatal
        } else {
            Severity::Error
        }
    }

    /// Returns whether storage state is undefined after this error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Collection the error refers to, if any
    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    /// Document id the error refers to, if any
    pub fn id(&self) -> Option<&DocumentId> {
        self.id.as_ref()
    }

    /// Action that failed (`write`, `delete`, `get`, `release`, ...)
    pub fn action(&self) -> Option<&'static str> {
        self.action
    }

    /// Failure of the compensating action, if one was attempted and failed
    pub fn compensation(&self) -> Option<&AdapterError> {
        self.compensation.as_deref()
    }

    /// Underlying filesystem failure, searching the source chain
    pub fn fs_failure(&self) -> Option<&FsFunctionFailed> {
        let mut current: Option<&(dyn std::error::Error + 'static)> =
            self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static));
        while let Some(err) = current {
            if let Some(fs) = err.downcast_ref::<FsFunctionFailed>() {
                return Some(fs);
            }
            current = err.source();
        }
        None
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.code.code(), self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        if let Some(ref compensation) = self.compensation {
            write!(f, " (compensation failed: {})", compensation)?;
        }
        Ok(())
    }
}

impl std::error::Error for AdapterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn fs_failure() -> FsFunctionFailed {
        FsFunctionFailed {
            function: "rename",
            path: PathBuf::from("/data/users/42.db.json"),
            root: PathBuf::from("/data"),
            file_permissions: 0o644,
            directory_permissions: 0o755,
            scan_mode: ScanMode::Directory,
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AdapterErrorCode::AeroNotFound.code(), "AERO_NOT_FOUND");
        assert_eq!(AdapterErrorCode::AeroReplicationFailed.code(), "AERO_REPLICATION_FAILED");
        assert_eq!(AdapterErrorCode::AeroLockFailed.code(), "AERO_LOCK_FAILED");
    }

    #[test]
    fn test_read_only_is_write_failed_kind() {
        let err = AdapterError::read_only("write", "users", &DocumentId::from("42"));
        assert_eq!(err.kind(), ErrorKind::WriteFailed);
        assert_eq!(err.code(), AdapterErrorCode::AeroReadOnly);
        assert_eq!(err.action(), Some("write"));
    }

    #[test]
    fn test_unsafe_name_context() {
        let id = DocumentId::from("!!!");
        let err = AdapterError::unsafe_name("users", Some(&id), "");
        assert_eq!(err.kind(), ErrorKind::NormalizationFailed);
        assert_eq!(err.collection(), Some("users"));
        assert_eq!(err.id(), Some(&id));

        let err = AdapterError::unsafe_name("..", None, "..");
        assert_eq!(err.collection(), Some(".."));
        assert!(err.id().is_none());
    }

    #[test]
    fn test_not_found_context() {
        let err = AdapterError::not_found("users", &DocumentId::from(42));
        assert!(err.is_not_found());
        assert_eq!(err.collection(), Some("users"));
        assert_eq!(err.id().map(|id| id.as_str()), Some("42"));
        assert!(err.to_string().contains("AERO_NOT_FOUND"));
    }

    #[test]
    fn test_fs_failure_found_through_chain() {
        let id = DocumentId::from("42");
        let err = AdapterError::write_failed("users", &id).with_source(fs_failure());
        let fs = err.fs_failure().expect("fs failure in chain");
        assert_eq!(fs.function, "rename");
        assert_eq!(fs.root, PathBuf::from("/data"));

        let outer = AdapterError::replication_failed("write", "users", &id, err);
        assert_eq!(outer.fs_failure().map(|f| f.function), Some("rename"));
    }

    #[test]
    fn test_compensation_failure_is_fatal_and_distinct() {
        let id = DocumentId::from("1");
        let original = AdapterError::write_failed("c", &id);
        let rollback = AdapterError::delete_failed("c", &id);
        let err = AdapterError::replication_failed("write", "c", &id, original)
            .with_compensation(rollback);

        assert!(err.is_fatal());
        assert_eq!(err.compensation().map(|c| c.code()), Some(AdapterErrorCode::AeroDeleteFailed));
        let display = err.to_string();
        assert!(display.contains("FATAL"));
        assert!(display.contains("caused by"));
        assert!(display.contains("compensation failed"));
    }
}
