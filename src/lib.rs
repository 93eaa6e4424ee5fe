//! aerostore - pluggable document storage adapters
//!
//! Documents are JSON objects addressed by `(collection, id)`. Every
//! backend and every middleware implements the same six-operation
//! [`StorageAdapter`] contract, so stacks compose by wrapping:
//!
//! - `adapter`: contract, document types, filters, file/atomic/memory/null
//!   adapters, factory, errors
//! - `middleware`: pass-through, read-only, index, lock, fallback, replicate
//! - `normalizer`: file-name sanitizing, JSON codec
//! - `observability`: JSON-lines logger and typed events
//!
//! No async, no background threads. The lock middleware is the only
//! component that blocks on purpose.

pub mod adapter;
pub mod middleware;
pub mod normalizer;
pub mod observability;

pub use adapter::{
    AdapterError, AdapterErrorCode, AdapterFactory, AdapterResult, AtomicFileAdapter, Document,
    DocumentFilter, DocumentId, ErrorKind, FileAdapter, FileAdapterConfig, MemoryAdapter,
    NullAdapter, ScanMode, SharedAdapter, StorageAdapter,
};
pub use middleware::{
    FallbackAdapter, IndexAdapter, LockAdapter, LockConfig, PassThroughAdapter, ReadOnlyAdapter,
    ReplicateAdapter,
};
