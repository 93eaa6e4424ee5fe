//! Middleware adapters
//!
//! Each middleware implements [`StorageAdapter`](crate::adapter::StorageAdapter)
//! and wraps one or two [`SharedAdapter`](crate::adapter::SharedAdapter)s.
//! Stacks are composed at construction time:
//!
//! ```ignore
//! let files: SharedAdapter = Arc::new(AtomicFileAdapter::new("/srv/docs")?);
//! let locked: SharedAdapter = Arc::new(LockAdapter::new(files, LockConfig::default())?);
//! let stack = IndexAdapter::new(locked);
//! ```
//!
//! The index rejects its own meta-collection, so it goes outside any
//! middleware that writes meta documents.
//!
//! | Adapter | Adds |
//! |---------|------|
//! | [`PassThroughAdapter`] | nothing; forwarding base for the others |
//! | [`ReadOnlyAdapter`] | refuses or ignores mutations |
//! | [`IndexAdapter`] | per-collection id index with pre-filtering |
//! | [`LockAdapter`] | polled advisory lock around mutations |
//! | [`FallbackAdapter`] | read-through primary with resync |
//! | [`ReplicateAdapter`] | main/replica mirroring with rollback |

mod fallback;
mod index;
mod lock;
mod passthrough;
mod read_only;
mod replicate;

pub use fallback::FallbackAdapter;
pub use index::{
    CallbackIndexValueExtractor, FieldIndexValueExtractor, IndexAdapter, IndexDocument, IndexEntry,
    IndexValueExtractor, NoIndexValueExtractor,
};
pub use lock::{LockAdapter, LockConfig, LockDocument};
pub use passthrough::PassThroughAdapter;
pub use read_only::ReadOnlyAdapter;
pub use replicate::ReplicateAdapter;
