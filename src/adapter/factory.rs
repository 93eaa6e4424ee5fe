//! Ready-made adapter stacks

use std::path::PathBuf;
use std::sync::Arc;

use super::atomic::AtomicFileAdapter;
use super::config::FileAdapterConfig;
use super::errors::AdapterResult;
use super::file::FileAdapter;
use super::memory::MemoryAdapter;
use super::SharedAdapter;
use crate::middleware::FallbackAdapter;

pub struct AdapterFactory;

impl AdapterFactory {
    /// Plain file adapter with default settings.
    pub fn local_folder(path: impl Into<PathBuf>) -> AdapterResult<SharedAdapter> {
        Ok(Arc::new(FileAdapter::new(path)?))
    }

    /// Crash-safe file adapter; `durable` adds fsync.
    pub fn atomic_folder(path: impl Into<PathBuf>, durable: bool) -> AdapterResult<SharedAdapter> {
        let config = FileAdapterConfig::new(path).with_durable(durable);
        Ok(Arc::new(AtomicFileAdapter::with_config(config)?))
    }

    /// `adapter` fronted by an in-memory cache.
    ///
    /// Reads fill the cache, writes and deletes go to `adapter` and keep
    /// the cache coherent. Listings come from the cache once it holds the
    /// collection.
    pub fn memory_cached(adapter: SharedAdapter) -> SharedAdapter {
        Arc::new(FallbackAdapter::new(Arc::new(MemoryAdapter::new()), adapter, true))
    }
}
