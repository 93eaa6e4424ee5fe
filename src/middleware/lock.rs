//! Advisory locking middleware
//!
//! Serializes writes and deletes per collection with a lock document
//! (`<meta>/<collection>.lock`) polled at a fixed interval.
//!
//! Per collection: Unlocked → Locked(owner, lockTime, expireTime) → Unlocked
//!
//! The lock is cooperative. Callers that bypass this adapter are not
//! excluded, and release does not check the owner.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::passthrough::PassThroughAdapter;
use crate::adapter::{
    meta_document_id, AdapterError, AdapterResult, CollectionIter, Document, DocumentFilter,
    DocumentId, DocumentIter, SharedAdapter, StorageAdapter, META_COLLECTION,
};
use crate::observability::{log_event, Event};

const FEATURE: &str = "lock";

/// Lock timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Lifetime of an acquired lock, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Polls before giving up on a held lock
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,

    /// Delay between polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_max_tries() -> u32 {
    10
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_tries: default_max_tries(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl LockConfig {
    pub fn new(timeout_secs: u64, max_tries: u32, poll_interval_ms: u64) -> Self {
        Self {
            timeout_secs,
            max_tries,
            poll_interval_ms,
        }
    }

    /// Validate the configuration.
    ///
    /// - timeout must be at least one second
    /// - poll interval must be non-zero
    pub fn validate(&self) -> AdapterResult<()> {
        if self.timeout_secs < 1 {
            return Err(AdapterError::init_failed("Timeout must be at least 1 second"));
        }
        if self.poll_interval_ms == 0 {
            return Err(AdapterError::init_failed("Poll interval must be greater than zero"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.timeout_secs as i64)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Stored lock state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockDocument {
    pub locked: bool,
    /// Process id of the acquirer
    pub owner: u32,
    pub lock_time: DateTime<Utc>,
    pub expire_time: DateTime<Utc>,
}

impl LockDocument {
    pub fn acquire(now: DateTime<Utc>, timeout: chrono::Duration) -> Self {
        Self {
            locked: true,
            owner: std::process::id(),
            lock_time: now,
            expire_time: now + timeout,
        }
    }

    pub fn to_document(&self) -> AdapterResult<Document> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(AdapterError::normalization_failed("lock did not encode to an object")),
            Err(e) => Err(AdapterError::normalization_failed(e.to_string()).with_source(e)),
        }
    }

    /// Whether a stored lock document still holds the lock.
    ///
    /// Held only if not marked unlocked, `expireTime` has not passed and
    /// `now - lockTime <= timeout`. Missing or unparsable times count as
    /// released.
    pub fn is_held(document: &Document, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        if document.get("locked") == Some(&Value::Bool(false)) {
            return false;
        }
        let time = |field: &str| {
            document
                .get(field)
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc))
        };
        match (time("expireTime"), time("lockTime")) {
            (Some(expire), Some(locked_at)) => expire >= now && now - locked_at <= timeout,
            _ => false,
        }
    }
}

/// Middleware taking a collection lock around every write and delete.
#[derive(Debug)]
pub struct LockAdapter {
    base: PassThroughAdapter,
    config: LockConfig,
    meta_collection: String,
}

impl LockAdapter {
    pub fn new(inner: SharedAdapter, config: LockConfig) -> AdapterResult<Self> {
        config.validate()?;
        Ok(Self {
            base: PassThroughAdapter::new(inner),
            config,
            meta_collection: META_COLLECTION.to_string(),
        })
    }

    pub fn with_meta_collection(mut self, meta_collection: impl Into<String>) -> Self {
        self.meta_collection = meta_collection.into();
        self
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    fn inner(&self) -> &SharedAdapter {
        self.base.inner()
    }

    fn lock_id(collection: &str) -> DocumentId {
        meta_document_id(collection, FEATURE)
    }

    /// Whether another caller currently holds the collection lock.
    pub fn has_lock(&self, collection: &str) -> AdapterResult<bool> {
        let id = Self::lock_id(collection);
        if !self.inner().has(&self.meta_collection, &id)? {
            return Ok(false);
        }
        match self.inner().read(&self.meta_collection, &id) {
            Ok(document) => Ok(LockDocument::is_held(&document, Utc::now(), self.config.timeout())),
            // Released between has and read
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn wait_for_lock(&self, collection: &str) -> AdapterResult<()> {
        let mut tries = 0;
        while self.has_lock(collection)? {
            if tries >= self.config.max_tries {
                log_event(
                    Event::LockTimeout,
                    &[("collection", collection), ("tries", &tries.to_string())],
                );
                return Err(AdapterError::lock_failed("get", collection)
                    .with_source(format!("Max tries ({}) exceeded", self.config.max_tries)));
            }
            tries += 1;
            log_event(Event::LockWait, &[("collection", collection), ("try", &tries.to_string())]);
            thread::sleep(self.config.poll_interval());
        }
        Ok(())
    }

    fn acquire(&self, collection: &str) -> AdapterResult<()> {
        let lock = LockDocument::acquire(Utc::now(), self.config.timeout());
        self.inner()
            .write(&self.meta_collection, &Self::lock_id(collection), &lock.to_document()?)
            .map_err(|e| AdapterError::lock_failed("get", collection).with_source(e))?;
        log_event(Event::LockAcquired, &[("collection", collection)]);
        Ok(())
    }

    fn release(&self, collection: &str) -> AdapterResult<()> {
        self.inner()
            .delete(&self.meta_collection, &Self::lock_id(collection))
            .map_err(|e| AdapterError::lock_failed("release", collection).with_source(e))
    }

    /// Wait, acquire, run `operation`, then always release.
    fn locked<F>(&self, collection: &str, operation: F) -> AdapterResult<()>
    where
        F: FnOnce() -> AdapterResult<()>,
    {
        self.wait_for_lock(collection)?;
        let result = self.acquire(collection).and_then(|()| operation());
        let released = self.release(collection);

        match (result, released) {
            (Ok(()), released) => released,
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_failure)) => {
                log_event(
                    Event::LockReleaseFailed,
                    &[("collection", collection), ("error", &release_failure.to_string())],
                );
                Err(e)
            }
        }
    }
}

impl StorageAdapter for LockAdapter {
    fn write(&self, collection: &str, id: &DocumentId, data: &Document) -> AdapterResult<()> {
        self.locked(collection, || self.base.write(collection, id, data))
    }

    fn read(&self, collection: &str, id: &DocumentId) -> AdapterResult<Document> {
        self.base.read(collection, id)
    }

    fn has(&self, collection: &str, id: &DocumentId) -> AdapterResult<bool> {
        self.base.has(collection, id)
    }

    fn delete(&self, collection: &str, id: &DocumentId) -> AdapterResult<()> {
        self.locked(collection, || self.base.delete(collection, id))
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
