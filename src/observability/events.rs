//! Observable events emitted by the adapter stack
//!
//! Events are explicit and typed; each has a fixed severity.

use std::fmt;

use super::logger::{Logger, Severity};

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Terminal adapters
    /// File adapter bound to a root directory
    AdapterInitialized,
    /// A document was written
    DocumentWritten,
    /// A document was deleted
    DocumentDeleted,
    /// A temp file was removed after a failed atomic write
    AtomicTempCleanup,
    /// A tombstone was renamed back after its unlink failed
    TombstoneRestored,

    // Index
    /// Index rebuild for one collection begins
    IndexRebuildBegin,
    /// Index rebuild for one collection complete
    IndexRebuildComplete,
    /// Index document removed
    IndexDeleted,

    // Lock
    /// Lock held by someone else, polling
    LockWait,
    /// Lock acquired
    LockAcquired,
    /// Gave up waiting for a lock
    LockTimeout,
    /// Lock document could not be removed
    LockReleaseFailed,

    // Fallback / replicate
    /// Primary tier refilled from the secondary tier
    FallbackResync,
    /// Main adapter restored after a failed replica mutation
    ReplicationRollback,
    /// Main adapter could not be restored (state undefined)
    ReplicationRollbackFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::AdapterInitialized => "ADAPTER_INITIALIZED",
            Event::DocumentWritten => "DOCUMENT_WRITTEN",
            Event::DocumentDeleted => "DOCUMENT_DELETED",
            Event::AtomicTempCleanup => "ATOMIC_TEMP_CLEANUP",
            Event::TombstoneRestored => "TOMBSTONE_RESTORED",
            Event::IndexRebuildBegin => "INDEX_REBUILD_BEGIN",
            Event::IndexRebuildComplete => "INDEX_REBUILD_COMPLETE",
            Event::IndexDeleted => "INDEX_DELETED",
            Event::LockWait => "LOCK_WAIT",
            Event::LockAcquired => "LOCK_ACQUIRED",
            Event::LockTimeout => "LOCK_TIMEOUT",
            Event::LockReleaseFailed => "LOCK_RELEASE_FAILED",
            Event::FallbackResync => "FALLBACK_RESYNC",
            Event::ReplicationRollback => "REPLICATION_ROLLBACK",
            Event::ReplicationRollbackFailed => "REPLICATION_ROLLBACK_FAILED",
        }
    }

    /// Severity this event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::DocumentWritten | Event::DocumentDeleted | Event::LockWait | Event::LockAcquired => {
                Severity::Trace
            }
            Event::AdapterInitialized
            | Event::IndexRebuildBegin
            | Event::IndexRebuildComplete
            | Event::IndexDeleted
            | Event::FallbackResync => Severity::Info,
            Event::AtomicTempCleanup | Event::TombstoneRestored | Event::ReplicationRollback => {
                Severity::Warn
            }
            Event::LockTimeout | Event::LockReleaseFailed => Severity::Error,
            Event::ReplicationRollbackFailed => Severity::Fatal,
        }
    }

    /// Returns true if this event leaves storage in an undefined state
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Log this event with the given fields
    pub fn log(&self, fields: &[(&str, &str)]) {
        Logger::log(self.severity(), self.as_str(), fields);
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Event; 15] = [
        Event::AdapterInitialized,
        Event::DocumentWritten,
        Event::DocumentDeleted,
        Event::AtomicTempCleanup,
        Event::TombstoneRestored,
        Event::IndexRebuildBegin,
        Event::IndexRebuildComplete,
        Event::IndexDeleted,
        Event::LockWait,
        Event::LockAcquired,
        Event::LockTimeout,
        Event::LockReleaseFailed,
        Event::FallbackResync,
        Event::ReplicationRollback,
        Event::ReplicationRollbackFailed,
    ];

    #[test]
    fn test_event_names_are_screaming_snake() {
        for event in ALL {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_only_failed_rollback_is_fatal() {
        let fatal: Vec<_> = ALL.iter().filter(|e| e.is_fatal()).collect();
        assert_eq!(fatal, vec![&Event::ReplicationRollbackFailed]);
    }

    #[test]
    fn test_hot_path_events_are_trace() {
        assert_eq!(Event::DocumentWritten.severity(), Severity::Trace);
        assert_eq!(Event::LockWait.severity(), Severity::Trace);
    }
}
