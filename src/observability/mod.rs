//! Observability for the adapter stack
//!
//! - Structured logging (JSON lines)
//! - Typed lifecycle events with fixed severities
//! - No async, no background threads
//!
//! # Usage
//!
//! ```ignore
//! use aerostore::observability::{log_event, Event, Logger, Severity};
//!
//! Logger::set_min_severity(Severity::Trace);
//! log_event(Event::IndexRebuildBegin, &[("collection", "users")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a typed event with fields at the event's own severity.
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    event.log(fields);
}
