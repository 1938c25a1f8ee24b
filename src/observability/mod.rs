//! Observability for the calibration loader
//!
//! Structured JSON-line logging of loader lifecycle events.
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on loading or validation
//! 3. No async or background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use armcal::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::RecordRejected, &[("machine_id", "TAIF")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

#[cfg(test)]
pub(crate) use logger::capture_log;

/// Log an event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
