//! Observable calibration events
//!
//! Events are explicit and typed. Each carries the severity it is logged at.

use std::fmt;

use super::Severity;

/// Observable events of the calibration loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Loader configuration read
    ConfigLoaded,

    // Loading
    /// Single or bulk load begins
    LoadStart,
    /// Record passed validation
    RecordValidated,
    /// Record failed validation
    RecordRejected,
    /// No record for the requested machine
    RecordNotFound,
    /// Machine id listed by more than one record
    DuplicateMachineId,
    /// Provider could not list or produce a record
    ProviderFailed,
    /// Bulk load finished
    BulkLoadComplete,

    // Authoring
    /// Record written by a provider
    RecordSaved,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::LoadStart => "CALIBRATION_LOAD_BEGIN",
            Event::RecordValidated => "CALIBRATION_VALIDATED",
            Event::RecordRejected => "CALIBRATION_REJECTED",
            Event::RecordNotFound => "CALIBRATION_NOT_FOUND",
            Event::DuplicateMachineId => "CALIBRATION_DUPLICATE_ID",
            Event::ProviderFailed => "CALIBRATION_PROVIDER_FAILED",
            Event::BulkLoadComplete => "CALIBRATION_LOAD_COMPLETE",
            Event::RecordSaved => "CALIBRATION_SAVED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::RecordRejected | Event::RecordNotFound | Event::DuplicateMachineId => {
                Severity::Warn
            }
            Event::ProviderFailed => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
