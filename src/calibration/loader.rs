//! Calibration loader
//!
//! Resolves records through a `RecordProvider`, validates them and classifies
//! every failure as a `LoadError`. A failing record never takes other
//! machines down with it: bulk loads report per-machine errors alongside the
//! calibrations that did validate.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::errors::{LoadError, LoadResult};
use super::provider::RecordProvider;
use super::types::MachineCalibration;
use super::validator::CalibrationValidator;
use crate::observability::{log_event_with_fields, Event};

/// Loads calibrations from one provider with one validator.
pub struct CalibrationLoader<'v, P> {
    provider: P,
    validator: &'v CalibrationValidator,
}

impl<P: RecordProvider> CalibrationLoader<'static, P> {
    /// Creates a loader validating against the standard schema.
    pub fn new(provider: P) -> Self {
        Self::with_validator(provider, CalibrationValidator::standard())
    }
}

impl<'v, P: RecordProvider> CalibrationLoader<'v, P> {
    pub fn with_validator(provider: P, validator: &'v CalibrationValidator) -> Self {
        Self {
            provider,
            validator,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Loads and validates one machine's calibration.
    pub fn load(&self, machine_id: &str) -> LoadResult<MachineCalibration> {
        log_event_with_fields(Event::LoadStart, &[("machine_id", machine_id)]);

        let listed = self
            .provider
            .list_machine_ids()
            .map_err(|source| provider_failed("listing", source))?;

        match listed.iter().filter(|id| id.as_str() == machine_id).count() {
            0 => {
                log_event_with_fields(Event::RecordNotFound, &[("machine_id", machine_id)]);
                return Err(LoadError::NotFound(machine_id.to_string()));
            }
            1 => {}
            _ => {
                log_event_with_fields(Event::DuplicateMachineId, &[("machine_id", machine_id)]);
                return Err(LoadError::DuplicateId(machine_id.to_string()));
            }
        }

        self.load_listed(machine_id)
    }

    /// Loads every listed machine.
    ///
    /// Each record is validated independently. A machine id listed more than
    /// once is reported once as `DuplicateId` and none of its records is kept.
    pub fn load_all(&self) -> LoadReport {
        log_event_with_fields(Event::LoadStart, &[("machine_id", "*")]);

        let mut report = LoadReport::default();

        let listed = match self.provider.list_machine_ids() {
            Ok(listed) => listed,
            Err(source) => {
                report.errors.push(provider_failed("listing", source));
                report.log_summary();
                return report;
            }
        };

        let mut seen = BTreeSet::new();
        let mut duplicated = BTreeSet::new();
        for id in &listed {
            if !seen.insert(id.as_str()) {
                duplicated.insert(id.as_str());
            }
        }

        // Validation runs for every distinct id, duplicated or not
        let mut validated = Vec::with_capacity(seen.len());
        let mut visited = BTreeSet::new();
        for id in &listed {
            if visited.insert(id.as_str()) {
                validated.push((id.as_str(), self.load_listed(id)));
            }
        }

        for (id, result) in validated {
            if duplicated.contains(id) {
                log_event_with_fields(Event::DuplicateMachineId, &[("machine_id", id)]);
                report.errors.push(LoadError::DuplicateId(id.to_string()));
                continue;
            }
            match result {
                Ok(calibration) => {
                    report.calibrations.insert(id.to_string(), calibration);
                }
                Err(error) => report.errors.push(error),
            }
        }

        report.log_summary();
        report
    }

    /// Fetches and validates a record known to be listed exactly once.
    fn load_listed(&self, machine_id: &str) -> LoadResult<MachineCalibration> {
        let record: Value = match self.provider.get_raw_record(machine_id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                log_event_with_fields(Event::RecordNotFound, &[("machine_id", machine_id)]);
                return Err(LoadError::NotFound(machine_id.to_string()));
            }
            Err(source) => return Err(provider_failed(machine_id, source)),
        };

        match self.validator.validate_listed(machine_id, &record) {
            Ok(calibration) => {
                log_event_with_fields(Event::RecordValidated, &[("machine_id", machine_id)]);
                Ok(calibration)
            }
            Err(errors) => {
                let count = errors.len().to_string();
                let detail = errors.to_string();
                log_event_with_fields(
                    Event::RecordRejected,
                    &[
                        ("errors", detail.as_str()),
                        ("error_count", count.as_str()),
                        ("machine_id", machine_id),
                    ],
                );
                Err(LoadError::Invalid {
                    machine_id: machine_id.to_string(),
                    errors,
                })
            }
        }
    }
}

fn provider_failed(context: &str, source: super::errors::ProviderError) -> LoadError {
    let message = source.to_string();
    log_event_with_fields(
        Event::ProviderFailed,
        &[("context", context), ("error", message.as_str())],
    );
    LoadError::Provider {
        context: context.to_string(),
        source,
    }
}

/// Outcome of a bulk load: the calibrations that validated and every error.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    calibrations: BTreeMap<String, MachineCalibration>,
    errors: Vec<LoadError>,
}

impl LoadReport {
    pub fn calibrations(&self) -> &BTreeMap<String, MachineCalibration> {
        &self.calibrations
    }

    /// Errors in listing order
    pub fn errors(&self) -> &[LoadError] {
        &self.errors
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// All calibrations if every record loaded, otherwise every error.
    pub fn into_result(self) -> Result<BTreeMap<String, MachineCalibration>, Vec<LoadError>> {
        if self.errors.is_empty() {
            Ok(self.calibrations)
        } else {
            Err(self.errors)
        }
    }

    /// Splits the report into a shareable set and the errors.
    pub fn into_set(self) -> (CalibrationSet, Vec<LoadError>) {
        let set = CalibrationSet::new(self.calibrations);
        (set, self.errors)
    }

    fn log_summary(&self) {
        let loaded = self.calibrations.len().to_string();
        let failed = self.errors.len().to_string();
        log_event_with_fields(
            Event::BulkLoadComplete,
            &[("failed", failed.as_str()), ("loaded", loaded.as_str())],
        );
    }
}

/// Immutable snapshot of loaded calibrations, cheap to share across threads.
#[derive(Debug, Clone)]
pub struct CalibrationSet {
    machines: BTreeMap<String, Arc<MachineCalibration>>,
    loaded_at: DateTime<Utc>,
}

impl CalibrationSet {
    pub fn new(calibrations: BTreeMap<String, MachineCalibration>) -> Self {
        Self {
            machines: calibrations
                .into_iter()
                .map(|(id, calibration)| (id, Arc::new(calibration)))
                .collect(),
            loaded_at: Utc::now(),
        }
    }

    pub fn get(&self, machine_id: &str) -> Option<Arc<MachineCalibration>> {
        self.machines.get(machine_id).cloned()
    }

    /// Machine ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.machines.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    /// When the underlying bulk load finished
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::errors::{ProviderError, ProviderResult};
    use crate::calibration::fixtures::{record, with};
    use crate::calibration::provider::MemoryProvider;
    use serde_json::json;
    use std::path::PathBuf;

    fn invalid(machine_id: &str) -> Value {
        with(record(machine_id), |obj| {
            obj["neutral"]["wrist2"] = json!(450);
        })
    }

    #[test]
    fn test_load_valid() {
        let provider = MemoryProvider::new().with_record("TAIF", record("TAIF"));
        let loader = CalibrationLoader::new(provider);
        assert_eq!(loader.load("TAIF").unwrap().machine_id(), "TAIF");
    }

    #[test]
    fn test_load_not_found() {
        let loader = CalibrationLoader::new(MemoryProvider::new());
        let err = loader.load("TAIF").unwrap_err();
        assert_eq!(err, LoadError::NotFound("TAIF".into()));
        assert_eq!(err.code(), "CAL_NOT_FOUND");
    }

    #[test]
    fn test_load_invalid_lists_field() {
        let provider = MemoryProvider::new().with_record("TAIF", invalid("TAIF"));
        let loader = CalibrationLoader::new(provider);
        let err = loader.load("TAIF").unwrap_err();
        assert_eq!(err.code(), "CAL_INVALID");
        assert_eq!(err.machine_id(), Some("TAIF"));
        assert_eq!(err.field_errors().len(), 1);
        assert_eq!(err.field_errors()[0].field, "neutral.wrist2");
    }

    #[test]
    fn test_load_duplicate() {
        let provider = MemoryProvider::new()
            .with_record("TAIF", record("TAIF"))
            .with_record("TAIF", record("TAIF"));
        let loader = CalibrationLoader::new(provider);
        assert_eq!(
            loader.load("TAIF").unwrap_err(),
            LoadError::DuplicateId("TAIF".into())
        );
    }

    #[test]
    fn test_load_id_mismatch_is_invalid() {
        let provider = MemoryProvider::new().with_record("JAZAN", record("TAIF"));
        let loader = CalibrationLoader::new(provider);
        let err = loader.load("JAZAN").unwrap_err();
        assert_eq!(err.code(), "CAL_INVALID");
        assert_eq!(err.field_errors()[0].field, "machineId");
    }

    #[test]
    fn test_load_all_isolates_failures() {
        let provider = MemoryProvider::new()
            .with_record("TAIF", record("TAIF"))
            .with_record("USA", invalid("USA"))
            .with_record("JAZAN", record("JAZAN"));
        let report = CalibrationLoader::new(provider).load_all();

        assert_eq!(report.calibrations().len(), 2);
        assert!(report.calibrations().contains_key("TAIF"));
        assert!(report.calibrations().contains_key("JAZAN"));
        assert_eq!(report.errors().len(), 1);
        assert_eq!(report.errors()[0].machine_id(), Some("USA"));
        assert!(!report.is_clean());
    }

    #[test]
    fn test_load_all_drops_both_duplicates() {
        let provider = MemoryProvider::new()
            .with_record("TAIF", record("TAIF"))
            .with_record("JAZAN", record("JAZAN"))
            .with_record("TAIF", record("TAIF"))
            .with_record("TAIF", invalid("TAIF"));
        let report = CalibrationLoader::new(provider).load_all();

        assert_eq!(report.calibrations().len(), 1);
        assert!(report.calibrations().contains_key("JAZAN"));
        assert_eq!(report.errors(), &[LoadError::DuplicateId("TAIF".into())]);
    }

    #[test]
    fn test_load_all_empty_provider() {
        let report = CalibrationLoader::new(MemoryProvider::new()).load_all();
        assert!(report.is_clean());
        assert!(report.calibrations().is_empty());
    }

    #[test]
    fn test_into_result() {
        let clean = CalibrationLoader::new(MemoryProvider::new().with_record("TAIF", record("TAIF")))
            .load_all()
            .into_result()
            .unwrap();
        assert_eq!(clean.len(), 1);

        let errors = CalibrationLoader::new(MemoryProvider::new().with_record("USA", invalid("USA")))
            .load_all()
            .into_result()
            .unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_into_set_shares_calibrations() {
        let provider = MemoryProvider::new()
            .with_record("TAIF", record("TAIF"))
            .with_record("JAZAN", record("JAZAN"));
        let (set, errors) = CalibrationLoader::new(provider).load_all().into_set();

        assert!(errors.is_empty());
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["JAZAN", "TAIF"]);
        let first = set.get("TAIF").unwrap();
        let second = set.get("TAIF").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(set.loaded_at() <= Utc::now());
    }

    struct BrokenProvider;

    impl RecordProvider for BrokenProvider {
        fn list_machine_ids(&self) -> ProviderResult<Vec<String>> {
            Ok(vec!["TAIF".into()])
        }

        fn get_raw_record(&self, _machine_id: &str) -> ProviderResult<Option<Value>> {
            Err(ProviderError::Io {
                path: PathBuf::from("/calibrations/TAIF.json"),
                message: "permission denied".into(),
            })
        }
    }

    #[test]
    fn test_provider_failure_reported() {
        let loader = CalibrationLoader::new(BrokenProvider);
        let err = loader.load("TAIF").unwrap_err();
        assert_eq!(err.code(), "CAL_PROVIDER_FAILED");

        let report = loader.load_all();
        assert!(report.calibrations().is_empty());
        assert_eq!(report.errors().len(), 1);
    }

    #[test]
    fn test_borrowed_provider() {
        let provider = MemoryProvider::new().with_record("TAIF", record("TAIF"));
        let loader = CalibrationLoader::new(&provider);
        assert!(loader.load("TAIF").is_ok());
        assert_eq!(provider.len(), 1);
    }
}
