//! Record providers
//!
//! A provider lists machine ids and hands out raw, unvalidated records. The
//! listing is a sequence, not a set: an id that appears twice is reported
//! twice so the loader can reject it.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::authoring::to_authored;
use super::errors::{ProviderError, ProviderResult};
use super::schema::fields;
use super::strict_json::parse_record;
use super::types::MachineCalibration;
use crate::config::LoaderConfig;
use crate::observability::{log_event_with_fields, Event};

/// Source of raw calibration records
pub trait RecordProvider {
    /// Every machine id with a record, in listing order, duplicates included.
    fn list_machine_ids(&self) -> ProviderResult<Vec<String>>;

    /// The first record listed under `machine_id`, or `None`.
    fn get_raw_record(&self, machine_id: &str) -> ProviderResult<Option<Value>>;
}

impl<P: RecordProvider + ?Sized> RecordProvider for &P {
    fn list_machine_ids(&self) -> ProviderResult<Vec<String>> {
        (**self).list_machine_ids()
    }

    fn get_raw_record(&self, machine_id: &str) -> ProviderResult<Option<Value>> {
        (**self).get_raw_record(machine_id)
    }
}

/// In-memory records, mainly for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    records: Vec<(String, Value)>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record listed under `machine_id`.
    pub fn with_record(mut self, machine_id: impl Into<String>, record: Value) -> Self {
        self.insert(machine_id, record);
        self
    }

    /// Appends a record. An existing id is kept, producing a duplicate listing.
    pub fn insert(&mut self, machine_id: impl Into<String>, record: Value) {
        self.records.push((machine_id.into(), record));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordProvider for MemoryProvider {
    fn list_machine_ids(&self) -> ProviderResult<Vec<String>> {
        Ok(self.records.iter().map(|(id, _)| id.clone()).collect())
    }

    fn get_raw_record(&self, machine_id: &str) -> ProviderResult<Option<Value>> {
        Ok(self
            .records
            .iter()
            .find(|(id, _)| id == machine_id)
            .map(|(_, record)| record.clone()))
    }
}

/// One record file read from disk
#[derive(Debug, Clone)]
struct RecordFile {
    machine_id: String,
    content: Result<Value, ProviderError>,
}

/// Records stored one file per machine in a directory.
///
/// Files are read once, when the provider is opened, in file name order.
/// A file's machine id is its record's `machineId`; a file that cannot be
/// read or parsed is listed under its file stem and reports its error when
/// fetched.
#[derive(Debug)]
pub struct DirectoryProvider {
    record_dir: PathBuf,
    extension: String,
    files: Vec<RecordFile>,
}

impl DirectoryProvider {
    /// Opens `record_dir` and reads every `*.<extension>` file in it.
    pub fn open(record_dir: &Path, extension: &str) -> ProviderResult<Self> {
        let extension = extension.trim_start_matches('.').to_string();

        let entries = fs::read_dir(record_dir).map_err(|e| ProviderError::Io {
            path: record_dir.to_path_buf(),
            message: format!("failed to read record directory: {}", e),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ProviderError::Io {
                path: record_dir.to_path_buf(),
                message: format!("failed to read directory entry: {}", e),
            })?;
            let path = entry.path();

            // Skip files with another extension
            if path.extension().map_or(true, |ext| ext != extension.as_str()) {
                continue;
            }
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let files = paths.into_iter().map(read_record_file).collect();

        Ok(Self {
            record_dir: record_dir.to_path_buf(),
            extension,
            files,
        })
    }

    /// Opens the directory named by a loader configuration.
    pub fn from_config(config: &LoaderConfig) -> ProviderResult<Self> {
        Self::open(&config.record_dir, config.extension())
    }

    pub fn record_dir(&self) -> &Path {
        &self.record_dir
    }

    /// Path a machine's record is saved under
    pub fn record_path(&self, machine_id: &str) -> PathBuf {
        self.record_dir
            .join(format!("{}.{}", machine_id, self.extension))
    }

    /// Writes a calibration as an authored record file.
    ///
    /// Existing records are never overwritten; a recalibration is saved by
    /// removing the old file first.
    pub fn save_calibration(&mut self, calibration: &MachineCalibration) -> ProviderResult<PathBuf> {
        let machine_id = calibration.machine_id();
        let path = self.record_path(machine_id);

        if path.exists() || self.files.iter().any(|file| file.machine_id == machine_id) {
            return Err(ProviderError::AlreadyExists(path));
        }

        let record = to_authored(calibration);
        let content = serde_json::to_string_pretty(&record).map_err(|e| ProviderError::Malformed {
            path: path.clone(),
            message: format!("failed to serialize record: {}", e),
        })?;

        fs::write(&path, content).map_err(|e| ProviderError::Io {
            path: path.clone(),
            message: format!("failed to write file: {}", e),
        })?;

        self.files.push(RecordFile {
            machine_id: machine_id.to_string(),
            content: Ok(record),
        });

        let saved_to = path.display().to_string();
        log_event_with_fields(
            Event::RecordSaved,
            &[("machine_id", machine_id), ("path", saved_to.as_str())],
        );

        Ok(path)
    }
}

impl RecordProvider for DirectoryProvider {
    fn list_machine_ids(&self) -> ProviderResult<Vec<String>> {
        Ok(self.files.iter().map(|file| file.machine_id.clone()).collect())
    }

    fn get_raw_record(&self, machine_id: &str) -> ProviderResult<Option<Value>> {
        match self.files.iter().find(|file| file.machine_id == machine_id) {
            Some(file) => file.content.clone().map(Some),
            None => Ok(None),
        }
    }
}

/// Reads and parses one record file, keeping any failure for later.
fn read_record_file(path: PathBuf) -> RecordFile {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let content = fs::read_to_string(&path)
        .map_err(|e| ProviderError::Io {
            path: path.clone(),
            message: format!("failed to read file: {}", e),
        })
        .and_then(|text| {
            parse_record(&text).map_err(|e| ProviderError::Malformed {
                path: path.clone(),
                message: format!("invalid JSON: {}", e),
            })
        });

    let machine_id = content
        .as_ref()
        .ok()
        .and_then(|record| record.get(fields::MACHINE_ID))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(stem);

    RecordFile {
        machine_id,
        content,
    }
}
