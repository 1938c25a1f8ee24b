//! Machine calibration subsystem
//!
//! Each cassette-handling cell carries one calibration record: identity,
//! motion tuning, pickup grid geometry, pick motion profile, named joint
//! poses, track handoff sequences and per-slot depth offsets. Records are
//! authored as JSON and must pass validation before any motion uses them.
//!
//! # Design Principles
//!
//! - Validation is total: every bad field is reported, not just the first
//! - No undeclared fields, no repeated keys, no nulls, no silent defaults for required fields
//! - Units are converted once, at validation (meters and radians at runtime)
//! - Slot tables match the declared layout exactly
//! - A bad record disqualifies only its own machine
//! - Validated calibrations are immutable

mod authoring;
mod errors;
mod geometry;
mod loader;
mod provider;
mod schema;
mod slots;
mod strict_json;
mod types;
mod units;
mod validator;

#[cfg(test)]
pub(crate) mod fixtures;

pub use authoring::to_authored;
pub use errors::{
    FieldError, LoadError, LoadResult, ProviderError, ProviderResult, SchemaDefinitionError,
    Severity, ValidationErrors,
};
pub use geometry::{
    GeometryError, GeometryResult, PickTarget, SlotPosition, APPROACH_CLEARANCE_M,
    UPPER_ROW_DEPTH_RAMP,
};
pub use loader::{CalibrationLoader, CalibrationSet, LoadReport};
pub use provider::{DirectoryProvider, MemoryProvider, RecordProvider};
pub use schema::{
    fields, CalibrationSchema, FieldKind, FieldSpec, Range, GRIPPER_TYPES, JOINT_LIMIT_DEG,
    MACHINE_ID_PATTERN,
};
pub use slots::{parse_positive_id, SlotLayout};
pub use strict_json::parse_record;
pub use types::{
    GripperType, Identity, Joint, JointPose, MachineCalibration, MotionTuning, NamedPoses,
    PickProfile, PickupGeometry, SlotDepthOffsets, TrackSequence, TrackStage,
};
pub use units::{deg_to_rad, format_quantity, rad_to_deg, Dimension, Unit};
pub use validator::{validate, CalibrationValidator, ValidationResult};
