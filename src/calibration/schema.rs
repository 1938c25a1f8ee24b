//! Calibration schema definition
//!
//! The schema declares, for every field of a machine calibration record, its
//! kind, authored unit, canonical unit, valid range and whether it is
//! required. Ranges are inclusive and expressed in authored units.
//!
//! Forbidden in records:
//! - Missing required fields
//! - Undeclared fields (at every nesting level)
//! - Null values
//! - Values outside the declared range

use std::collections::HashSet;

use super::errors::SchemaDefinitionError;
use super::units::Unit;

/// Field names as they appear in authored records
pub mod fields {
    pub const MACHINE_ID: &str = "machineId";
    pub const ROBOT_SERIAL: &str = "robotSerial";
    pub const GRIPPER_SERIAL: &str = "gripperSerial";
    pub const GRIPPER_TYPE: &str = "gripperType";
    pub const HALTED_AT_STARTUP: &str = "haltedAtStartup";

    pub const ACCELERATION: &str = "acceleration";
    pub const SPEED: &str = "speed";
    pub const BLEND_TIME: &str = "blendTime";
    pub const BLEND_RADIUS: &str = "blendRadius";
    pub const ACTION_DELAY: &str = "actionDelaySeconds";
    pub const DROP_RELEASE_DELAY: &str = "dropReleaseDelaySeconds";

    pub const DELTA_X: &str = "deltaX";
    pub const DELTA_Y: &str = "deltaY";
    pub const HOME_X: &str = "homeX";
    pub const HOME_Y: &str = "homeY";
    pub const CALIBRATION_ANGLE: &str = "calibrationAngleDeg";
    pub const SAFE_OFFSET: &str = "safeOffset";

    pub const HOVER_HEIGHT: &str = "hoverHeight";
    pub const MOVE_IN_DISTANCE: &str = "moveInDistance";
    pub const MOVE_UP_DISTANCE: &str = "moveUpDistance";
    pub const MOVE_OUT_DISTANCE: &str = "moveOutDistance";
    pub const PICK_ANGLE: &str = "pickAngleDeg";
    pub const PICK_HEIGHT_OFFSET: &str = "pickHeightOffset";

    pub const NEUTRAL: &str = "neutral";
    pub const LEFT: &str = "left";
    pub const RIGHT: &str = "right";
    pub const PRESENT_CAR: &str = "presentCar";
    pub const TRACKS: &str = "tracks";

    pub const SLOT_COUNT: &str = "slotCount";
    pub const RETIRED_SLOTS: &str = "retiredSlots";
    pub const SLOT_DEPTH_OFFSETS: &str = "slotDepthOffsets";
}

/// Inclusive value range in authored units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// `[-limit, limit]`
    pub const fn symmetric(limit: f64) -> Self {
        Self {
            min: -limit,
            max: limit,
        }
    }

    /// `[0, max]`
    pub const fn non_negative(max: f64) -> Self {
        Self { min: 0.0, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    fn is_well_formed(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }

    /// Human-readable constraint, e.g. `exceeds ±360°`.
    pub fn describe(&self, unit: Unit) -> String {
        let suffix = match unit {
            Unit::Degree => "°".to_string(),
            other => format!(" {}", other.symbol()),
        };
        if self.min == -self.max {
            format!("exceeds ±{}{}", self.max, suffix)
        } else {
            format!("outside [{}, {}]{}", self.min, self.max, suffix)
        }
    }
}

/// What a field holds
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Non-empty string
    Text,
    /// Non-empty string matching a pattern
    Identifier { pattern: &'static str },
    /// One of a fixed set of strings
    Enum { allowed: &'static [&'static str] },
    /// Number authored in one unit and stored in another
    Scalar { authored: Unit, canonical: Unit },
    /// Positive integer
    Count,
    /// Boolean
    Flag,
    /// Six named joint angles, authored in degrees
    Pose,
    /// Object keyed by track id, each a four-stage pose sequence. `joints`
    /// bounds every joint of every stage, in degrees.
    TrackTable { joints: Range },
    /// Object keyed by slot id, each a depth offset
    SlotTable { authored: Unit, canonical: Unit },
    /// List of positive integer ids
    IdList,
}

impl FieldKind {
    /// Kind name used in schema definition errors
    pub fn tag(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Identifier { .. } => "identifier",
            FieldKind::Enum { .. } => "enum",
            FieldKind::Scalar { .. } => "scalar",
            FieldKind::Count => "count",
            FieldKind::Flag => "flag",
            FieldKind::Pose => "pose",
            FieldKind::TrackTable { .. } => "track table",
            FieldKind::SlotTable { .. } => "slot table",
            FieldKind::IdList => "id list",
        }
    }
}

/// Declaration of one record field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// For poses the range applies to every joint, for tables to every value
    /// (slots) or key (tracks).
    pub range: Option<Range>,
    pub required: bool,
}

impl FieldSpec {
    fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            range: None,
            required: true,
        }
    }

    fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            range: None,
            required: false,
        }
    }

    fn within(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }

    fn scalar(name: &'static str, unit: Unit, range: Range) -> Self {
        Self::required(
            name,
            FieldKind::Scalar {
                authored: unit,
                canonical: unit.canonical(),
            },
        )
        .within(range)
    }
}

pub const GRIPPER_TYPES: &[&str] = &["IO", "ModBus"];
pub const MACHINE_ID_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9_.-]*$";

/// Joint angles beyond one full turn are not accepted.
pub const JOINT_LIMIT_DEG: f64 = 360.0;

/// Fields the validator reads, with the kind it expects for each.
pub(crate) const LAYOUT: &[(&str, &str)] = &[
    (fields::MACHINE_ID, "identifier"),
    (fields::ROBOT_SERIAL, "text"),
    (fields::GRIPPER_SERIAL, "text"),
    (fields::GRIPPER_TYPE, "enum"),
    (fields::HALTED_AT_STARTUP, "flag"),
    (fields::ACCELERATION, "scalar"),
    (fields::SPEED, "scalar"),
    (fields::BLEND_TIME, "scalar"),
    (fields::BLEND_RADIUS, "scalar"),
    (fields::ACTION_DELAY, "scalar"),
    (fields::DROP_RELEASE_DELAY, "scalar"),
    (fields::DELTA_X, "scalar"),
    (fields::DELTA_Y, "scalar"),
    (fields::HOME_X, "scalar"),
    (fields::HOME_Y, "scalar"),
    (fields::CALIBRATION_ANGLE, "scalar"),
    (fields::SAFE_OFFSET, "scalar"),
    (fields::HOVER_HEIGHT, "scalar"),
    (fields::MOVE_IN_DISTANCE, "scalar"),
    (fields::MOVE_UP_DISTANCE, "scalar"),
    (fields::MOVE_OUT_DISTANCE, "scalar"),
    (fields::PICK_ANGLE, "scalar"),
    (fields::PICK_HEIGHT_OFFSET, "scalar"),
    (fields::NEUTRAL, "pose"),
    (fields::LEFT, "pose"),
    (fields::RIGHT, "pose"),
    (fields::PRESENT_CAR, "pose"),
    (fields::TRACKS, "track table"),
    (fields::SLOT_COUNT, "count"),
    (fields::RETIRED_SLOTS, "id list"),
    (fields::SLOT_DEPTH_OFFSETS, "slot table"),
];

/// Calibration schema: one declaration per record field
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSchema {
    fields: Vec<FieldSpec>,
}

impl CalibrationSchema {
    /// Creates a schema from explicit field declarations.
    ///
    /// The declarations are not checked here; `CalibrationValidator::new`
    /// rejects a malformed schema.
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// The schema every site record is validated against.
    pub fn standard() -> Self {
        use fields::*;

        let length_mm = Range::symmetric(2000.0);
        let pick_m = Range::symmetric(1.0);
        let joint = Range::symmetric(JOINT_LIMIT_DEG);

        Self::new(vec![
            // Identity
            FieldSpec::required(
                MACHINE_ID,
                FieldKind::Identifier {
                    pattern: MACHINE_ID_PATTERN,
                },
            ),
            FieldSpec::required(ROBOT_SERIAL, FieldKind::Text),
            FieldSpec::required(GRIPPER_SERIAL, FieldKind::Text),
            FieldSpec::required(
                GRIPPER_TYPE,
                FieldKind::Enum {
                    allowed: GRIPPER_TYPES,
                },
            ),
            FieldSpec::optional(HALTED_AT_STARTUP, FieldKind::Flag),
            // Motion tuning
            FieldSpec::scalar(ACCELERATION, Unit::MeterPerSecondSquared, Range::non_negative(10.0)),
            FieldSpec::scalar(SPEED, Unit::MeterPerSecond, Range::non_negative(3.0)),
            FieldSpec::scalar(BLEND_TIME, Unit::Second, Range::non_negative(10.0)),
            FieldSpec::scalar(BLEND_RADIUS, Unit::Meter, Range::non_negative(1.0)),
            FieldSpec::scalar(ACTION_DELAY, Unit::Second, Range::non_negative(60.0)),
            FieldSpec {
                required: false,
                ..FieldSpec::scalar(DROP_RELEASE_DELAY, Unit::Second, Range::non_negative(60.0))
            },
            // Pickup geometry
            FieldSpec::scalar(DELTA_X, Unit::Millimeter, length_mm),
            FieldSpec::scalar(DELTA_Y, Unit::Millimeter, length_mm),
            FieldSpec::scalar(HOME_X, Unit::Millimeter, length_mm),
            FieldSpec::scalar(HOME_Y, Unit::Millimeter, length_mm),
            FieldSpec::scalar(CALIBRATION_ANGLE, Unit::Degree, Range::symmetric(45.0)),
            FieldSpec::scalar(SAFE_OFFSET, Unit::Meter, Range::symmetric(0.5)),
            // Pick motion profile
            FieldSpec::scalar(HOVER_HEIGHT, Unit::Meter, pick_m),
            FieldSpec::scalar(MOVE_IN_DISTANCE, Unit::Meter, pick_m),
            FieldSpec::scalar(MOVE_UP_DISTANCE, Unit::Meter, pick_m),
            FieldSpec::scalar(MOVE_OUT_DISTANCE, Unit::Meter, pick_m),
            FieldSpec::scalar(PICK_ANGLE, Unit::Degree, Range::symmetric(90.0)),
            FieldSpec::scalar(PICK_HEIGHT_OFFSET, Unit::Meter, Range::symmetric(0.5)),
            // Poses
            FieldSpec::required(NEUTRAL, FieldKind::Pose).within(joint),
            FieldSpec::required(LEFT, FieldKind::Pose).within(joint),
            FieldSpec::required(RIGHT, FieldKind::Pose).within(joint),
            FieldSpec::optional(PRESENT_CAR, FieldKind::Pose).within(joint),
            FieldSpec::required(TRACKS, FieldKind::TrackTable { joints: joint })
                .within(Range::new(1.0, 16.0)),
            // Slots
            FieldSpec::required(SLOT_COUNT, FieldKind::Count).within(Range::new(1.0, 10_000.0)),
            FieldSpec::optional(RETIRED_SLOTS, FieldKind::IdList),
            FieldSpec::required(
                SLOT_DEPTH_OFFSETS,
                FieldKind::SlotTable {
                    authored: Unit::Millimeter,
                    canonical: Unit::Meter,
                },
            )
            .within(Range::symmetric(200.0)),
        ])
    }

    /// Replaces the range of one field, e.g. a site with a longer reach.
    ///
    /// For `tracks` this is the range of track ids; track joints are set
    /// with [`with_track_joint_range`](Self::with_track_joint_range).
    pub fn with_range(mut self, field: &str, range: Range) -> Result<Self, SchemaDefinitionError> {
        let spec = self
            .fields
            .iter_mut()
            .find(|spec| spec.name == field)
            .ok_or_else(|| SchemaDefinitionError::UnknownField(field.to_string()))?;
        spec.range = Some(range);
        Ok(self)
    }

    /// Replaces the joint range applied to every track stage pose.
    pub fn with_track_joint_range(mut self, range: Range) -> Result<Self, SchemaDefinitionError> {
        let spec = self
            .fields
            .iter_mut()
            .find(|spec| spec.name == fields::TRACKS)
            .ok_or_else(|| SchemaDefinitionError::UnknownField(fields::TRACKS.to_string()))?;
        match &mut spec.kind {
            FieldKind::TrackTable { joints } => *joints = range,
            other => {
                return Err(SchemaDefinitionError::KindMismatch {
                    field: fields::TRACKS.to_string(),
                    expected: "track table",
                    actual: other.tag(),
                })
            }
        }
        Ok(self)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Checks the schema against itself and against the layout the validator reads.
    pub fn check(&self) -> Result<(), SchemaDefinitionError> {
        let mut seen = HashSet::new();
        for spec in &self.fields {
            if !seen.insert(spec.name) {
                return Err(SchemaDefinitionError::DuplicateField(spec.name.to_string()));
            }

            if let Some(range) = spec.range {
                if !range.is_well_formed() {
                    return Err(SchemaDefinitionError::InvalidRange {
                        field: spec.name.to_string(),
                        min: range.min,
                        max: range.max,
                    });
                }
            }

            if let FieldKind::TrackTable { joints } = spec.kind {
                if !joints.is_well_formed() {
                    return Err(SchemaDefinitionError::InvalidRange {
                        field: spec.name.to_string(),
                        min: joints.min,
                        max: joints.max,
                    });
                }
            }

            if let FieldKind::Scalar { authored, canonical }
            | FieldKind::SlotTable { authored, canonical } = spec.kind
            {
                if authored.canonical() != canonical {
                    return Err(SchemaDefinitionError::UnitMismatch {
                        field: spec.name.to_string(),
                        authored,
                        canonical,
                    });
                }
            }
        }

        for &(name, expected) in LAYOUT {
            let spec = self
                .field(name)
                .ok_or_else(|| SchemaDefinitionError::UnknownField(name.to_string()))?;
            if spec.kind.tag() != expected {
                return Err(SchemaDefinitionError::KindMismatch {
                    field: name.to_string(),
                    expected,
                    actual: spec.kind.tag(),
                });
            }
        }

        // Every declared field must be one the validator knows how to read.
        for spec in &self.fields {
            if !LAYOUT.iter().any(|(name, _)| *name == spec.name) {
                return Err(SchemaDefinitionError::UnknownField(spec.name.to_string()));
            }
        }

        Ok(())
    }
}

impl Default for CalibrationSchema {
    fn default() -> Self {
        Self::standard()
    }
}
