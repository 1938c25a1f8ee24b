//! Calibration record validator
//!
//! Validation semantics:
//! - Record is a JSON object
//! - All required fields are present, none is null
//! - No undeclared fields exist, at any nesting level
//! - Every value has the declared kind and lies in the declared range
//! - Track sequences are complete or absent
//! - The slot depth table matches the declared layout exactly
//!
//! Validation never stops at the first problem: every field error in the
//! record is collected. Unit conversion (mm to m, degrees to radians) happens
//! here and nowhere else.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use super::errors::{FieldError, SchemaDefinitionError, ValidationErrors};
use super::schema::{fields, CalibrationSchema, FieldKind, FieldSpec, Range};
use super::slots::{parse_positive_id, SlotLayout};
use super::types::{
    GripperType, Identity, JointPose, Joint, MachineCalibration, MotionTuning, NamedPoses,
    PickProfile, PickupGeometry, SlotDepthOffsets, TrackSequence, TrackStage,
};
use super::units::Unit;

/// Outcome of validating one record
pub type ValidationResult = Result<MachineCalibration, ValidationErrors>;

/// Validates `record` against the standard schema.
pub fn validate(record: &Value) -> ValidationResult {
    CalibrationValidator::standard().validate(record)
}

/// Validator bound to one schema.
///
/// Validation is pure and deterministic; the validator can be shared across
/// threads.
#[derive(Debug)]
pub struct CalibrationValidator {
    schema: CalibrationSchema,
    id_pattern: Regex,
}

impl CalibrationValidator {
    /// Creates a validator, rejecting a malformed schema.
    pub fn new(schema: CalibrationSchema) -> Result<Self, SchemaDefinitionError> {
        schema.check()?;

        let pattern = match schema.field(fields::MACHINE_ID).map(|spec| &spec.kind) {
            Some(FieldKind::Identifier { pattern }) => *pattern,
            _ => return Err(SchemaDefinitionError::UnknownField(fields::MACHINE_ID.into())),
        };
        let id_pattern = Regex::new(pattern).map_err(|e| SchemaDefinitionError::InvalidPattern {
            field: fields::MACHINE_ID.into(),
            message: e.to_string(),
        })?;

        Ok(Self { schema, id_pattern })
    }

    /// Shared validator for the standard schema.
    pub fn standard() -> &'static CalibrationValidator {
        static STANDARD: OnceLock<CalibrationValidator> = OnceLock::new();
        STANDARD.get_or_init(|| {
            // The standard schema is checked by the schema unit tests.
            CalibrationValidator::new(CalibrationSchema::standard())
                .unwrap_or_else(|e| panic!("standard calibration schema is malformed: {}", e))
        })
    }

    pub fn schema(&self) -> &CalibrationSchema {
        &self.schema
    }

    /// Validates one record.
    pub fn validate(&self, record: &Value) -> ValidationResult {
        self.run(record, None)
    }

    /// Validates a record that a provider listed under `machine_id`.
    ///
    /// In addition to the schema, the record's own `machineId` must equal the
    /// id it was listed under.
    pub fn validate_listed(&self, machine_id: &str, record: &Value) -> ValidationResult {
        self.run(record, Some(machine_id))
    }

    fn run(&self, record: &Value, listed_as: Option<&str>) -> ValidationResult {
        let obj = match record.as_object() {
            Some(obj) => obj,
            None => {
                return Err(ValidationErrors::new(vec![FieldError::type_mismatch(
                    "$root",
                    "object",
                    json_type_name(record),
                )]))
            }
        };

        let mut reader = FieldReader::new(&self.schema, obj);
        reader.reject_undeclared();

        let machine_id = reader.identifier(fields::MACHINE_ID, &self.id_pattern);
        if let (Some(id), Some(expected)) = (machine_id.as_deref(), listed_as) {
            if id != expected {
                reader.push(FieldError::new(
                    fields::MACHINE_ID,
                    id,
                    format!("does not match the id '{}' the record is listed under", expected),
                ));
            }
        }

        let parts = Parts {
            machine_id,
            robot_serial: reader.text(fields::ROBOT_SERIAL),
            gripper_serial: reader.text(fields::GRIPPER_SERIAL),
            gripper_type: reader
                .enumeration(fields::GRIPPER_TYPE)
                .and_then(|s| GripperType::parse(&s)),
            halted_at_startup: reader.flag(fields::HALTED_AT_STARTUP),

            acceleration: reader.scalar(fields::ACCELERATION),
            speed: reader.scalar(fields::SPEED),
            blend_time: reader.scalar(fields::BLEND_TIME),
            blend_radius: reader.scalar(fields::BLEND_RADIUS),
            action_delay: reader.scalar(fields::ACTION_DELAY),
            drop_release_delay: reader.scalar(fields::DROP_RELEASE_DELAY),

            delta_x: reader.scalar(fields::DELTA_X),
            delta_y: reader.scalar(fields::DELTA_Y),
            home_x: reader.scalar(fields::HOME_X),
            home_y: reader.scalar(fields::HOME_Y),
            calibration_angle: reader.scalar(fields::CALIBRATION_ANGLE),
            safe_offset: reader.scalar(fields::SAFE_OFFSET),

            hover_height: reader.scalar(fields::HOVER_HEIGHT),
            move_in_distance: reader.scalar(fields::MOVE_IN_DISTANCE),
            move_up_distance: reader.scalar(fields::MOVE_UP_DISTANCE),
            move_out_distance: reader.scalar(fields::MOVE_OUT_DISTANCE),
            pick_angle: reader.scalar(fields::PICK_ANGLE),
            pick_height_offset: reader.scalar(fields::PICK_HEIGHT_OFFSET),

            neutral: reader.pose(fields::NEUTRAL),
            left: reader.pose(fields::LEFT),
            right: reader.pose(fields::RIGHT),
            present_car: reader.pose(fields::PRESENT_CAR),
            tracks: reader.tracks(fields::TRACKS),

            slots: reader.slots(),
        };

        let errors = reader.into_errors();
        if !errors.is_empty() {
            return Err(ValidationErrors::new(errors));
        }

        parts.assemble().ok_or_else(|| {
            // Every field that came back empty without an error is a reader bug.
            ValidationErrors::new(vec![FieldError::new(
                "$root",
                "",
                "record could not be assembled",
            )])
        })
    }
}

/// Field values read from one record, before assembly
struct Parts {
    machine_id: Option<String>,
    robot_serial: Option<String>,
    gripper_serial: Option<String>,
    gripper_type: Option<GripperType>,
    halted_at_startup: Option<bool>,

    acceleration: Option<f64>,
    speed: Option<f64>,
    blend_time: Option<f64>,
    blend_radius: Option<f64>,
    action_delay: Option<f64>,
    drop_release_delay: Option<f64>,

    delta_x: Option<f64>,
    delta_y: Option<f64>,
    home_x: Option<f64>,
    home_y: Option<f64>,
    calibration_angle: Option<f64>,
    safe_offset: Option<f64>,

    hover_height: Option<f64>,
    move_in_distance: Option<f64>,
    move_up_distance: Option<f64>,
    move_out_distance: Option<f64>,
    pick_angle: Option<f64>,
    pick_height_offset: Option<f64>,

    neutral: Option<JointPose>,
    left: Option<JointPose>,
    right: Option<JointPose>,
    present_car: Option<JointPose>,
    tracks: Option<BTreeMap<u32, TrackSequence>>,

    slots: Option<SlotDepthOffsets>,
}

impl Parts {
    /// Optional fields pass through; a missing required one yields `None`.
    fn assemble(self) -> Option<MachineCalibration> {
        Some(MachineCalibration {
            identity: Identity {
                machine_id: self.machine_id?,
                robot_serial: self.robot_serial?,
                gripper_serial: self.gripper_serial?,
                gripper_type: self.gripper_type?,
            },
            halted_at_startup: self.halted_at_startup.unwrap_or(false),
            motion: MotionTuning {
                acceleration: self.acceleration?,
                speed: self.speed?,
                blend_time: self.blend_time?,
                blend_radius: self.blend_radius?,
                action_delay: self.action_delay?,
                drop_release_delay: self.drop_release_delay,
            },
            pickup: PickupGeometry {
                delta_x: self.delta_x?,
                delta_y: self.delta_y?,
                home_x: self.home_x?,
                home_y: self.home_y?,
                calibration_angle: self.calibration_angle?,
                safe_offset: self.safe_offset?,
            },
            pick: PickProfile {
                hover_height: self.hover_height?,
                move_in_distance: self.move_in_distance?,
                move_up_distance: self.move_up_distance?,
                move_out_distance: self.move_out_distance?,
                pick_angle: self.pick_angle?,
                pick_height_offset: self.pick_height_offset?,
            },
            poses: NamedPoses {
                neutral: self.neutral?,
                left: self.left?,
                right: self.right?,
                present_car: self.present_car,
            },
            tracks: self.tracks?,
            slots: self.slots?,
        })
    }
}

/// Reads typed values out of one record object, collecting field errors.
///
/// Every accessor returns `None` when the value is absent or invalid. An
/// invalid or missing required value always records an error; an absent
/// optional one does not.
struct FieldReader<'a> {
    schema: &'a CalibrationSchema,
    obj: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl<'a> FieldReader<'a> {
    fn new(schema: &'a CalibrationSchema, obj: &'a Map<String, Value>) -> Self {
        Self {
            schema,
            obj,
            errors: Vec::new(),
        }
    }

    fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }

    fn reject_undeclared(&mut self) {
        for key in self.obj.keys() {
            if !self.schema.is_declared(key) {
                self.errors.push(FieldError::unknown_field(key.as_str()));
            }
        }
    }

    /// Looks up a declared field's value, recording missing and null values.
    fn value(&mut self, name: &str) -> Option<(&'a FieldSpec, &'a Value)> {
        let schema = self.schema;
        let obj = self.obj;
        let spec = schema.field(name)?;
        match obj.get(name) {
            None => {
                if spec.required {
                    self.errors.push(FieldError::missing(name));
                }
                None
            }
            Some(Value::Null) => {
                self.errors.push(FieldError::null_value(name));
                None
            }
            Some(value) => Some((spec, value)),
        }
    }

    fn string(&mut self, path: &str, value: &Value) -> Option<String> {
        match value.as_str() {
            Some(s) if !s.trim().is_empty() => Some(s.to_string()),
            Some(_) => {
                self.errors.push(FieldError::new(path, "\"\"", "must not be empty"));
                None
            }
            None => {
                self.errors
                    .push(FieldError::type_mismatch(path, "string", json_type_name(value)));
                None
            }
        }
    }

    fn text(&mut self, name: &str) -> Option<String> {
        let (_, value) = self.value(name)?;
        self.string(name, value)
    }

    fn identifier(&mut self, name: &str, pattern: &Regex) -> Option<String> {
        let (_, value) = self.value(name)?;
        let id = self.string(name, value)?;
        if !pattern.is_match(&id) {
            self.errors.push(FieldError::new(
                name,
                id,
                format!("must match {}", pattern.as_str()),
            ));
            return None;
        }
        Some(id)
    }

    fn enumeration(&mut self, name: &str) -> Option<String> {
        let (spec, value) = self.value(name)?;
        let s = self.string(name, value)?;
        let allowed: &[&str] = match &spec.kind {
            FieldKind::Enum { allowed } => *allowed,
            _ => &[],
        };
        if !allowed.contains(&s.as_str()) {
            self.errors.push(FieldError::not_in_enum(name, &s, allowed));
            return None;
        }
        Some(s)
    }

    fn flag(&mut self, name: &str) -> Option<bool> {
        let (_, value) = self.value(name)?;
        match value.as_bool() {
            Some(b) => Some(b),
            None => {
                self.errors
                    .push(FieldError::type_mismatch(name, "bool", json_type_name(value)));
                None
            }
        }
    }

    /// Checks a number against `range` (authored units) and converts it.
    fn number(
        &mut self,
        path: &str,
        value: &Value,
        authored: Unit,
        canonical: Unit,
        range: Option<Range>,
    ) -> Option<f64> {
        let n = match value.as_f64() {
            Some(n) => n,
            None => {
                self.errors
                    .push(FieldError::type_mismatch(path, "number", json_type_name(value)));
                return None;
            }
        };
        if !n.is_finite() {
            self.errors.push(FieldError::not_finite(path, n));
            return None;
        }
        if let Some(range) = range {
            if !range.contains(n) {
                self.errors
                    .push(FieldError::out_of_range(path, n, authored, &range));
                return None;
            }
        }
        authored.convert(n, canonical)
    }

    fn scalar(&mut self, name: &str) -> Option<f64> {
        let (spec, value) = self.value(name)?;
        let (authored, canonical) = match spec.kind {
            FieldKind::Scalar { authored, canonical } => (authored, canonical),
            _ => return None,
        };
        self.number(name, value, authored, canonical, spec.range)
    }

    /// Positive integer within the field's range
    fn count(&mut self, name: &str) -> Option<u32> {
        let (spec, value) = self.value(name)?;
        let n = match value.as_u64() {
            Some(n) if n > 0 => n,
            _ => {
                self.errors.push(FieldError::type_mismatch(
                    name,
                    "positive integer",
                    &value.to_string(),
                ));
                return None;
            }
        };
        if let Some(range) = spec.range {
            if !range.contains(n as f64) {
                self.errors.push(FieldError::new(
                    name,
                    n.to_string(),
                    format!("outside [{}, {}]", range.min, range.max),
                ));
                return None;
            }
        }
        u32::try_from(n).ok()
    }

    fn pose(&mut self, name: &str) -> Option<JointPose> {
        let (spec, value) = self.value(name)?;
        self.pose_at(name, value, spec.range)
    }

    /// Reads six named joints in degrees and converts them to radians.
    fn pose_at(&mut self, path: &str, value: &Value, range: Option<Range>) -> Option<JointPose> {
        let obj = match value.as_object() {
            Some(obj) => obj,
            None => {
                self.errors
                    .push(FieldError::type_mismatch(path, "joint pose", json_type_name(value)));
                return None;
            }
        };

        for key in obj.keys() {
            if Joint::from_name(key).is_none() {
                self.errors.push(FieldError::unknown_field(make_path(path, key)));
            }
        }

        let mut angles = [0.0; 6];
        let mut complete = true;
        for (i, joint) in Joint::ALL.iter().enumerate() {
            let joint_path = make_path(path, joint.name());
            match obj.get(joint.name()) {
                None => {
                    self.errors.push(FieldError::missing(joint_path));
                    complete = false;
                }
                Some(Value::Null) => {
                    self.errors.push(FieldError::null_value(joint_path));
                    complete = false;
                }
                Some(v) => match self.number(&joint_path, v, Unit::Degree, Unit::Radian, range) {
                    Some(rad) => angles[i] = rad,
                    None => complete = false,
                },
            }
        }

        complete.then(|| JointPose::from_radians(angles))
    }

    /// Reads the track table. Empty track objects are uncalibrated and
    /// skipped; partial sequences are rejected with one error naming the track.
    fn tracks(&mut self, name: &str) -> Option<BTreeMap<u32, TrackSequence>> {
        let (spec, value) = self.value(name)?;
        let obj = match value.as_object() {
            Some(obj) => obj,
            None => {
                self.errors
                    .push(FieldError::type_mismatch(name, "object", json_type_name(value)));
                return None;
            }
        };

        let joints = match spec.kind {
            FieldKind::TrackTable { joints } => joints,
            _ => Range::symmetric(super::schema::JOINT_LIMIT_DEG),
        };
        let mut tracks = BTreeMap::new();
        let mut seen = BTreeSet::new();
        let mut ok = true;

        for (key, entry) in obj {
            let Some(id) = self.table_key(name, key, spec.range, &mut seen) else {
                ok = false;
                continue;
            };
            let track_path = make_path(name, &id.to_string());

            let stages = match entry.as_object() {
                Some(stages) => stages,
                None => {
                    self.errors.push(FieldError::type_mismatch(
                        track_path,
                        "object",
                        json_type_name(entry),
                    ));
                    ok = false;
                    continue;
                }
            };
            if stages.is_empty() {
                continue;
            }

            for stage_key in stages.keys() {
                if TrackStage::from_name(stage_key).is_none() {
                    self.errors
                        .push(FieldError::unknown_field(make_path(&track_path, stage_key)));
                    ok = false;
                }
            }

            let present: Vec<&str> = TrackStage::ALL
                .iter()
                .map(|stage| stage.name())
                .filter(|stage| stages.contains_key(*stage))
                .collect();
            let missing: Vec<&str> = TrackStage::ALL
                .iter()
                .map(|stage| stage.name())
                .filter(|stage| !stages.contains_key(*stage))
                .collect();
            if !missing.is_empty() {
                if !present.is_empty() {
                    self.errors
                        .push(FieldError::incomplete_track(track_path, &present, &missing));
                }
                ok = false;
                continue;
            }

            let mut poses = Vec::with_capacity(4);
            for stage in TrackStage::ALL {
                let stage_path = make_path(&track_path, stage.name());
                let stage_value = &stages[stage.name()];
                if stage_value.is_null() {
                    self.errors.push(FieldError::null_value(stage_path));
                    continue;
                }
                if let Some(pose) = self.pose_at(&stage_path, stage_value, Some(joints)) {
                    poses.push(pose);
                }
            }
            match poses.as_slice() {
                [to, over, rotate, release] => {
                    tracks.insert(
                        id,
                        TrackSequence {
                            to: *to,
                            over: *over,
                            rotate: *rotate,
                            release: *release,
                        },
                    );
                }
                _ => ok = false,
            }
        }

        ok.then_some(tracks)
    }

    /// Parses one integer table key, recording malformed, out of range and
    /// duplicate keys.
    fn table_key(
        &mut self,
        table: &str,
        key: &str,
        range: Option<Range>,
        seen: &mut BTreeSet<u32>,
    ) -> Option<u32> {
        let Some(id) = parse_positive_id(key) else {
            self.errors.push(FieldError::new(
                make_path(table, key),
                key,
                "key must be a positive integer",
            ));
            return None;
        };
        if let Some(range) = range {
            if !range.contains(f64::from(id)) {
                self.errors.push(FieldError::new(
                    make_path(table, key),
                    key,
                    format!("outside [{}, {}]", range.min, range.max),
                ));
                return None;
            }
        }
        if !seen.insert(id) {
            self.errors.push(FieldError::duplicate_key(table, key, id));
            return None;
        }
        Some(id)
    }

    /// Reads `retiredSlots`; absent means none retired.
    fn retired_slots(&mut self, name: &str) -> Option<BTreeSet<u32>> {
        if !self.obj.contains_key(name) {
            return Some(BTreeSet::new());
        }
        let (_, value) = self.value(name)?;
        let items = match value.as_array() {
            Some(items) => items,
            None => {
                self.errors
                    .push(FieldError::type_mismatch(name, "array", json_type_name(value)));
                return None;
            }
        };

        let mut retired = BTreeSet::new();
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            let item_path = format!("{}[{}]", name, i);
            match item.as_u64().filter(|n| *n > 0).and_then(|n| u32::try_from(n).ok()) {
                Some(id) => {
                    if !retired.insert(id) {
                        self.errors.push(FieldError::new(
                            item_path,
                            id.to_string(),
                            "slot is retired more than once",
                        ));
                        ok = false;
                    }
                }
                None => {
                    self.errors.push(FieldError::type_mismatch(
                        item_path,
                        "positive integer",
                        &item.to_string(),
                    ));
                    ok = false;
                }
            }
        }
        ok.then_some(retired)
    }

    /// Reads the slot count, retired ids and depth table, then checks the
    /// table's key set against the declared layout.
    fn slots(&mut self) -> Option<SlotDepthOffsets> {
        let slot_count = self.count(fields::SLOT_COUNT);
        let retired = self.retired_slots(fields::RETIRED_SLOTS);

        let name = fields::SLOT_DEPTH_OFFSETS;
        let (spec, value) = self.value(name)?;
        let (authored, canonical) = match spec.kind {
            FieldKind::SlotTable { authored, canonical } => (authored, canonical),
            _ => return None,
        };
        let obj = match value.as_object() {
            Some(obj) => obj,
            None => {
                self.errors
                    .push(FieldError::type_mismatch(name, "object", json_type_name(value)));
                return None;
            }
        };

        let mut offsets = BTreeMap::new();
        let mut keys = BTreeSet::new();
        let mut ok = true;
        for (key, entry) in obj {
            let Some(id) = self.table_key(name, key, None, &mut keys) else {
                ok = false;
                continue;
            };
            let entry_path = make_path(name, &id.to_string());
            if entry.is_null() {
                self.errors.push(FieldError::null_value(entry_path));
                ok = false;
                continue;
            }
            match self.number(&entry_path, entry, authored, canonical, spec.range) {
                Some(offset) => {
                    offsets.insert(id, offset);
                }
                None => ok = false,
            }
        }

        let layout = SlotLayout::new(slot_count?, retired?);
        let retired_errors = layout.check_retired(fields::RETIRED_SLOTS);
        let completeness_errors = layout.check_completeness(name, &keys);
        if !retired_errors.is_empty() || !completeness_errors.is_empty() {
            self.errors.extend(retired_errors);
            self.errors.extend(completeness_errors);
            return None;
        }

        ok.then(|| SlotDepthOffsets {
            slot_count: layout.slot_count(),
            retired: layout.retired().clone(),
            offsets,
        })
    }
}

/// Joint range for nested poses, taken from the `neutral` declaration.
/// Returns the JSON type name for error messages.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "int"
            } else {
                "float"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Creates a field path from prefix and field name.
fn make_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::fixtures::{pose, record, slot_table, track, with};
    use serde_json::json;
    use std::f64::consts::{FRAC_PI_2, PI};

    const TOLERANCE: f64 = 1e-9;

    fn errors_of(record: &Value) -> Vec<FieldError> {
        validate(record).unwrap_err().into_vec()
    }

    #[test]
    fn test_valid_record_passes() {
        let cal = validate(&record("TAIF")).unwrap();
        assert_eq!(cal.machine_id(), "TAIF");
        assert_eq!(cal.identity().gripper_type, GripperType::Io);
        assert_eq!(cal.tracks().len(), 2);
        assert_eq!(cal.slots().len(), 8);
        assert!(!cal.halted_at_startup());
        assert_eq!(cal.motion().drop_release_delay, None);
        assert_eq!(cal.poses().present_car, None);
    }

    #[test]
    fn test_lengths_stored_in_meters() {
        let cal = validate(&record("TAIF")).unwrap();
        assert_eq!(cal.pickup().home_x, -0.705);
        assert_eq!(cal.pickup().home_y, 0.725);
        assert_eq!(cal.pickup().delta_x, 0.1);
        assert_eq!(cal.pickup().delta_y, 0.055);
        // Authored in meters already
        assert_eq!(cal.pick().hover_height, 0.215);
        assert_eq!(cal.pick().move_out_distance, -0.2);
    }

    #[test]
    fn test_angles_stored_in_radians() {
        let cal = validate(&record("TAIF")).unwrap();
        let neutral = cal.poses().neutral;
        assert!((neutral.base - FRAC_PI_2).abs() < TOLERANCE);
        assert!((neutral.shoulder + FRAC_PI_2).abs() < TOLERANCE);
        assert!((cal.poses().left.base - PI).abs() < TOLERANCE);
        assert!((cal.pick().pick_angle - 16f64.to_radians()).abs() < TOLERANCE);
    }

    #[test]
    fn test_slot_offsets_stored_in_meters() {
        let rec = with(record("JAZAN"), |obj| {
            obj.insert("slotDepthOffsets".into(), slot_table(8, -15.0));
        });
        let cal = validate(&rec).unwrap();
        assert_eq!(cal.slots().get(1), Some(-0.015));
        assert_eq!(cal.slots().get(8), Some(-0.015));
        assert_eq!(cal.slots().get(9), None);
    }

    #[test]
    fn test_optional_fields_accepted() {
        let rec = with(record("USA"), |obj| {
            obj.insert("dropReleaseDelaySeconds".into(), json!(1));
            obj.insert("haltedAtStartup".into(), json!(true));
            obj.insert("presentCar".into(), pose(90.0, -90.0, -120.0, 120.0, -90.0, 90.0));
        });
        let cal = validate(&rec).unwrap();
        assert_eq!(cal.motion().drop_release_delay, Some(1.0));
        assert!(cal.halted_at_startup());
        assert!(cal.poses().present_car.is_some());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let rec = with(record("TAIF"), |obj| {
            obj.insert("sped".into(), json!(0.4));
        });
        let errors = errors_of(&rec);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "sped");
    }

    #[test]
    fn test_unknown_joint_rejected() {
        let rec = with(record("TAIF"), |obj| {
            obj["neutral"]["wrist4"] = json!(0);
        });
        let errors = errors_of(&rec);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "neutral.wrist4");
    }

    #[test]
    fn test_every_bad_field_reported() {
        let rec = with(record("TAIF"), |obj| {
            obj.remove("homeX");
            obj.insert("speed".into(), json!(-1));
            obj.insert("gripperType".into(), json!("Pneumatic"));
            obj["left"]["elbow"] = json!("ninety");
            obj.insert("safeOffset".into(), Value::Null);
        });
        let errors = errors_of(&rec);
        let fields: BTreeSet<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(errors.len(), 5);
        assert_eq!(
            fields,
            BTreeSet::from(["homeX", "speed", "gripperType", "left.elbow", "safeOffset"])
        );
    }

    #[test]
    fn test_joint_beyond_one_turn_rejected() {
        let rec = with(record("TAIF"), |obj| {
            obj["neutral"]["wrist2"] = json!(450);
        });
        let errors = errors_of(&rec);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "neutral.wrist2 = 450°: exceeds ±360°");
    }

    #[test]
    fn test_joint_at_limit_accepted() {
        let rec = with(record("TAIF"), |obj| {
            obj["neutral"]["wrist3"] = json!(-360);
        });
        let cal = validate(&rec).unwrap();
        assert!((cal.poses().neutral.wrist3 + 2.0 * PI).abs() < TOLERANCE);
    }

    #[test]
    fn test_track_joint_range_checked() {
        let rec = with(record("TAIF"), |obj| {
            obj["tracks"]["2"]["release"]["base"] = json!(721);
        });
        let errors = errors_of(&rec);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "tracks.2.release.base");
    }

    #[test]
    fn test_partial_track_cites_that_track() {
        for stage in TrackStage::ALL {
            let rec = with(record("TAIF"), |obj| {
                if let Some(track) = obj["tracks"]["2"].as_object_mut() {
                    track.remove(stage.name());
                }
            });
            let errors = errors_of(&rec);
            assert_eq!(errors.len(), 1, "without {}: {:?}", stage.name(), errors);
            assert_eq!(errors[0].field, "tracks.2");
            assert!(errors[0].constraint.contains(stage.name()));
        }
    }

    #[test]
    fn test_empty_track_is_absent() {
        let rec = with(record("TAIF"), |obj| {
            obj["tracks"]["3"] = json!({});
        });
        let cal = validate(&rec).unwrap();
        assert_eq!(cal.tracks().len(), 2);
        assert!(cal.track(3).is_none());
    }

    #[test]
    fn test_no_tracks_is_valid() {
        let rec = with(record("TAIF"), |obj| {
            obj.insert("tracks".into(), json!({}));
        });
        assert!(validate(&rec).unwrap().tracks().is_empty());
    }

    #[test]
    fn test_track_key_must_be_positive_integer() {
        let rec = with(record("TAIF"), |obj| {
            obj["tracks"]["drop3"] = track(136.18);
        });
        let errors = errors_of(&rec);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "tracks.drop3");
    }

    #[test]
    fn test_unknown_track_stage_rejected() {
        let rec = with(record("TAIF"), |obj| {
            obj["tracks"]["1"]["hover"] = pose(0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        });
        let errors = errors_of(&rec);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "tracks.1.hover");
    }

    #[test]
    fn test_missing_slot_cited() {
        let rec = with(record("TAIF"), |obj| {
            if let Some(table) = obj["slotDepthOffsets"].as_object_mut() {
                table.remove("5");
            }
        });
        let errors = errors_of(&rec);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "slotDepthOffsets.5");
        assert!(errors[0].to_string().contains("missing key 5"));
    }

    #[test]
    fn test_extra_slot_cited() {
        let rec = with(record("TAIF"), |obj| {
            obj["slotDepthOffsets"]["9"] = json!(0);
        });
        let errors = errors_of(&rec);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "slotDepthOffsets.9");
    }

    #[test]
    fn test_normalized_duplicate_slot_rejected() {
        let rec = with(record("TAIF"), |obj| {
            obj["slotDepthOffsets"]["07"] = json!(-3);
        });
        let errors = errors_of(&rec);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "slotDepthOffsets.7");
        assert!(errors[0].constraint.contains("duplicate"));
    }

    #[test]
    fn test_non_integer_slot_key_rejected() {
        let rec = with(record("TAIF"), |obj| {
            obj["slotDepthOffsets"]["A1"] = json!(0);
        });
        let errors = errors_of(&rec);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "slotDepthOffsets.A1");
    }

    #[test]
    fn test_retired_slots() {
        let rec = with(record("TAIF"), |obj| {
            obj.insert("retiredSlots".into(), json!([4]));
            if let Some(table) = obj["slotDepthOffsets"].as_object_mut() {
                table.remove("4");
            }
        });
        let cal = validate(&rec).unwrap();
        assert_eq!(cal.slots().len(), 7);
        assert!(cal.slots().retired().contains(&4));
        assert_eq!(cal.slots().slot_count(), 8);
    }

    #[test]
    fn test_retired_slot_outside_count() {
        let rec = with(record("TAIF"), |obj| {
            obj.insert("retiredSlots".into(), json!([12]));
        });
        let errors = errors_of(&rec);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "retiredSlots");
    }

    #[test]
    fn test_slot_offset_out_of_range() {
        let rec = with(record("TAIF"), |obj| {
            obj["slotDepthOffsets"]["3"] = json!(-250);
        });
        let errors = errors_of(&rec);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "slotDepthOffsets.3");
        assert_eq!(errors[0].value, "-250 mm");
    }

    #[test]
    fn test_slot_count_must_be_positive_integer() {
        let rec = with(record("TAIF"), |obj| {
            obj.insert("slotCount".into(), json!(8.5));
        });
        let errors = errors_of(&rec);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "slotCount");
    }

    #[test]
    fn test_machine_id_pattern() {
        let rec = with(record("TAIF"), |obj| {
            obj.insert("machineId".into(), json!("taif cell"));
        });
        let errors = errors_of(&rec);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "machineId");
    }

    #[test]
    fn test_empty_serial_rejected() {
        let rec = with(record("TAIF"), |obj| {
            obj.insert("robotSerial".into(), json!("  "));
        });
        assert_eq!(errors_of(&rec)[0].field, "robotSerial");
    }

    #[test]
    fn test_root_must_be_object() {
        let errors = errors_of(&json!([1, 2, 3]));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "$root");
    }

    #[test]
    fn test_listed_id_must_match() {
        let validator = CalibrationValidator::standard();
        assert!(validator.validate_listed("TAIF", &record("TAIF")).is_ok());

        let errors = validator
            .validate_listed("JAZAN", &record("TAIF"))
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.errors()[0].field, "machineId");
    }

    #[test]
    fn test_custom_schema_range() {
        let schema = CalibrationSchema::standard()
            .with_range(fields::HOME_X, Range::symmetric(500.0))
            .unwrap();
        let validator = CalibrationValidator::new(schema).unwrap();
        let errors = validator.validate(&record("TAIF")).unwrap_err();
        assert_eq!(errors.errors()[0].field, "homeX");
        assert_eq!(errors.errors()[0].to_string(), "homeX = -705 mm: exceeds ±500 mm");
    }

    #[test]
    fn test_track_joint_range_independent_of_poses() {
        // Track shoulders sit near -156 degrees, beyond a 130 degree pose limit
        let schema = CalibrationSchema::standard()
            .with_range(fields::NEUTRAL, Range::symmetric(130.0))
            .unwrap();
        let validator = CalibrationValidator::new(schema).unwrap();
        assert!(validator.validate(&record("TAIF")).is_ok());

        let schema = CalibrationSchema::standard()
            .with_track_joint_range(Range::symmetric(150.0))
            .unwrap();
        let validator = CalibrationValidator::new(schema).unwrap();
        let errors = validator.validate(&record("TAIF")).unwrap_err().into_vec();
        assert_eq!(errors.len(), 8);
        assert!(errors
            .iter()
            .all(|e| e.field.starts_with("tracks.") && e.field.ends_with(".shoulder")));
    }

    #[test]
    fn test_invalid_track_joint_range_rejected() {
        let schema = CalibrationSchema::standard()
            .with_track_joint_range(Range::new(10.0, -10.0))
            .unwrap();
        assert!(matches!(
            CalibrationValidator::new(schema),
            Err(SchemaDefinitionError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_validation_is_deterministic() {
        let rec = record("TAIF");
        let first = validate(&rec).unwrap();
        for _ in 0..10 {
            assert_eq!(validate(&rec).unwrap(), first);
        }
    }
}
