//! Authored form of a calibration
//!
//! Renders a `MachineCalibration` back into the record shape operators
//! author: lengths in the units the schema declares (mm for the pickup grid
//! and slot offsets, meters elsewhere), angles in degrees. Feeding the output
//! back through the validator yields the same calibration.

use serde_json::{json, Map, Value};

use super::schema::{fields, CalibrationSchema, FieldKind};
use super::types::{JointPose, MachineCalibration, TrackSequence};
use super::units::{rad_to_deg, Unit};

/// Converts a validated calibration to its authored JSON record.
pub fn to_authored(calibration: &MachineCalibration) -> Value {
    let schema = CalibrationSchema::standard();
    let scalar = |name: &str, canonical: f64| -> Value {
        json!(authored_value(&schema, name, canonical))
    };

    let identity = &calibration.identity;
    let motion = &calibration.motion;
    let pickup = &calibration.pickup;
    let pick = &calibration.pick;
    let poses = &calibration.poses;

    let mut record = Map::new();
    record.insert(fields::MACHINE_ID.into(), json!(identity.machine_id));
    record.insert(fields::ROBOT_SERIAL.into(), json!(identity.robot_serial));
    record.insert(fields::GRIPPER_SERIAL.into(), json!(identity.gripper_serial));
    record.insert(fields::GRIPPER_TYPE.into(), json!(identity.gripper_type.as_str()));
    if calibration.halted_at_startup {
        record.insert(fields::HALTED_AT_STARTUP.into(), json!(true));
    }

    record.insert(fields::ACCELERATION.into(), scalar(fields::ACCELERATION, motion.acceleration));
    record.insert(fields::SPEED.into(), scalar(fields::SPEED, motion.speed));
    record.insert(fields::BLEND_TIME.into(), scalar(fields::BLEND_TIME, motion.blend_time));
    record.insert(fields::BLEND_RADIUS.into(), scalar(fields::BLEND_RADIUS, motion.blend_radius));
    record.insert(fields::ACTION_DELAY.into(), scalar(fields::ACTION_DELAY, motion.action_delay));
    if let Some(delay) = motion.drop_release_delay {
        record.insert(fields::DROP_RELEASE_DELAY.into(), scalar(fields::DROP_RELEASE_DELAY, delay));
    }

    record.insert(fields::DELTA_X.into(), scalar(fields::DELTA_X, pickup.delta_x));
    record.insert(fields::DELTA_Y.into(), scalar(fields::DELTA_Y, pickup.delta_y));
    record.insert(fields::HOME_X.into(), scalar(fields::HOME_X, pickup.home_x));
    record.insert(fields::HOME_Y.into(), scalar(fields::HOME_Y, pickup.home_y));
    record.insert(
        fields::CALIBRATION_ANGLE.into(),
        scalar(fields::CALIBRATION_ANGLE, pickup.calibration_angle),
    );
    record.insert(fields::SAFE_OFFSET.into(), scalar(fields::SAFE_OFFSET, pickup.safe_offset));

    record.insert(fields::HOVER_HEIGHT.into(), scalar(fields::HOVER_HEIGHT, pick.hover_height));
    record.insert(
        fields::MOVE_IN_DISTANCE.into(),
        scalar(fields::MOVE_IN_DISTANCE, pick.move_in_distance),
    );
    record.insert(
        fields::MOVE_UP_DISTANCE.into(),
        scalar(fields::MOVE_UP_DISTANCE, pick.move_up_distance),
    );
    record.insert(
        fields::MOVE_OUT_DISTANCE.into(),
        scalar(fields::MOVE_OUT_DISTANCE, pick.move_out_distance),
    );
    record.insert(fields::PICK_ANGLE.into(), scalar(fields::PICK_ANGLE, pick.pick_angle));
    record.insert(
        fields::PICK_HEIGHT_OFFSET.into(),
        scalar(fields::PICK_HEIGHT_OFFSET, pick.pick_height_offset),
    );

    record.insert(fields::NEUTRAL.into(), pose_value(&poses.neutral));
    record.insert(fields::LEFT.into(), pose_value(&poses.left));
    record.insert(fields::RIGHT.into(), pose_value(&poses.right));
    if let Some(present_car) = &poses.present_car {
        record.insert(fields::PRESENT_CAR.into(), pose_value(present_car));
    }

    let tracks: Map<String, Value> = calibration
        .tracks
        .iter()
        .map(|(id, sequence)| (id.to_string(), track_value(sequence)))
        .collect();
    record.insert(fields::TRACKS.into(), Value::Object(tracks));

    let slots = &calibration.slots;
    record.insert(fields::SLOT_COUNT.into(), json!(slots.slot_count()));
    if !slots.retired().is_empty() {
        record.insert(fields::RETIRED_SLOTS.into(), json!(slots.retired()));
    }
    let offset_unit = match schema.field(fields::SLOT_DEPTH_OFFSETS).map(|spec| &spec.kind) {
        Some(FieldKind::SlotTable { authored, .. }) => *authored,
        _ => Unit::Millimeter,
    };
    let offsets: Map<String, Value> = slots
        .iter()
        .map(|(slot, offset)| {
            let authored = Unit::Meter.convert(offset, offset_unit).unwrap_or(offset);
            (slot.to_string(), json!(authored))
        })
        .collect();
    record.insert(fields::SLOT_DEPTH_OFFSETS.into(), Value::Object(offsets));

    Value::Object(record)
}

/// Converts a canonical value into the unit `name` is authored in.
fn authored_value(schema: &CalibrationSchema, name: &str, canonical: f64) -> f64 {
    match schema.field(name).map(|spec| &spec.kind) {
        Some(FieldKind::Scalar {
            authored,
            canonical: unit,
        }) => unit.convert(canonical, *authored).unwrap_or(canonical),
        _ => canonical,
    }
}

fn pose_value(pose: &JointPose) -> Value {
    let [base, shoulder, elbow, wrist1, wrist2, wrist3] = pose.as_array().map(rad_to_deg);
    json!({
        "base": base,
        "shoulder": shoulder,
        "elbow": elbow,
        "wrist1": wrist1,
        "wrist2": wrist2,
        "wrist3": wrist3
    })
}

fn track_value(sequence: &TrackSequence) -> Value {
    let stages: Map<String, Value> = sequence
        .stages()
        .map(|(stage, pose)| (stage.name().to_string(), pose_value(pose)))
        .collect();
    Value::Object(stages)
}
