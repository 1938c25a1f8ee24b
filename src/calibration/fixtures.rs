//! Test records shared by the calibration unit tests.

use serde_json::{json, Map, Value};

pub fn pose(base: f64, shoulder: f64, elbow: f64, wrist1: f64, wrist2: f64, wrist3: f64) -> Value {
    json!({
        "base": base,
        "shoulder": shoulder,
        "elbow": elbow,
        "wrist1": wrist1,
        "wrist2": wrist2,
        "wrist3": wrist3
    })
}

pub fn track(base: f64) -> Value {
    json!({
        "to": pose(base, -156.73, -15.94, -93.18, 86.95, -46.9),
        "over": pose(base + 0.5, -156.62, -21.54, -90.21, 90.34, -49.47),
        "rotate": pose(base + 1.1, -156.32, -21.48, -92.24, 91.26, -78.56),
        "release": pose(base + 1.6, -150.28, -33.63, -83.93, 89.73, -80.51)
    })
}

pub fn slot_table(count: u32, offset_mm: f64) -> Value {
    let table: Map<String, Value> = (1..=count)
        .map(|slot| (slot.to_string(), json!(offset_mm)))
        .collect();
    Value::Object(table)
}

/// A complete, valid record modelled on the TAIF cell, with eight slots.
pub fn record(machine_id: &str) -> Value {
    json!({
        "machineId": machine_id,
        "robotSerial": "20235500123",
        "gripperSerial": "GR-4471",
        "gripperType": "IO",
        "acceleration": 1.02,
        "speed": 0.4,
        "blendTime": 0,
        "blendRadius": 0,
        "actionDelaySeconds": 1,
        "deltaX": 100,
        "deltaY": 55,
        "homeX": -705,
        "homeY": 725,
        "calibrationAngleDeg": 0.0,
        "safeOffset": 0.0,
        "hoverHeight": 0.215,
        "moveInDistance": 0.06,
        "moveUpDistance": 0.015,
        "moveOutDistance": -0.2,
        "pickAngleDeg": 16,
        "pickHeightOffset": -0.035,
        "neutral": pose(90.0, -90.0, -120.0, 120.0, -90.0, 90.0),
        "left": pose(180.0, -90.0, -90.0, 90.0, -90.0, 180.0),
        "right": pose(60.0, -90.0, -90.0, 90.0, -90.0, 60.0),
        "tracks": {
            "1": track(140.3),
            "2": track(135.85)
        },
        "slotCount": 8,
        "slotDepthOffsets": slot_table(8, 0.0)
    })
}

/// Applies `edit` to the record object.
pub fn with(mut record: Value, edit: impl FnOnce(&mut Map<String, Value>)) -> Value {
    if let Some(obj) = record.as_object_mut() {
        edit(obj);
    }
    record
}
