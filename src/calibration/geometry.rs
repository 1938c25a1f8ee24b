//! Derived pick geometry
//!
//! The cassette wall is a grid of slots in front of the robot. A slot's
//! gripper target is computed from the pickup geometry (home corner, row and
//! column pitch, wall rotation), the pick profile and the slot's depth
//! offset. Everything here works in meters and radians.

use serde::Serialize;
use thiserror::Error;

use super::types::{JointPose, MachineCalibration};

/// Fixed clearance above the hover depth when approaching a slot, meters
pub const APPROACH_CLEARANCE_M: f64 = 0.020;

/// Depth gain applied to slots above the base plane (y > 0). The upper rows
/// sag towards the robot by 30 mm over 700 mm.
pub const UPPER_ROW_DEPTH_RAMP: f64 = 30.0 / 700.0;

/// Grid position of a slot, zero based from the home corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SlotPosition {
    pub row: u32,
    pub column: u32,
}

impl SlotPosition {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

/// Gripper target for one slot in the robot base frame, meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PickTarget {
    pub slot: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("slot {slot} has no depth offset on machine {machine_id}")]
    UnknownSlot { machine_id: String, slot: u32 },
}

pub type GeometryResult<T> = Result<T, GeometryError>;

impl MachineCalibration {
    /// Computes the gripper target for `slot` located at `position`.
    ///
    /// The wall is rotated by the calibration angle around the base. Rows
    /// grow downwards (towards -y) and columns grow towards +x.
    pub fn pick_target(&self, slot: u32, position: SlotPosition) -> GeometryResult<PickTarget> {
        let table_offset = self.slots.get(slot).ok_or_else(|| GeometryError::UnknownSlot {
            machine_id: self.machine_id().to_string(),
            slot,
        })?;

        let pickup = &self.pickup;
        let (sin, cos) = pickup.calibration_angle.sin_cos();
        let wall_x = pickup.home_x + pickup.delta_x * f64::from(position.column);
        let wall_y = pickup.home_y - pickup.delta_y * f64::from(position.row);

        let x = wall_x * cos - wall_y * sin;
        let y = wall_x * sin + wall_y * cos;

        let depth_offset = if y > 0.0 {
            y * UPPER_ROW_DEPTH_RAMP
        } else {
            table_offset
        };
        let z = self.pick.hover_height - depth_offset + pickup.safe_offset + APPROACH_CLEARANCE_M;

        Ok(PickTarget { slot, x, y, z })
    }

    /// Neutral pose with the base turned by the wall's calibration angle.
    pub fn calibrated_neutral(&self) -> JointPose {
        self.poses
            .neutral
            .with_base_offset(self.pickup.calibration_angle)
    }
}
