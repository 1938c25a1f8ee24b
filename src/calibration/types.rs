//! Typed machine calibration
//!
//! A `MachineCalibration` only comes out of the validator. All distances are
//! meters, all angles radians. The value is immutable: consumers receive
//! shared references (or an `Arc` through `CalibrationSet`) and never patch
//! fields at runtime.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::units::rad_to_deg;

/// Gripper hardware generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GripperType {
    /// Digital I/O driven gripper (older cells)
    #[serde(rename = "IO")]
    Io,
    /// Modbus driven gripper
    #[serde(rename = "ModBus")]
    ModBus,
}

impl GripperType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GripperType::Io => "IO",
            GripperType::ModBus => "ModBus",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IO" => Some(GripperType::Io),
            "ModBus" => Some(GripperType::ModBus),
            _ => None,
        }
    }
}

/// The six joints of the arm, base first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Joint {
    Base,
    Shoulder,
    Elbow,
    Wrist1,
    Wrist2,
    Wrist3,
}

impl Joint {
    pub const ALL: [Joint; 6] = [
        Joint::Base,
        Joint::Shoulder,
        Joint::Elbow,
        Joint::Wrist1,
        Joint::Wrist2,
        Joint::Wrist3,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Joint::Base => "base",
            Joint::Shoulder => "shoulder",
            Joint::Elbow => "elbow",
            Joint::Wrist1 => "wrist1",
            Joint::Wrist2 => "wrist2",
            Joint::Wrist3 => "wrist3",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Joint::ALL.into_iter().find(|joint| joint.name() == name)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// One arm configuration. Angles in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JointPose {
    pub base: f64,
    pub shoulder: f64,
    pub elbow: f64,
    pub wrist1: f64,
    pub wrist2: f64,
    pub wrist3: f64,
}

impl JointPose {
    /// Builds a pose from radians in base..wrist3 order.
    pub fn from_radians(angles: [f64; 6]) -> Self {
        let [base, shoulder, elbow, wrist1, wrist2, wrist3] = angles;
        Self {
            base,
            shoulder,
            elbow,
            wrist1,
            wrist2,
            wrist3,
        }
    }

    pub fn get(&self, joint: Joint) -> f64 {
        self.as_array()[joint.index()]
    }

    /// Radians in base..wrist3 order, the order the controller expects.
    pub fn as_array(&self) -> [f64; 6] {
        [
            self.base,
            self.shoulder,
            self.elbow,
            self.wrist1,
            self.wrist2,
            self.wrist3,
        ]
    }

    pub fn to_degrees(&self) -> [f64; 6] {
        self.as_array().map(rad_to_deg)
    }

    /// Same pose with the base joint rotated by `offset` radians.
    pub fn with_base_offset(&self, offset: f64) -> Self {
        Self {
            base: self.base + offset,
            ..*self
        }
    }
}

/// Stages of the handoff choreography onto a track, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStage {
    To,
    Over,
    Rotate,
    Release,
}

impl TrackStage {
    pub const ALL: [TrackStage; 4] = [
        TrackStage::To,
        TrackStage::Over,
        TrackStage::Rotate,
        TrackStage::Release,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TrackStage::To => "to",
            TrackStage::Over => "over",
            TrackStage::Rotate => "rotate",
            TrackStage::Release => "release",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        TrackStage::ALL.into_iter().find(|stage| stage.name() == name)
    }
}

/// Complete four-stage pose sequence for depositing a cassette on a track
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackSequence {
    pub to: JointPose,
    pub over: JointPose,
    pub rotate: JointPose,
    pub release: JointPose,
}

impl TrackSequence {
    pub fn stage(&self, stage: TrackStage) -> &JointPose {
        match stage {
            TrackStage::To => &self.to,
            TrackStage::Over => &self.over,
            TrackStage::Rotate => &self.rotate,
            TrackStage::Release => &self.release,
        }
    }

    /// Stages in execution order
    pub fn stages(&self) -> impl Iterator<Item = (TrackStage, &JointPose)> {
        TrackStage::ALL.into_iter().map(move |stage| (stage, self.stage(stage)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub machine_id: String,
    pub robot_serial: String,
    pub gripper_serial: String,
    pub gripper_type: GripperType,
}

/// Controller motion parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MotionTuning {
    /// m/s²
    pub acceleration: f64,
    /// m/s
    pub speed: f64,
    /// s
    pub blend_time: f64,
    /// m
    pub blend_radius: f64,
    /// Pause between robot actions, s
    pub action_delay: f64,
    /// Wait at the drop position after the gripper opens, s
    pub drop_release_delay: Option<f64>,
}

/// Layout of the cassette wall relative to the robot base. Meters and radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PickupGeometry {
    /// Column pitch
    pub delta_x: f64,
    /// Row pitch
    pub delta_y: f64,
    /// Position of the top-left slot
    pub home_x: f64,
    pub home_y: f64,
    /// Front view rotation of the wall
    pub calibration_angle: f64,
    /// Safety margin added to the hover depth
    pub safe_offset: f64,
}

/// Gripper motion around a single pick. Meters and radians; the sign of each
/// distance encodes its direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PickProfile {
    pub hover_height: f64,
    pub move_in_distance: f64,
    pub move_up_distance: f64,
    pub move_out_distance: f64,
    pub pick_angle: f64,
    /// TCP drop matching `pick_angle`
    pub pick_height_offset: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NamedPoses {
    pub neutral: JointPose,
    pub left: JointPose,
    pub right: JointPose,
    pub present_car: Option<JointPose>,
}

/// Depth correction per slot, meters. Negative is recessed.
///
/// The key set equals the declared layout: `1..=slot_count` minus retired ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotDepthOffsets {
    pub(crate) slot_count: u32,
    pub(crate) retired: BTreeSet<u32>,
    pub(crate) offsets: BTreeMap<u32, f64>,
}

impl SlotDepthOffsets {
    pub fn get(&self, slot: u32) -> Option<f64> {
        self.offsets.get(&slot).copied()
    }

    pub fn contains(&self, slot: u32) -> bool {
        self.offsets.contains_key(&slot)
    }

    /// Declared physical slot count
    pub fn slot_count(&self) -> u32 {
        self.slot_count
    }

    pub fn retired(&self) -> &BTreeSet<u32> {
        &self.retired
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// (slot, offset) pairs in slot order
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.offsets.iter().map(|(slot, offset)| (*slot, *offset))
    }
}

/// Validated calibration for one machine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineCalibration {
    pub(crate) identity: Identity,
    pub(crate) halted_at_startup: bool,
    pub(crate) motion: MotionTuning,
    pub(crate) pickup: PickupGeometry,
    pub(crate) pick: PickProfile,
    pub(crate) poses: NamedPoses,
    pub(crate) tracks: BTreeMap<u32, TrackSequence>,
    pub(crate) slots: SlotDepthOffsets,
}

impl MachineCalibration {
    pub fn machine_id(&self) -> &str {
        &self.identity.machine_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn halted_at_startup(&self) -> bool {
        self.halted_at_startup
    }

    pub fn motion(&self) -> &MotionTuning {
        &self.motion
    }

    pub fn pickup(&self) -> &PickupGeometry {
        &self.pickup
    }

    pub fn pick(&self) -> &PickProfile {
        &self.pick
    }

    pub fn poses(&self) -> &NamedPoses {
        &self.poses
    }

    /// Calibrated tracks. Uncalibrated tracks are absent.
    pub fn tracks(&self) -> &BTreeMap<u32, TrackSequence> {
        &self.tracks
    }

    pub fn track(&self, track: u32) -> Option<&TrackSequence> {
        self.tracks.get(&track)
    }

    pub fn slots(&self) -> &SlotDepthOffsets {
        &self.slots
    }
}
