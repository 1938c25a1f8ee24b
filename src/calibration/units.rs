//! Physical units for calibration fields
//!
//! Every scalar field declares the unit it is authored in and the canonical
//! unit it is stored in. Lengths are stored in meters and angles in radians.
//! Conversion happens once, during validation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical dimension of a unit. Conversion is only defined within one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Length,
    Angle,
    Time,
    Velocity,
    Acceleration,
}

/// Units that appear in calibration records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Millimeter,
    Meter,
    Degree,
    Radian,
    Second,
    MeterPerSecond,
    MeterPerSecondSquared,
}

impl Unit {
    /// Short symbol used when rendering values in errors and logs
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Millimeter => "mm",
            Unit::Meter => "m",
            Unit::Degree => "°",
            Unit::Radian => "rad",
            Unit::Second => "s",
            Unit::MeterPerSecond => "m/s",
            Unit::MeterPerSecondSquared => "m/s²",
        }
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            Unit::Millimeter | Unit::Meter => Dimension::Length,
            Unit::Degree | Unit::Radian => Dimension::Angle,
            Unit::Second => Dimension::Time,
            Unit::MeterPerSecond => Dimension::Velocity,
            Unit::MeterPerSecondSquared => Dimension::Acceleration,
        }
    }

    /// The unit values of this dimension are stored in at runtime.
    pub fn canonical(&self) -> Unit {
        match self {
            Unit::Millimeter => Unit::Meter,
            Unit::Degree => Unit::Radian,
            other => *other,
        }
    }

    /// Converts `value` from this unit into `to`.
    ///
    /// Returns `None` when the units measure different dimensions.
    pub fn convert(&self, value: f64, to: Unit) -> Option<f64> {
        if self.dimension() != to.dimension() {
            return None;
        }
        let converted = match (self, to) {
            (Unit::Millimeter, Unit::Meter) => value / 1000.0,
            (Unit::Meter, Unit::Millimeter) => value * 1000.0,
            (Unit::Degree, Unit::Radian) => deg_to_rad(value),
            (Unit::Radian, Unit::Degree) => rad_to_deg(value),
            _ => value,
        };
        Some(converted)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

pub fn deg_to_rad(degrees: f64) -> f64 {
    degrees.to_radians()
}

pub fn rad_to_deg(radians: f64) -> f64 {
    radians.to_degrees()
}

/// Renders a value with its unit, e.g. `450°` or `-705 mm`.
pub fn format_quantity(value: f64, unit: Unit) -> String {
    match unit {
        Unit::Degree => format!("{}°", value),
        _ => format!("{} {}", value, unit.symbol()),
    }
}
