//! armcal - calibration records for cassette-handling robot cells
//!
//! Loads, validates and serves per-machine calibration: motion tuning, pickup
//! grid geometry, named joint poses, track handoff sequences and per-slot
//! depth offsets.

pub mod calibration;
pub mod config;
pub mod observability;
