//! Positions in controller steps and in microns.
//!
//! The MP-285 works in microsteps. Everything user-facing (the CLI, the move
//! log) works in microns. The conversion is a fixed linear scale applied at the
//! session boundary; the wire codec only ever sees [`Position`].

use crate::error::{Mp285Error, Mp285Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Microsteps per micron documented for the MP-285 (0.04 um per microstep).
pub const DEFAULT_STEPS_PER_MICRON: f64 = 25.0;

/// Absolute stage position in controller steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    /// X axis, steps.
    pub x: i32,
    /// Y axis, steps.
    pub y: i32,
    /// Z axis, steps.
    pub z: i32,
}

impl Position {
    /// Position from per-axis step counts.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl From<(i32, i32, i32)> for Position {
    fn from((x, y, z): (i32, i32, i32)) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X = {}, Y = {}, Z = {} steps", self.x, self.y, self.z)
    }
}

/// Absolute stage position in microns.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MicronPosition {
    /// X axis, um.
    pub x: f64,
    /// Y axis, um.
    pub y: f64,
    /// Z axis, um.
    pub z: f64,
}

impl MicronPosition {
    /// Position from per-axis micron values.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl From<(f64, f64, f64)> for MicronPosition {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for MicronPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X = {}, Y = {}, Z = {} um", self.x, self.y, self.z)
    }
}

/// Linear step/micron conversion factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepScale {
    steps_per_micron: f64,
}

impl Default for StepScale {
    fn default() -> Self {
        Self {
            steps_per_micron: DEFAULT_STEPS_PER_MICRON,
        }
    }
}

impl StepScale {
    /// Create a scale; `steps_per_micron` must be finite and positive.
    pub fn new(steps_per_micron: f64) -> Mp285Result<Self> {
        if !steps_per_micron.is_finite() || steps_per_micron <= 0.0 {
            return Err(Mp285Error::Configuration(format!(
                "steps_per_micron must be a positive number, got {}",
                steps_per_micron
            )));
        }
        Ok(Self { steps_per_micron })
    }

    /// Steps per micron.
    pub fn steps_per_micron(&self) -> f64 {
        self.steps_per_micron
    }

    /// Convert a micron position to the nearest step position.
    pub fn to_steps(&self, microns: MicronPosition) -> Mp285Result<Position> {
        Ok(Position {
            x: self.axis_to_steps('X', microns.x)?,
            y: self.axis_to_steps('Y', microns.y)?,
            z: self.axis_to_steps('Z', microns.z)?,
        })
    }

    /// Convert a step position to microns. Exact up to `f64` precision.
    pub fn to_microns(&self, steps: Position) -> MicronPosition {
        MicronPosition {
            x: f64::from(steps.x) / self.steps_per_micron,
            y: f64::from(steps.y) / self.steps_per_micron,
            z: f64::from(steps.z) / self.steps_per_micron,
        }
    }

    fn axis_to_steps(&self, axis: char, microns: f64) -> Mp285Result<i32> {
        let steps = (microns * self.steps_per_micron).round();
        if !steps.is_finite() || steps < f64::from(i32::MIN) || steps > f64::from(i32::MAX) {
            return Err(Mp285Error::OutOfRange {
                axis,
                value: microns,
            });
        }
        Ok(steps as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scale_conversion() {
        let scale = StepScale::default();
        let steps = scale
            .to_steps(MicronPosition::new(100.0, -2.5, 0.0))
            .unwrap();
        assert_eq!(steps, Position::new(2500, -63, 0));
    }

    #[test]
    fn test_round_trip_within_one_step() {
        let scale = StepScale::new(16.0).unwrap();
        let tolerance = 1.0 / scale.steps_per_micron();
        for &um in &[0.0, 0.03, 1.0, 3625.0, 12739.4, -4108.77, 22285.123] {
            let steps = scale.to_steps(MicronPosition::new(um, um, um)).unwrap();
            let back = scale.to_microns(steps);
            assert!((back.x - um).abs() <= tolerance, "{} -> {}", um, back.x);
            assert!((back.z - um).abs() <= tolerance);
        }
    }

    #[test]
    fn test_conversion_is_linear() {
        let scale = StepScale::default();
        let a = scale.to_steps(MicronPosition::new(40.0, 0.0, 0.0)).unwrap();
        let b = scale.to_steps(MicronPosition::new(80.0, 0.0, 0.0)).unwrap();
        assert_eq!(b.x, 2 * a.x);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let scale = StepScale::default();
        let err = scale
            .to_steps(MicronPosition::new(0.0, 1.0e9, 0.0))
            .unwrap_err();
        assert!(matches!(err, Mp285Error::OutOfRange { axis: 'Y', .. }));

        let err = scale
            .to_steps(MicronPosition::new(f64::NAN, 0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, Mp285Error::OutOfRange { axis: 'X', .. }));
    }

    #[test]
    fn test_invalid_scale_rejected() {
        assert!(StepScale::new(0.0).is_err());
        assert!(StepScale::new(-1.0).is_err());
        assert!(StepScale::new(f64::INFINITY).is_err());
    }
}
