//! Gravity compensation and directional splitting
//!
//! Gravity is rebuilt from the current pitch/roll rather than taken from a
//! stored vector, so compensation follows the trailer as it tilts.

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::angles::TiltAngles;
use crate::frame::FrameVector;
use crate::peak::{split, DirectionalQuad};
use crate::units::Radians;

/// Expected gravity reading in the trailer frame
///
/// # Arguments
/// * `pitch` - Calibrated pitch
/// * `roll` - Calibrated roll
/// * `g_mag` - Gravity magnitude measured at calibration (g)
///
/// # Returns
/// * Gravity components along forward/right/up (g)
pub fn gravity_in_frame(pitch: Radians, roll: Radians, g_mag: f32) -> FrameVector {
    let (sp, cp) = pitch.value().sin_cos();
    let (sr, cr) = roll.value().sin_cos();

    FrameVector::new(-sp * g_mag, sr * g_mag, cp * cr * g_mag)
}

/// Zero anything whose magnitude is below `threshold`
pub fn deadband(v: f32, threshold: f32) -> f32 {
    if v.abs() < threshold {
        0.0
    } else {
        v
    }
}

fn deadband_frame(v: &FrameVector, threshold: f32) -> FrameVector {
    FrameVector::new(
        deadband(v.forward, threshold),
        deadband(v.right, threshold),
        deadband(v.up, threshold),
    )
}

/// Six-way linear acceleration (g), each direction non-negative
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct AccelSplit {
    pub forward: f32,
    pub backward: f32,
    pub right: f32,
    pub left: f32,
    pub up: f32,
    pub down: f32,
}

impl AccelSplit {
    pub fn from_linear(linear: &FrameVector) -> Self {
        let (forward, backward) = split(linear.forward);
        let (right, left) = split(linear.right);
        let (up, down) = split(linear.up);
        Self {
            forward,
            backward,
            right,
            left,
            up,
            down,
        }
    }

    /// Dashboard layout: up=forward, down=backward
    pub fn to_quad(&self) -> DirectionalQuad {
        DirectionalQuad::new(self.forward, self.backward, self.left, self.right)
    }
}

/// Six-way angular rate (deg/s), each direction non-negative
///
/// Each rate is named after the side the reference axis swings towards:
/// pitch moves Forward towards Up (`pitch_up`) or away, roll moves Up
/// towards Right (`roll_right`) or Left, turn moves Forward towards Right
/// (`turn_right`) or Left.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct RateSplit {
    pub pitch_up: f32,
    pub pitch_down: f32,
    pub roll_right: f32,
    pub roll_left: f32,
    pub turn_right: f32,
    pub turn_left: f32,
}

impl RateSplit {
    /// Split gyro rates already projected onto the trailer axes
    ///
    /// Rates follow the right-hand rule about each axis: a positive rate
    /// about Right tips Forward down, a positive rate about Forward tips Up
    /// towards Left, a positive rate about Up swings Forward towards Right.
    pub fn from_rates(rates: &FrameVector) -> Self {
        let (pitch_down, pitch_up) = split(rates.right);
        let (roll_left, roll_right) = split(rates.forward);
        let (turn_right, turn_left) = split(rates.up);
        Self {
            pitch_up,
            pitch_down,
            roll_right,
            roll_left,
            turn_right,
            turn_left,
        }
    }

    /// Dashboard layout: up/down are pitch, right/left are roll
    pub fn to_quad(&self) -> DirectionalQuad {
        DirectionalQuad::new(self.pitch_up, self.pitch_down, self.roll_left, self.roll_right)
    }
}

/// Result of compensating one accelerometer reading
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Compensation {
    /// Gravity that was subtracted
    pub gravity: FrameVector,
    /// Linear acceleration after subtraction and deadband
    pub linear: FrameVector,
    pub split: AccelSplit,
}

/// Remove gravity from a projected accelerometer reading
///
/// # Arguments
/// * `accel` - Accelerometer reading in the trailer frame (g)
/// * `angles` - Calibrated pitch/roll for this tick
/// * `g_mag` - Gravity magnitude (g)
/// * `threshold` - Per-axis deadband (g)
pub fn compensate(
    accel: &FrameVector,
    angles: TiltAngles,
    g_mag: f32,
    threshold: f32,
) -> Compensation {
    let (pitch, roll) = angles.to_radians();
    let gravity = gravity_in_frame(pitch, roll, g_mag).finite_or_zero();
    let linear = deadband_frame(&accel.sub(&gravity), threshold).finite_or_zero();

    Compensation {
        gravity,
        linear,
        split: AccelSplit::from_linear(&linear),
    }
}

/// Deadband and split projected gyro rates
pub fn split_rates(rates: &FrameVector, threshold: f32) -> RateSplit {
    RateSplit::from_rates(&deadband_frame(&rates.finite_or_zero(), threshold))
}
