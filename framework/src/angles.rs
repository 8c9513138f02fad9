//! Pitch/roll from the projected gravity reading
//!
//! Angles are purely geometric: no gyro integration, so they never drift,
//! but linear acceleration (braking, bumps) shows up as apparent tilt.

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::frame::FrameVector;
use crate::units::{Degrees, Radians};
use crate::vector::finite_or_zero;

/// Floor for the horizontal magnitude under the pitch atan2
///
/// With the forward axis near vertical, pitch saturates towards ±90°
/// instead of going unstable.
pub const PITCH_DENOMINATOR_FLOOR: f32 = 1e-6;

/// Pitch and roll pair
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct TiltAngles {
    pub pitch: Degrees,
    pub roll: Degrees,
}

impl TiltAngles {
    pub fn new(pitch: Degrees, roll: Degrees) -> Self {
        Self { pitch, roll }
    }

    /// Same pair in radians
    pub fn to_radians(self) -> (Radians, Radians) {
        (self.pitch.to_radians(), self.roll.to_radians())
    }

    pub fn finite_or_zero(self) -> Self {
        Self {
            pitch: Degrees(finite_or_zero(self.pitch.value())),
            roll: Degrees(finite_or_zero(self.roll.value())),
        }
    }
}

/// Raw pitch/roll of an accelerometer reading projected into the trailer frame
///
/// pitch = atan2(-forward, sqrt(right² + up²)), roll = atan2(right, up),
/// both in degrees.
pub fn tilt_from_gravity(accel: &FrameVector) -> TiltAngles {
    let horizontal = (accel.right * accel.right + accel.up * accel.up)
        .sqrt()
        .max(PITCH_DENOMINATOR_FLOOR);
    let pitch = Radians((-accel.forward).atan2(horizontal));
    let roll = Radians(accel.right.atan2(accel.up));

    TiltAngles::new(pitch.to_degrees(), roll.to_degrees()).finite_or_zero()
}

/// Pitch/roll captured at the reference pose
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CalibrationZero {
    pub pitch: Degrees,
    pub roll: Degrees,
}

impl CalibrationZero {
    pub fn new(pitch: Degrees, roll: Degrees) -> Self {
        Self { pitch, roll }
    }

    pub fn from_pose(pose: TiltAngles) -> Self {
        Self::new(pose.pitch, pose.roll)
    }

    /// Angles relative to the reference pose, wrapped into (-180, 180]
    pub fn apply(&self, raw: TiltAngles) -> TiltAngles {
        TiltAngles::new(
            (raw.pitch - self.pitch).wrapped(),
            (raw.roll - self.roll).wrapped(),
        )
    }
}
