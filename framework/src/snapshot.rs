//! Per-tick output of the engine

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::angles::TiltAngles;
use crate::frame::{ForwardHint, FrameVector};
use crate::peak::DirectionalQuad;
use crate::sensors::SampleQuality;
use crate::transforms::{AccelSplit, RateSplit};
use crate::vector::Vector3;

/// Everything computed by one tick
///
/// Angles are degrees, accelerations g, rates deg/s. All values are finite.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct LevelSnapshot {
    pub timestamp_ms: u32,
    /// False while running on bootstrap defaults
    pub calibrated: bool,
    pub hint: ForwardHint,
    /// Pitch/roll before the zero offset
    pub raw_angles: TiltAngles,
    /// Pitch/roll relative to the calibration pose
    pub angles: TiltAngles,
    /// Display-smoothed `angles`
    pub smoothed: TiltAngles,
    /// Raw accelerometer, sensor axes
    pub accel: Vector3,
    /// Raw gyroscope, sensor axes
    pub gyro: Vector3,
    /// Gravity subtracted from the projected reading
    pub gravity: FrameVector,
    /// Compensated acceleration in the trailer frame
    pub linear_accel: FrameVector,
    pub accel_split: AccelSplit,
    pub rate_split: RateSplit,
    pub accel_peak: DirectionalQuad,
    pub rate_peak: DirectionalQuad,
    pub quality: SampleQuality,
}
