//! Reference-frame calibration from gravity
//!
//! With the trailer parked, the accelerometer measures only gravity. The
//! averaged reading gives the Up direction; the forward hint picks which
//! horizontal direction is Forward. The magnitude of the averaged reading
//! is kept as the gravity magnitude used by compensation.
//!
//! The magnitude is taken from the *average vector*, not averaged per
//! sample. If the trailer is rocking during capture the two differ and
//! this one reads low.

use log::{debug, info, warn};

use crate::angles::{tilt_from_gravity, CalibrationZero};
use crate::frame::{Basis, ForwardHint};
use crate::store::MIN_RAW_UP_LENGTH;
use crate::vector::{mean, Vector3};

/// Whether an averaged reading can define the Up direction
///
/// An all-zero average (every sample substituted after read failures) or a
/// non-finite one cannot.
pub fn is_usable_up(raw_up: &Vector3) -> bool {
    raw_up.is_finite() && raw_up.length() >= MIN_RAW_UP_LENGTH
}

/// Result of a completed calibration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameCalibration {
    /// Trailer basis in sensor coordinates
    pub basis: Basis,
    /// Averaged raw accelerometer reading (unnormalized)
    pub raw_up: Vector3,
    /// Hint the basis was built with
    pub hint: ForwardHint,
    /// Zero offsets captured at the calibration pose
    pub zero: CalibrationZero,
    /// Magnitude of the averaged reading (g)
    pub gravity_magnitude: f32,
}

/// Collects raw accelerometer samples while the trailer is at rest
pub struct BasisCalibrator {
    samples: Vec<Vector3>,
    target_samples: usize,
}

impl BasisCalibrator {
    /// # Arguments
    /// * `target_samples` - Number of samples to average (~80)
    pub fn new(target_samples: usize) -> Self {
        let target_samples = target_samples.max(1);
        Self {
            samples: Vec::with_capacity(target_samples),
            target_samples,
        }
    }

    /// Add an accelerometer reading; ignored once the target is reached
    pub fn add_sample(&mut self, accel: Vector3) {
        if !self.is_complete() {
            self.samples.push(accel.finite_or_zero());
        }
    }

    pub fn is_complete(&self) -> bool {
        self.samples.len() >= self.target_samples
    }

    /// Progress from 0.0 to 1.0
    pub fn progress(&self) -> f32 {
        self.samples.len() as f32 / self.target_samples as f32
    }

    /// Averaged raw reading of the samples collected so far
    pub fn raw_up(&self) -> Vector3 {
        mean(&self.samples)
    }

    /// Compute the calibration from the collected samples
    ///
    /// Returns `None` until the target sample count is reached, and when the
    /// averaged reading is not a usable gravity direction.
    pub fn finish(&self, hint: ForwardHint) -> Option<FrameCalibration> {
        if !self.is_complete() {
            return None;
        }
        let raw_up = self.raw_up();
        if !is_usable_up(&raw_up) {
            warn!(
                "Averaged reading ({:.4}, {:.4}, {:.4}) has no usable gravity direction",
                raw_up.x, raw_up.y, raw_up.z
            );
            return None;
        }
        let cal = calibrate_from_raw_up(raw_up, hint);
        debug!(
            "Calibration from {} samples: raw_up=({:.4}, {:.4}, {:.4})",
            self.samples.len(),
            cal.raw_up.x,
            cal.raw_up.y,
            cal.raw_up.z
        );
        Some(cal)
    }
}

/// Build a full calibration from an averaged raw reading and a hint
///
/// The zero offsets are the angles of the averaged reading in the new
/// basis, so the calibration pose reads 0°/0° afterwards.
pub fn calibrate_from_raw_up(raw_up: Vector3, hint: ForwardHint) -> FrameCalibration {
    let raw_up = raw_up.finite_or_zero();
    let basis = Basis::from_up_and_hint(raw_up, hint);
    let pose = tilt_from_gravity(&basis.project(&raw_up));
    let gravity_magnitude = raw_up.length();

    info!(
        "Frame calibrated: hint={}, |g|={:.4} g, pose pitch={:.2}° roll={:.2}°",
        hint,
        gravity_magnitude,
        pose.pitch.value(),
        pose.roll.value()
    );

    FrameCalibration {
        basis,
        raw_up,
        hint,
        zero: CalibrationZero::from_pose(pose),
        gravity_magnitude,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_zero_burst_is_rejected() {
        let mut cal = BasisCalibrator::new(5);
        for _ in 0..5 {
            cal.add_sample(Vector3::ZERO);
        }
        assert!(cal.is_complete());
        assert!(cal.finish(ForwardHint::PlusX).is_none());
        assert!(!is_usable_up(&Vector3::new(f32::NAN, 0.0, 1.0)));
        assert!(is_usable_up(&Vector3::Z));
    }

    #[test]
    fn test_calibrator_progress() {
        let mut cal = BasisCalibrator::new(10);
        assert!(!cal.is_complete());
        assert_eq!(cal.progress(), 0.0);

        for i in 0..5 {
            cal.add_sample(Vector3::new(0.0, 0.0, 1.0));
            assert_eq!(cal.progress(), (i + 1) as f32 / 10.0);
        }
        assert!(cal.finish(ForwardHint::PlusX).is_none());

        for _ in 0..10 {
            cal.add_sample(Vector3::new(0.0, 0.0, 1.0));
        }
        assert!(cal.is_complete());
        assert_eq!(cal.progress(), 1.0);
    }

    #[test]
    fn test_level_sensor_gives_identity_basis() {
        let mut cal = BasisCalibrator::new(80);
        for _ in 0..80 {
            cal.add_sample(Vector3::new(0.0, 0.0, 1.0));
        }
        let result = cal.finish(ForwardHint::PlusX).unwrap();
        assert!((result.basis.up.z - 1.0).abs() < 1e-6);
        assert!((result.basis.forward.x - 1.0).abs() < 1e-6);
        assert!((result.basis.right.y - 1.0).abs() < 1e-6);
        assert!((result.gravity_magnitude - 1.0).abs() < 1e-6);
        assert!(result.zero.pitch.value().abs() < 1e-4);
        assert!(result.zero.roll.value().abs() < 1e-4);
    }

    #[test]
    fn test_gravity_magnitude_is_magnitude_of_average() {
        // Two readings tilted ±30° about Y: each has magnitude 1.0 but the
        // average is shorter (cos 30°).
        let a = Vector3::new(0.5, 0.0, 0.866_025_4);
        let b = Vector3::new(-0.5, 0.0, 0.866_025_4);
        let mut cal = BasisCalibrator::new(2);
        cal.add_sample(a);
        cal.add_sample(b);
        let result = cal.finish(ForwardHint::PlusX).unwrap();
        assert!(
            (result.gravity_magnitude - 0.866_025_4).abs() < 1e-5,
            "magnitude should come from the averaged vector: {}",
            result.gravity_magnitude
        );
    }

    #[test]
    fn test_tilted_mount_reads_zero_after_calibration() {
        let raw_up = Vector3::new(0.2, -0.3, 0.93);
        let result = calibrate_from_raw_up(raw_up, ForwardHint::MinusX);
        let pose = tilt_from_gravity(&result.basis.project(&raw_up));
        let level = result.zero.apply(pose);
        assert!(level.pitch.value().abs() < 1e-3, "pitch {}", level.pitch.value());
        assert!(level.roll.value().abs() < 1e-3, "roll {}", level.roll.value());
    }

    #[test]
    fn test_non_finite_samples_are_zeroed() {
        let mut cal = BasisCalibrator::new(2);
        cal.add_sample(Vector3::new(f32::NAN, 0.0, 1.0));
        cal.add_sample(Vector3::new(0.0, 0.0, 1.0));
        let result = cal.finish(ForwardHint::PlusX).unwrap();
        assert!(result.raw_up.is_finite());
        assert!(result.basis.is_orthonormal(1e-4));
    }
}
