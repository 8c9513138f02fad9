//! Time-based exponential smoothing
//!
//! Both the display smoother and the peak-hold decay use the same law:
//! alpha = 1 - exp(-Δt/τ), with Δt taken from wall-clock milliseconds and
//! clamped so a stalled loop can't produce a huge jump.

use crate::angles::TiltAngles;
use crate::units::{wrap180, Degrees};

/// Upper bound on any time step fed to a filter
pub const MAX_DT_MS: u32 = 2000;

/// Milliseconds from `last` to `now`, tolerant of `u32` wraparound
///
/// A clock that went backwards yields 0; anything above [`MAX_DT_MS`] is
/// clamped.
pub fn elapsed_ms(last: u32, now: u32) -> u32 {
    let delta = now.wrapping_sub(last) as i32;
    if delta <= 0 {
        0
    } else {
        (delta as u32).min(MAX_DT_MS)
    }
}

/// Blend factor for a first-order exponential step
///
/// # Arguments
/// * `dt_ms` - Elapsed time (already clamped)
/// * `tau_ms` - Time constant; non-positive means "no smoothing"
pub fn decay_alpha(dt_ms: u32, tau_ms: f32) -> f32 {
    if !(tau_ms.is_finite() && tau_ms > 0.0) {
        return 1.0;
    }
    1.0 - (-(dt_ms as f32) / tau_ms).exp()
}

/// Exponential moving average of pitch/roll for display
///
/// The step is taken on the wrapped difference, so an angle crossing ±180°
/// moves the short way round instead of sweeping through zero.
#[derive(Debug, Clone)]
pub struct AngleSmoother {
    tau_ms: f32,
    value: Option<TiltAngles>,
    last_ms: u32,
}

impl AngleSmoother {
    /// # Arguments
    /// * `tau_ms` - Smoothing time constant in milliseconds (e.g., 400.0)
    pub fn new(tau_ms: f32) -> Self {
        Self {
            tau_ms,
            value: None,
            last_ms: 0,
        }
    }

    /// Feed one calibrated reading and return the smoothed value
    pub fn update(&mut self, angles: TiltAngles, now_ms: u32) -> TiltAngles {
        let angles = angles.finite_or_zero();

        let next = match self.value {
            None => angles,
            Some(prev) => {
                let alpha = decay_alpha(elapsed_ms(self.last_ms, now_ms), self.tau_ms);
                let step = |from: Degrees, to: Degrees| {
                    Degrees(wrap180(from.value() + alpha * wrap180(to.value() - from.value())))
                };
                TiltAngles::new(step(prev.pitch, angles.pitch), step(prev.roll, angles.roll))
            }
        };

        self.value = Some(next);
        self.last_ms = now_ms;
        next
    }

    /// Last smoothed value, zero before the first sample
    pub fn value(&self) -> TiltAngles {
        self.value.unwrap_or_default()
    }

    pub fn is_seeded(&self) -> bool {
        self.value.is_some()
    }

    /// Forget the average; the next sample seeds it again
    pub fn reset(&mut self) {
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose(pitch: f32, roll: f32) -> TiltAngles {
        TiltAngles::new(Degrees(pitch), Degrees(roll))
    }

    #[test]
    fn test_elapsed_ms() {
        assert_eq!(elapsed_ms(100, 150), 50);
        assert_eq!(elapsed_ms(150, 100), 0);
        assert_eq!(elapsed_ms(0, 10_000), MAX_DT_MS);
        // Across the u32 wrap
        assert_eq!(elapsed_ms(u32::MAX - 4, 5), 10);
    }

    #[test]
    fn test_decay_alpha() {
        assert_eq!(decay_alpha(0, 400.0), 0.0);
        assert!((decay_alpha(400, 400.0) - (1.0 - (-1.0_f32).exp())).abs() < 1e-6);
        assert_eq!(decay_alpha(10, 0.0), 1.0);
        assert_eq!(decay_alpha(10, f32::NAN), 1.0);
    }

    #[test]
    fn test_first_sample_seeds() {
        let mut s = AngleSmoother::new(400.0);
        assert!(!s.is_seeded());
        let out = s.update(pose(5.0, -3.0), 1000);
        assert_eq!(out, pose(5.0, -3.0));
        assert!(s.is_seeded());
    }

    #[test]
    fn test_converges_to_step() {
        let mut s = AngleSmoother::new(400.0);
        s.update(pose(0.0, 0.0), 0);
        let mut now = 0;
        let mut prev = 0.0;
        for _ in 0..200 {
            now += 20;
            let out = s.update(pose(10.0, 0.0), now);
            assert!(out.pitch.value() >= prev);
            prev = out.pitch.value();
        }
        assert!((prev - 10.0).abs() < 1e-3, "smoothed pitch {}", prev);
    }

    #[test]
    fn test_one_time_constant() {
        let mut s = AngleSmoother::new(400.0);
        s.update(pose(0.0, 0.0), 0);
        let out = s.update(pose(10.0, 10.0), 400);
        let expected = 10.0 * (1.0 - (-1.0_f32).exp());
        assert!((out.pitch.value() - expected).abs() < 1e-4);
        assert!((out.roll.value() - expected).abs() < 1e-4);
    }

    #[test]
    fn test_crosses_180_short_way() {
        let mut s = AngleSmoother::new(400.0);
        s.update(pose(0.0, 179.0), 0);
        let out = s.update(pose(0.0, -179.0), 2000);
        // Must stay near ±180 rather than passing through 0
        assert!(out.roll.value().abs() > 178.0, "roll {}", out.roll.value());
    }

    #[test]
    fn test_clock_backwards_holds_value() {
        let mut s = AngleSmoother::new(400.0);
        s.update(pose(1.0, 1.0), 1000);
        let out = s.update(pose(50.0, 50.0), 900);
        assert_eq!(out, pose(1.0, 1.0));
    }

    #[test]
    fn test_reset_reseeds() {
        let mut s = AngleSmoother::new(400.0);
        s.update(pose(1.0, 1.0), 0);
        s.reset();
        assert_eq!(s.value(), TiltAngles::default());
        let out = s.update(pose(7.0, 8.0), 10);
        assert_eq!(out, pose(7.0, 8.0));
    }
}
