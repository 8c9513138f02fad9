//! Directional peak-hold with exponential decay
//!
//! Each direction snaps up to a new maximum immediately and relaxes back
//! towards the current magnitude with the same exponential law the angle
//! smoother uses.

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::filter::{decay_alpha, elapsed_ms};
use crate::vector::finite_or_zero;

/// Four non-negative directional magnitudes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct DirectionalQuad {
    pub up: f32,
    pub down: f32,
    pub left: f32,
    pub right: f32,
}

impl DirectionalQuad {
    pub const ZERO: DirectionalQuad = DirectionalQuad {
        up: 0.0,
        down: 0.0,
        left: 0.0,
        right: 0.0,
    };

    pub fn new(up: f32, down: f32, left: f32, right: f32) -> Self {
        Self {
            up,
            down,
            left,
            right,
        }
    }

    /// Clamp every direction to a finite non-negative value
    pub fn sanitized(&self) -> Self {
        let clean = |v: f32| finite_or_zero(v).max(0.0);
        Self::new(
            clean(self.up),
            clean(self.down),
            clean(self.left),
            clean(self.right),
        )
    }

    fn zip_with(&self, other: &DirectionalQuad, f: impl Fn(f32, f32) -> f32) -> Self {
        Self::new(
            f(self.up, other.up),
            f(self.down, other.down),
            f(self.left, other.left),
            f(self.right, other.right),
        )
    }
}

/// Split a signed value into its (positive, negative) magnitudes
pub fn split(v: f32) -> (f32, f32) {
    let v = finite_or_zero(v);
    (v.max(0.0), (-v).max(0.0))
}

/// Envelope follower over a [`DirectionalQuad`]
#[derive(Debug, Clone)]
pub struct PeakHoldTracker {
    tau_ms: f32,
    peak: DirectionalQuad,
    last_ms: Option<u32>,
}

impl PeakHoldTracker {
    /// # Arguments
    /// * `tau_ms` - Decay time constant in milliseconds
    pub fn new(tau_ms: f32) -> Self {
        Self {
            tau_ms,
            peak: DirectionalQuad::ZERO,
            last_ms: None,
        }
    }

    /// Fold in the current magnitudes and return the updated peaks
    ///
    /// The first call after construction or [`reset`](Self::reset) seeds the
    /// peaks with `current` directly.
    pub fn update(&mut self, current: DirectionalQuad, now_ms: u32) -> DirectionalQuad {
        let current = current.sanitized();

        self.peak = match self.last_ms {
            None => current,
            Some(last) => {
                let alpha = decay_alpha(elapsed_ms(last, now_ms), self.tau_ms);
                self.peak.zip_with(&current, |held, now| {
                    if now >= held {
                        now
                    } else {
                        held + alpha * (now - held)
                    }
                })
            }
        };
        self.last_ms = Some(now_ms);

        self.peak
    }

    pub fn peak(&self) -> DirectionalQuad {
        self.peak
    }

    pub fn tau_ms(&self) -> f32 {
        self.tau_ms
    }

    /// Zero all peaks and forget the last timestamp
    pub fn reset(&mut self) {
        self.peak = DirectionalQuad::ZERO;
        self.last_ms = None;
    }
}
