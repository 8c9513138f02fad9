//! Minimal 3-vector math for frame construction and projection
//!
//! Everything here is plain `f32` arithmetic. Normalization floors the
//! length instead of dividing by zero, so degenerate input produces a
//! zero vector rather than NaN.

#[cfg(feature = "serde")]
use serde::Serialize;

/// Smallest length accepted as a divisor when normalizing
pub const NORMALIZE_EPSILON: f32 = 1e-9;

/// Ordered triple of floats (g, deg/s or unitless depending on context)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3::new(0.0, 0.0, 0.0);
    pub const X: Vector3 = Vector3::new(1.0, 0.0, 0.0);
    pub const Y: Vector3 = Vector3::new(0.0, 1.0, 0.0);
    pub const Z: Vector3 = Vector3::new(0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Vector3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vector3) -> Vector3 {
        Vector3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(&self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn scale(&self, k: f32) -> Vector3 {
        Vector3::new(self.x * k, self.y * k, self.z * k)
    }

    pub fn add(&self, other: &Vector3) -> Vector3 {
        Vector3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(&self, other: &Vector3) -> Vector3 {
        Vector3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    /// Unit vector in the same direction
    ///
    /// The divisor is floored at [`NORMALIZE_EPSILON`]: a (near) zero
    /// vector stays (near) zero instead of becoming NaN.
    pub fn normalize(&self) -> Vector3 {
        self.scale(1.0 / self.length().max(NORMALIZE_EPSILON))
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Replace any non-finite component with 0
    pub fn finite_or_zero(&self) -> Vector3 {
        Vector3::new(
            finite_or_zero(self.x),
            finite_or_zero(self.y),
            finite_or_zero(self.z),
        )
    }
}

impl From<[f32; 3]> for Vector3 {
    fn from(v: [f32; 3]) -> Self {
        Vector3::new(v[0], v[1], v[2])
    }
}

/// NaN and ±Inf become 0, everything else passes through
pub fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Arithmetic mean of a set of vectors, zero for an empty set
pub fn mean(samples: &[Vector3]) -> Vector3 {
    if samples.is_empty() {
        return Vector3::ZERO;
    }
    let sum = samples.iter().fold(Vector3::ZERO, |acc, v| acc.add(v));
    sum.scale(1.0 / samples.len() as f32)
}
