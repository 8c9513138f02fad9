//! Trailer reference frame
//!
//! The trailer frame is a right-handed Forward/Right/Up basis expressed in
//! sensor coordinates. It is built from a measured gravity direction (Up)
//! plus a coarse forward hint naming one of the sensor's horizontal axes.
//! Raw sensor vectors are projected into the frame with one dot product per
//! axis.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::error::LevelError;
use crate::vector::Vector3;

/// Orthonormality tolerance used when validating a stored basis
pub const BASIS_TOLERANCE: f32 = 1e-3;

/// Coarse forward direction in sensor coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum ForwardHint {
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "+X"))]
    PlusX,
    #[cfg_attr(feature = "serde", serde(rename = "-X"))]
    MinusX,
    #[cfg_attr(feature = "serde", serde(rename = "+Y"))]
    PlusY,
    #[cfg_attr(feature = "serde", serde(rename = "-Y"))]
    MinusY,
}

impl ForwardHint {
    pub const ALL: [ForwardHint; 4] = [
        ForwardHint::PlusX,
        ForwardHint::MinusX,
        ForwardHint::PlusY,
        ForwardHint::MinusY,
    ];

    /// Raw sensor axis this hint selects as the forward candidate
    pub fn axis(self) -> Vector3 {
        match self {
            ForwardHint::PlusX => Vector3::X,
            ForwardHint::MinusX => Vector3::X.scale(-1.0),
            ForwardHint::PlusY => Vector3::Y,
            ForwardHint::MinusY => Vector3::Y.scale(-1.0),
        }
    }

    /// Canonical wire/storage token
    pub fn token(self) -> &'static str {
        match self {
            ForwardHint::PlusX => "+X",
            ForwardHint::MinusX => "-X",
            ForwardHint::PlusY => "+Y",
            ForwardHint::MinusY => "-Y",
        }
    }
}

impl fmt::Display for ForwardHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for ForwardHint {
    type Err = LevelError;

    /// Accepts exactly `+X`, `-X`, `+Y` or `-Y`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+X" => Ok(ForwardHint::PlusX),
            "-X" => Ok(ForwardHint::MinusX),
            "+Y" => Ok(ForwardHint::PlusY),
            "-Y" => Ok(ForwardHint::MinusY),
            _ => Err(LevelError::InvalidHint(s.to_string())),
        }
    }
}

/// A vector expressed in the trailer frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct FrameVector {
    pub forward: f32,
    pub right: f32,
    pub up: f32,
}

impl FrameVector {
    pub const fn new(forward: f32, right: f32, up: f32) -> Self {
        Self { forward, right, up }
    }

    pub fn sub(&self, other: &FrameVector) -> FrameVector {
        FrameVector::new(
            self.forward - other.forward,
            self.right - other.right,
            self.up - other.up,
        )
    }

    pub fn finite_or_zero(&self) -> FrameVector {
        let v = Vector3::new(self.forward, self.right, self.up).finite_or_zero();
        FrameVector::new(v.x, v.y, v.z)
    }
}

/// Forward/Right/Up unit vectors in sensor coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Basis {
    pub forward: Vector3,
    pub right: Vector3,
    pub up: Vector3,
}

impl Default for Basis {
    fn default() -> Self {
        Self::identity()
    }
}

impl Basis {
    /// Sensor axes used as-is: forward = +X, right = +Y, up = +Z
    pub fn identity() -> Self {
        Self {
            forward: Vector3::X,
            right: Vector3::Y,
            up: Vector3::Z,
        }
    }

    /// Build the trailer basis from a raw gravity reading and a forward hint
    ///
    /// The hint axis is projected onto the plane orthogonal to Up, then
    /// Right and Forward are re-derived through cross products so the result
    /// is orthonormal to float precision and right-handed
    /// (forward × right = up).
    ///
    /// If the hint axis is (nearly) parallel to Up the projected length is
    /// floored rather than divided by zero: Forward and Right collapse
    /// towards zero but never become NaN.
    ///
    /// # Arguments
    /// * `raw_up` - Averaged accelerometer reading at rest (any scale)
    /// * `hint` - Sensor axis that points roughly towards the hitch
    pub fn from_up_and_hint(raw_up: Vector3, hint: ForwardHint) -> Self {
        let up = raw_up.normalize();
        let candidate = hint.axis();
        let forward = candidate.sub(&up.scale(candidate.dot(&up))).normalize();
        let right = up.cross(&forward).normalize();
        let forward = right.cross(&up).normalize();

        Self {
            forward: forward.finite_or_zero(),
            right: right.finite_or_zero(),
            up: up.finite_or_zero(),
        }
    }

    /// Express a raw sensor vector in the trailer frame
    pub fn project(&self, raw: &Vector3) -> FrameVector {
        FrameVector::new(
            raw.dot(&self.forward),
            raw.dot(&self.right),
            raw.dot(&self.up),
        )
    }

    /// All three vectors unit length and pairwise orthogonal within `tol`
    pub fn is_orthonormal(&self, tol: f32) -> bool {
        let unit = |v: &Vector3| (v.length() - 1.0).abs() < tol;
        unit(&self.forward)
            && unit(&self.right)
            && unit(&self.up)
            && self.forward.dot(&self.right).abs() < tol
            && self.forward.dot(&self.up).abs() < tol
            && self.right.dot(&self.up).abs() < tol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_eq(a: Vector3, b: Vector3, tol: f32) {
        assert!(
            (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol && (a.z - b.z).abs() < tol,
            "expected {:?}, got {:?}",
            b,
            a
        );
    }

    #[test]
    fn test_level_plus_x_is_identity() {
        let basis = Basis::from_up_and_hint(Vector3::new(0.0, 0.0, 1.0), ForwardHint::PlusX);
        assert_vec_eq(basis.up, Vector3::Z, 1e-6);
        assert_vec_eq(basis.forward, Vector3::X, 1e-6);
        assert_vec_eq(basis.right, Vector3::Y, 1e-6);
    }

    #[test]
    fn test_right_handed() {
        for hint in ForwardHint::ALL {
            let basis = Basis::from_up_and_hint(Vector3::new(0.1, -0.2, 0.97), hint);
            assert_vec_eq(basis.forward.cross(&basis.right), basis.up, 1e-5);
        }
    }

    #[test]
    fn test_orthonormal_for_tilted_mounts() {
        let ups = [
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 0.0, -1.0),
            Vector3::new(0.3, 0.1, 0.95),
            Vector3::new(-0.5, 0.5, 0.7),
            Vector3::new(0.0, 0.0, 9.81),
            Vector3::new(0.02, 0.7, 0.7),
            Vector3::new(0.7, 0.02, -0.7),
        ];
        for up in ups {
            for hint in ForwardHint::ALL {
                let b = Basis::from_up_and_hint(up, hint);
                assert!(b.forward.dot(&b.right).abs() < 1e-4, "{:?} {:?}", up, hint);
                assert!(b.forward.dot(&b.up).abs() < 1e-4, "{:?} {:?}", up, hint);
                assert!(b.right.dot(&b.up).abs() < 1e-4, "{:?} {:?}", up, hint);
                assert!(b.is_orthonormal(1e-4), "{:?} {:?}", up, hint);
            }
        }
    }

    #[test]
    fn test_forward_follows_hint() {
        let basis = Basis::from_up_and_hint(Vector3::Z, ForwardHint::MinusY);
        assert_vec_eq(basis.forward, Vector3::new(0.0, -1.0, 0.0), 1e-6);
        assert_vec_eq(basis.right, Vector3::new(1.0, 0.0, 0.0), 1e-6);
    }

    #[test]
    fn test_degenerate_hint_parallel_to_up_stays_finite() {
        // Sensor mounted on its side: +X points straight up
        let basis = Basis::from_up_and_hint(Vector3::new(1.0, 0.0, 0.0), ForwardHint::PlusX);
        assert!(basis.forward.is_finite());
        assert!(basis.right.is_finite());
        assert!(basis.up.is_finite());
        assert!(!basis.is_orthonormal(BASIS_TOLERANCE));
    }

    #[test]
    fn test_projection_onto_identity() {
        let v = Vector3::new(0.1, -0.2, 0.9);
        let p = Basis::identity().project(&v);
        assert_eq!(p, FrameVector::new(0.1, -0.2, 0.9));
    }

    #[test]
    fn test_hint_parsing() {
        assert_eq!("+X".parse::<ForwardHint>(), Ok(ForwardHint::PlusX));
        assert_eq!("-Y".parse::<ForwardHint>(), Ok(ForwardHint::MinusY));
        for bad in ["+Z", "", "x", "y", "+x", " -y ", "X", "-X "] {
            assert!(
                matches!(bad.parse::<ForwardHint>(), Err(LevelError::InvalidHint(_))),
                "{:?} should be rejected",
                bad
            );
        }
        for hint in ForwardHint::ALL {
            assert_eq!(hint.token().parse::<ForwardHint>(), Ok(hint));
        }
    }
}
