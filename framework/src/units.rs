//! Typed angle units
//!
//! Angles crossing a module boundary are always wrapped in [`Degrees`] or
//! [`Radians`] so a value in one unit can't be fed to code expecting the
//! other.

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::vector::finite_or_zero;

/// Angle in degrees
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(transparent))]
pub struct Degrees(pub f32);

/// Angle in radians
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(transparent))]
pub struct Radians(pub f32);

impl Degrees {
    pub fn value(self) -> f32 {
        self.0
    }

    pub fn to_radians(self) -> Radians {
        Radians(self.0.to_radians())
    }

    /// Wrap into (-180, 180]
    pub fn wrapped(self) -> Degrees {
        Degrees(wrap180(self.0))
    }
}

impl Radians {
    pub fn value(self) -> f32 {
        self.0
    }

    pub fn to_degrees(self) -> Degrees {
        Degrees(self.0.to_degrees())
    }
}

impl From<Radians> for Degrees {
    fn from(r: Radians) -> Self {
        r.to_degrees()
    }
}

impl From<Degrees> for Radians {
    fn from(d: Degrees) -> Self {
        d.to_radians()
    }
}

impl core::ops::Sub for Degrees {
    type Output = Degrees;

    fn sub(self, rhs: Degrees) -> Degrees {
        Degrees(self.0 - rhs.0)
    }
}

/// Wrap an angle in degrees into (-180, 180]
///
/// Equivalent to shifting by 360 until the value lands in range, done with
/// a single euclidean remainder so huge inputs don't loop. Non-finite input
/// maps to 0.
pub fn wrap180(deg: f32) -> f32 {
    if !deg.is_finite() {
        return 0.0;
    }
    let r = deg.rem_euclid(360.0);
    let wrapped = if r > 180.0 { r - 360.0 } else { r };
    finite_or_zero(wrapped)
}
