//! Angle newtypes for coordinate transforms.
//!
//! Projection formulas mix geographic degrees (what the data carries) with
//! radians (what the trigonometry wants). Keeping both as distinct types makes
//! a missing conversion a compile error instead of a silently wrong
//! coordinate.
//!
//! # Usage
//!
//! ```
//! use geosnap_core::units::{Degrees, Radians};
//!
//! let lat = Degrees(47.05);
//! let phi: Radians = lat.to_radians();
//! assert!((phi.to_degrees().value() - 47.05).abs() < 1e-12);
//!
//! // This would NOT compile - different units
//! // let wrong = lat + phi;
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Macro to implement common arithmetic operations for unit types
macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.6} {}", self.0, $unit_name)
            }
        }

        impl $type {
            /// Create a new value
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Get the raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }
        }
    };
}

/// Angle in radians
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Radians(pub f64);

impl_unit_ops!(Radians, "rad");

/// Angle in degrees (longitude/latitude as stored in WGS84 data)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Degrees(pub f64);

impl_unit_ops!(Degrees, "°");

impl Radians {
    #[inline]
    pub fn to_degrees(self) -> Degrees {
        Degrees(self.0.to_degrees())
    }

    #[inline]
    pub fn sin(self) -> f64 {
        self.0.sin()
    }

    #[inline]
    pub fn cos(self) -> f64 {
        self.0.cos()
    }

    #[inline]
    pub fn tan(self) -> f64 {
        self.0.tan()
    }
}

impl Degrees {
    #[inline]
    pub fn to_radians(self) -> Radians {
        Radians(self.0.to_radians())
    }

    /// Sexagesimal seconds, the unit the Swiss federal formulas are written in
    #[inline]
    pub fn to_arc_seconds(self) -> f64 {
        self.0 * 3600.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_conversion() {
        let deg = Degrees(180.0);
        let rad = deg.to_radians();

        assert!((rad.value() - std::f64::consts::PI).abs() < 1e-12);
        assert!((rad.to_degrees().value() - 180.0).abs() < 1e-12);
    }

    #[test]
    fn test_trig_functions() {
        let angle = Degrees(30.0).to_radians();

        assert!((angle.sin() - 0.5).abs() < 1e-12);
        assert!((angle.cos() - (3.0_f64).sqrt() / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_arithmetic() {
        let a = Degrees(10.0);
        let b = Degrees(2.5);
        assert_eq!((a + b).value(), 12.5);
        assert_eq!((a - b).value(), 7.5);
    }

    #[test]
    fn test_arc_seconds() {
        assert_eq!(Degrees(1.5).to_arc_seconds(), 5400.0);
    }
}
