//! Printability checks on canonical triangles.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationThresholds {
    /// Shortest printable side, mm.
    pub min_side_length: f64,
    /// Smallest printable altitude over the longest side, mm.
    pub min_altitude: f64,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            min_side_length: 20.0,
            min_altitude: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationFlag {
    Ok,
    ShortSide,
    ShortAltitude,
}

impl ValidationFlag {
    pub fn is_ok(&self) -> bool {
        matches!(self, ValidationFlag::Ok)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub flag: ValidationFlag,
    /// Altitude from the longest side, mm.
    pub altitude: f64,
}

/// Altitude over side `a` of a triangle with sides `a`, `b`, `c`.
pub fn altitude_over(a: f64, b: f64, c: f64) -> f64 {
    let (a2, b2, c2) = (a * a, b * b, c * c);
    let radicand = 2.0 * a2 * b2 + 2.0 * b2 * c2 + 2.0 * a2 * c2 - a2 * a2 - b2 * b2 - c2 * c2;
    if a <= 0.0 {
        return 0.0;
    }
    radicand.max(0.0).sqrt() / (2.0 * a)
}

/// Check side lengths `[a, b, c]` with `a` the longest. Short sides take precedence over
/// a short altitude.
pub fn validate(lengths: [f64; 3], thresholds: &ValidationThresholds) -> Validation {
    let [a, b, c] = lengths;
    let altitude = altitude_over(a, b, c);

    let flag = if b < thresholds.min_side_length || c < thresholds.min_side_length {
        ValidationFlag::ShortSide
    } else if altitude < thresholds.min_altitude {
        ValidationFlag::ShortAltitude
    } else {
        ValidationFlag::Ok
    };

    Validation { flag, altitude }
}
