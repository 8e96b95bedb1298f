// src/processors/sensitivity/modes.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SspError};

/// Per-location quantities a sensitivity formula may read
///
/// Fields a mode does not need are left as NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationTerms {
    /// Largest singular value of the 3-column location gain
    pub s_max: f64,
    /// Norm of the surface-normal gain column
    pub gz: f64,
    /// Norm of the normal column expressed in the removed basis `U`
    pub removed: f64,
    /// Norm of the normal column after applying the projector `P`
    pub remaining: f64,
}

/// Metric reported per source location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityMode {
    Free = 0,
    Fixed = 1,
    Ratio = 2,
    Radiality = 3,
    Angle = 4,
    Remaining = 5,
    Dampening = 6,
}

/// Closed-form metric over one location
pub type Formula = fn(&LocationTerms) -> f64;

fn free(t: &LocationTerms) -> f64 {
    t.s_max
}

fn fixed(t: &LocationTerms) -> f64 {
    t.gz
}

fn ratio(t: &LocationTerms) -> f64 {
    t.gz / t.s_max
}

fn radiality(t: &LocationTerms) -> f64 {
    1.0 - ratio(t)
}

fn angle(t: &LocationTerms) -> f64 {
    t.removed / t.gz
}

fn remaining(t: &LocationTerms) -> f64 {
    t.remaining / t.gz
}

fn dampening(t: &LocationTerms) -> f64 {
    1.0 - remaining(t)
}

/// Indexed by the mode discriminant
const FORMULAS: [Formula; 7] = [free, fixed, ratio, radiality, angle, remaining, dampening];

impl SensitivityMode {
    pub const ALL: [SensitivityMode; 7] = [
        SensitivityMode::Free,
        SensitivityMode::Fixed,
        SensitivityMode::Ratio,
        SensitivityMode::Radiality,
        SensitivityMode::Angle,
        SensitivityMode::Remaining,
        SensitivityMode::Dampening,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensitivityMode::Free => "free",
            SensitivityMode::Fixed => "fixed",
            SensitivityMode::Ratio => "ratio",
            SensitivityMode::Radiality => "radiality",
            SensitivityMode::Angle => "angle",
            SensitivityMode::Remaining => "remaining",
            SensitivityMode::Dampening => "dampening",
        }
    }

    /// Modes that describe what a projector removes; they need one
    pub fn requires_projector(&self) -> bool {
        matches!(
            self,
            SensitivityMode::Angle | SensitivityMode::Remaining | SensitivityMode::Dampening
        )
    }

    /// Whether the gain is projected before the per-location analysis
    pub fn projects_gain(&self) -> bool {
        !self.requires_projector()
    }

    pub fn needs_singular_values(&self) -> bool {
        matches!(
            self,
            SensitivityMode::Free | SensitivityMode::Ratio | SensitivityMode::Radiality
        )
    }

    /// Maps of these modes are rescaled to a maximum of 1
    pub fn is_normalized(&self) -> bool {
        matches!(self, SensitivityMode::Free | SensitivityMode::Fixed)
    }

    pub fn formula(&self) -> Formula {
        FORMULAS[*self as usize]
    }

    pub fn evaluate(&self, terms: &LocationTerms) -> f64 {
        (self.formula())(terms)
    }
}

impl FromStr for SensitivityMode {
    type Err = SspError;

    fn from_str(s: &str) -> Result<Self> {
        SensitivityMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| SspError::InvalidMode(s.to_string()))
    }
}

impl fmt::Display for SensitivityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
