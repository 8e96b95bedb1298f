// src/config.rs

//! Serde-backed parameter sets for the two public entry points.
//!
//! Every struct deserializes with missing fields filled from `Default`, so a
//! caller can load a partial JSON/TOML document and only override what it
//! needs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SspError};
use crate::processors::channels::{ChannelType, Exclude, ProjectionRanks, SensorType};
use crate::processors::sensitivity::SensitivityMode;

/// Ranks and worker count for SSP estimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Number of vectors for gradiometers
    pub n_grad: usize,
    /// Number of vectors for magnetometers
    pub n_mag: usize,
    /// Number of vectors for EEG channels
    pub n_eeg: usize,
    /// Workers for the covariance step (1 = sequential, 0 = all cores)
    pub n_jobs: usize,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            n_grad: 2,
            n_mag: 2,
            n_eeg: 2,
            n_jobs: 1,
        }
    }
}

impl ProjectionConfig {
    pub fn ranks(&self) -> ProjectionRanks {
        ProjectionRanks::new(self.n_grad, self.n_mag, self.n_eeg)
    }
}

/// Span and chunking of a continuous recording used for SSP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawProjectionConfig {
    /// Time (in sec) to start computing SSP
    pub start: f64,
    /// Time (in sec) to stop computing SSP, `None` runs to the end
    pub stop: Option<f64>,
    /// Length (in sec) of the chunks the data is cut into, `None` keeps one block
    pub duration: Option<f64>,
    /// Peak-to-peak amplitude above which a chunk is dropped, per channel type
    pub reject: BTreeMap<ChannelType, f64>,
    /// Peak-to-peak amplitude below which a chunk is dropped, per channel type
    pub flat: BTreeMap<ChannelType, f64>,
    pub projection: ProjectionConfig,
}

impl Default for RawProjectionConfig {
    fn default() -> Self {
        Self {
            start: 0.0,
            stop: None,
            duration: Some(1.0),
            reject: BTreeMap::new(),
            flat: BTreeMap::new(),
            projection: ProjectionConfig {
                n_eeg: 0,
                ..ProjectionConfig::default()
            },
        }
    }
}

impl RawProjectionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.start.is_finite() && self.start >= 0.0) {
            return Err(SspError::InvalidConfig(format!(
                "start must be finite and non-negative (got {})",
                self.start
            )));
        }
        if let Some(stop) = self.stop {
            if !(stop.is_finite() && stop > self.start) {
                return Err(SspError::InvalidConfig(format!(
                    "stop ({}) must be finite and after start ({})",
                    stop, self.start
                )));
            }
        }
        if let Some(duration) = self.duration {
            if !(duration.is_finite() && duration > 0.0) {
                return Err(SspError::InvalidConfig(format!(
                    "duration must be finite and positive (got {})",
                    duration
                )));
            }
        }
        for (name, thresholds) in [("reject", &self.reject), ("flat", &self.flat)] {
            if let Some((kind, value)) = thresholds.iter().find(|(_, v)| !(**v >= 0.0)) {
                return Err(SspError::InvalidConfig(format!(
                    "{} threshold for {} must be non-negative (got {})",
                    name, kind, value
                )));
            }
        }
        Ok(())
    }

    /// Whether any peak-to-peak threshold is set
    pub fn rejects_windows(&self) -> bool {
        !(self.reject.is_empty() && self.flat.is_empty())
    }
}

/// Sensor family, metric and channel exclusion for a sensitivity map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityConfig {
    pub ch_type: SensorType,
    pub mode: SensitivityMode,
    pub exclude: Exclude,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            ch_type: SensorType::Grad,
            mode: SensitivityMode::Fixed,
            exclude: Exclude::default(),
        }
    }
}

impl SensitivityConfig {
    pub fn new(ch_type: SensorType, mode: SensitivityMode) -> Self {
        Self {
            ch_type,
            mode,
            exclude: Exclude::default(),
        }
    }

    /// Build from the string forms used at language boundaries
    pub fn parse(ch_type: &str, mode: &str, exclude: Exclude) -> Result<Self> {
        Ok(Self {
            ch_type: ch_type.parse()?,
            mode: mode.parse()?,
            exclude,
        })
    }

    pub fn with_exclude(mut self, exclude: Exclude) -> Self {
        self.exclude = exclude;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_projection_config() {
        let config: ProjectionConfig = serde_json::from_str(r#"{"n_grad": 3, "n_jobs": 4}"#).unwrap();
        assert_eq!(config.ranks(), ProjectionRanks::new(3, 2, 2));
        assert_eq!(config.n_jobs, 4);
    }

    #[test]
    fn test_raw_defaults_skip_eeg() {
        let config: RawProjectionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.projection.n_eeg, 0);
        assert_eq!(config.duration, Some(1.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_raw_validation() {
        let config = RawProjectionConfig {
            start: 2.0,
            stop: Some(1.0),
            ..RawProjectionConfig::default()
        };
        assert!(config.validate().unwrap_err().is_configuration());

        let config = RawProjectionConfig {
            duration: Some(0.0),
            ..RawProjectionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_raw_validation_rejects_non_finite_times() {
        for config in [
            RawProjectionConfig {
                duration: Some(f64::INFINITY),
                ..RawProjectionConfig::default()
            },
            RawProjectionConfig {
                start: f64::NAN,
                ..RawProjectionConfig::default()
            },
            RawProjectionConfig {
                stop: Some(f64::INFINITY),
                ..RawProjectionConfig::default()
            },
        ] {
            assert!(matches!(config.validate(), Err(SspError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_raw_thresholds_from_json() {
        let config: RawProjectionConfig =
            serde_json::from_str(r#"{"reject": {"grad": 4e-10}, "flat": {"eeg": 1e-6}}"#).unwrap();
        assert_eq!(config.reject.get(&ChannelType::Grad), Some(&4e-10));
        assert_eq!(config.flat.get(&ChannelType::Eeg), Some(&1e-6));
        assert!(config.rejects_windows());
        assert!(config.validate().is_ok());

        let mut config = RawProjectionConfig::default();
        assert!(!config.rejects_windows());
        config.reject.insert(ChannelType::Mag, -1.0);
        assert!(config.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn test_sensitivity_config_from_json() {
        let config: SensitivityConfig =
            serde_json::from_str(r#"{"ch_type": "eeg", "mode": "dampening", "exclude": "bads"}"#)
                .unwrap();
        assert_eq!(config.ch_type, SensorType::Eeg);
        assert_eq!(config.mode, SensitivityMode::Dampening);
        assert_eq!(config.exclude, Exclude::Bads);

        assert!(serde_json::from_str::<SensitivityConfig>(r#"{"mode": "loudness"}"#).is_err());
    }

    #[test]
    fn test_sensitivity_config_parse_errors() {
        let err = SensitivityConfig::parse("meg", "fixed", Exclude::default()).unwrap_err();
        assert!(matches!(err, SspError::InvalidSensorType(_)));
        let err = SensitivityConfig::parse("grad", "louder", Exclude::default()).unwrap_err();
        assert!(matches!(err, SspError::InvalidMode(_)));
    }
}
