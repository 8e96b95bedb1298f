// src/processors/channels/info.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SspError};

/// Kind of a single recorded channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Grad,
    Mag,
    Eeg,
    Eog,
    Ecg,
    Emg,
    Stim,
    Misc,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Grad => "grad",
            ChannelType::Mag => "mag",
            ChannelType::Eeg => "eeg",
            ChannelType::Eog => "eog",
            ChannelType::Ecg => "ecg",
            ChannelType::Emg => "emg",
            ChannelType::Stim => "stim",
            ChannelType::Misc => "misc",
        }
    }

    /// Channel kinds that carry physiological signal (MEG, EEG, EOG, ECG, EMG)
    pub fn is_data(&self) -> bool {
        !matches!(self, ChannelType::Stim | ChannelType::Misc)
    }
}

impl FromStr for ChannelType {
    type Err = SspError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "grad" => Ok(ChannelType::Grad),
            "mag" => Ok(ChannelType::Mag),
            "eeg" => Ok(ChannelType::Eeg),
            "eog" => Ok(ChannelType::Eog),
            "ecg" => Ok(ChannelType::Ecg),
            "emg" => Ok(ChannelType::Emg),
            "stim" => Ok(ChannelType::Stim),
            "misc" => Ok(ChannelType::Misc),
            other => Err(SspError::InvalidChannelType(other.to_string())),
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sensor family a projection basis or sensitivity map is computed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorType {
    Grad,
    Mag,
    Eeg,
}

impl SensorType {
    /// Processing order of the three groups
    pub const ALL: [SensorType; 3] = [SensorType::Grad, SensorType::Mag, SensorType::Eeg];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Grad => "grad",
            SensorType::Mag => "mag",
            SensorType::Eeg => "eeg",
        }
    }

    /// Label used inside projection descriptors
    pub fn desc_label(&self) -> &'static str {
        match self {
            SensorType::Grad => "planar",
            SensorType::Mag => "axial",
            SensorType::Eeg => "eeg",
        }
    }

    pub fn channel_type(&self) -> ChannelType {
        match self {
            SensorType::Grad => ChannelType::Grad,
            SensorType::Mag => ChannelType::Mag,
            SensorType::Eeg => ChannelType::Eeg,
        }
    }

    /// Human readable plural used in diagnostics
    pub(crate) fn plural(&self) -> &'static str {
        match self {
            SensorType::Grad => "gradiometers",
            SensorType::Mag => "magnetometers",
            SensorType::Eeg => "EEG channels",
        }
    }
}

impl FromStr for SensorType {
    type Err = SspError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "grad" => Ok(SensorType::Grad),
            "mag" => Ok(SensorType::Mag),
            "eeg" => Ok(SensorType::Eeg),
            other => Err(SspError::InvalidSensorType(other.to_string())),
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which channels to leave out of a selection
///
/// Serialized either as a list of channel names or as the keyword `"bads"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ExcludeSpec", into = "ExcludeSpec")]
pub enum Exclude {
    /// Explicit channel names; empty means keep everything
    Channels(Vec<String>),
    /// Use the bad-channel list carried by the metadata
    Bads,
}

impl Default for Exclude {
    fn default() -> Self {
        Exclude::Channels(Vec::new())
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ExcludeSpec {
    Keyword(String),
    Channels(Vec<String>),
}

impl TryFrom<ExcludeSpec> for Exclude {
    type Error = SspError;

    fn try_from(spec: ExcludeSpec) -> Result<Self> {
        match spec {
            ExcludeSpec::Keyword(k) if k == "bads" => Ok(Exclude::Bads),
            ExcludeSpec::Keyword(k) => Err(SspError::InvalidConfig(format!(
                "exclude must be a list of channel names or 'bads' (got {})",
                k
            ))),
            ExcludeSpec::Channels(names) => Ok(Exclude::Channels(names)),
        }
    }
}

impl From<Exclude> for ExcludeSpec {
    fn from(exclude: Exclude) -> Self {
        match exclude {
            Exclude::Bads => ExcludeSpec::Keyword("bads".to_string()),
            Exclude::Channels(names) => ExcludeSpec::Channels(names),
        }
    }
}

/// Per-channel metadata for a recording or a forward model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub ch_names: Vec<String>,
    pub ch_types: Vec<ChannelType>,
    pub bads: Vec<String>,
    /// Sampling rate in Hz
    pub sfreq: f64,
}

impl ChannelInfo {
    pub fn new(
        ch_names: Vec<String>,
        ch_types: Vec<ChannelType>,
        bads: Vec<String>,
        sfreq: f64,
    ) -> Result<Self> {
        if ch_names.len() != ch_types.len() {
            return Err(SspError::ShapeMismatch {
                expected: vec![ch_names.len()],
                got: vec![ch_types.len()],
            });
        }
        Ok(Self {
            ch_names,
            ch_types,
            bads,
            sfreq,
        })
    }

    pub fn n_channels(&self) -> usize {
        self.ch_names.len()
    }

    pub fn is_bad(&self, name: &str) -> bool {
        self.bads.iter().any(|b| b == name)
    }

    fn is_excluded(&self, name: &str, exclude: &Exclude) -> bool {
        match exclude {
            Exclude::Bads => self.is_bad(name),
            Exclude::Channels(names) => names.iter().any(|n| n == name),
        }
    }

    /// Indices (in channel order) of channels whose type is in `types`,
    /// minus the excluded ones
    pub fn pick(&self, types: &[ChannelType], exclude: &Exclude) -> Vec<usize> {
        self.ch_names
            .iter()
            .zip(self.ch_types.iter())
            .enumerate()
            .filter(|(_, (name, kind))| types.contains(kind) && !self.is_excluded(name, exclude))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Metadata restricted to `indices`, bads pruned to the surviving names
    pub fn pick_info(&self, indices: &[usize]) -> ChannelInfo {
        let ch_names: Vec<String> = indices.iter().map(|&i| self.ch_names[i].clone()).collect();
        let ch_types = indices.iter().map(|&i| self.ch_types[i]).collect();
        let bads = self
            .bads
            .iter()
            .filter(|b| ch_names.contains(b))
            .cloned()
            .collect();
        ChannelInfo {
            ch_names,
            ch_types,
            bads,
            sfreq: self.sfreq,
        }
    }
}
