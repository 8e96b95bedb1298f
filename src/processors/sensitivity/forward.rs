// src/processors/sensitivity/forward.rs

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SspError};
use crate::processors::channels::{ChannelInfo, Exclude, SensorType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceOrientation {
    /// Three orthogonal dipole components per location
    Free,
    /// One dipole component per location
    Fixed,
}

/// Source locations of one hemisphere (or other partition)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceSpace {
    pub vertno: Vec<usize>,
}

impl SourceSpace {
    pub fn new(vertno: Vec<usize>) -> Self {
        Self { vertno }
    }

    pub fn n_sources(&self) -> usize {
        self.vertno.len()
    }
}

/// Gain matrix from dipole sources to sensors plus its bookkeeping
///
/// `gain` is (channels × components); for free orientation the columns of
/// location `k` are `3k, 3k + 1, 3k + 2`, the last one along the surface
/// normal when `surf_ori` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardModel {
    pub gain: Array2<f64>,
    pub info: ChannelInfo,
    pub surf_ori: bool,
    pub source_ori: SourceOrientation,
    pub src: Vec<SourceSpace>,
    pub subject: Option<String>,
}

impl ForwardModel {
    pub fn new(
        gain: Array2<f64>,
        info: ChannelInfo,
        surf_ori: bool,
        source_ori: SourceOrientation,
        src: Vec<SourceSpace>,
        subject: Option<String>,
    ) -> Result<Self> {
        if gain.nrows() != info.n_channels() {
            return Err(SspError::ForwardShape(format!(
                "gain has {} rows but {} channels are described",
                gain.nrows(),
                info.n_channels()
            )));
        }
        let n_sources: usize = src.iter().map(SourceSpace::n_sources).sum();
        let per_source = match source_ori {
            SourceOrientation::Free => 3,
            SourceOrientation::Fixed => 1,
        };
        if gain.ncols() != per_source * n_sources {
            return Err(SspError::ForwardShape(format!(
                "gain has {} columns for {} sources with {:?} orientation",
                gain.ncols(),
                n_sources,
                source_ori
            )));
        }
        Ok(Self {
            gain,
            info,
            surf_ori,
            source_ori,
            src,
            subject,
        })
    }

    pub fn is_fixed_orient(&self) -> bool {
        self.source_ori == SourceOrientation::Fixed
    }

    pub fn n_sources(&self) -> usize {
        self.src.iter().map(SourceSpace::n_sources).sum()
    }

    /// Channel names labelling the gain rows
    pub fn row_names(&self) -> &[String] {
        &self.info.ch_names
    }

    pub fn vertices(&self) -> Vec<Vec<usize>> {
        self.src.iter().map(|s| s.vertno.clone()).collect()
    }

    /// Forward restricted to the channels of one sensor family
    pub fn pick_channels(&self, sensor: SensorType, exclude: &Exclude) -> Result<ForwardModel> {
        let sel = self.info.pick(&[sensor.channel_type()], exclude);
        if sel.is_empty() {
            return Err(SspError::NoChannels(format!("{} in forward model", sensor)));
        }
        Ok(ForwardModel {
            gain: self.gain.select(Axis(0), &sel),
            info: self.info.pick_info(&sel),
            surf_ori: self.surf_ori,
            source_ori: self.source_ori,
            src: self.src.clone(),
            subject: self.subject.clone(),
        })
    }
}
