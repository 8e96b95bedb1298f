// src/processors/channels/grouping.rs

use serde::{Deserialize, Serialize};
use tracing::info;

use super::info::{ChannelInfo, Exclude, SensorType};

/// Good channels of one sensor family, in recording order
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelGroup {
    pub sensor: SensorType,
    pub indices: Vec<usize>,
    pub names: Vec<String>,
}

impl ChannelGroup {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Disjoint partition of the good channels into gradiometers,
/// magnetometers and EEG
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelGroups {
    pub grad: ChannelGroup,
    pub mag: ChannelGroup,
    pub eeg: ChannelGroup,
}

impl ChannelGroups {
    pub fn from_info(info: &ChannelInfo) -> Self {
        let group = |sensor: SensorType| {
            let indices = info.pick(&[sensor.channel_type()], &Exclude::Bads);
            let names = indices.iter().map(|&i| info.ch_names[i].clone()).collect();
            ChannelGroup {
                sensor,
                indices,
                names,
            }
        };
        Self {
            grad: group(SensorType::Grad),
            mag: group(SensorType::Mag),
            eeg: group(SensorType::Eeg),
        }
    }

    pub fn get(&self, sensor: SensorType) -> &ChannelGroup {
        match sensor {
            SensorType::Grad => &self.grad,
            SensorType::Mag => &self.mag,
            SensorType::Eeg => &self.eeg,
        }
    }

    /// Groups in processing order: grad, mag, eeg
    pub fn iter(&self) -> impl Iterator<Item = &ChannelGroup> {
        SensorType::ALL.into_iter().map(move |s| self.get(s))
    }
}

/// Number of projection vectors requested per sensor family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionRanks {
    pub n_grad: usize,
    pub n_mag: usize,
    pub n_eeg: usize,
}

impl Default for ProjectionRanks {
    fn default() -> Self {
        Self {
            n_grad: 2,
            n_mag: 2,
            n_eeg: 2,
        }
    }
}

impl ProjectionRanks {
    pub fn new(n_grad: usize, n_mag: usize, n_eeg: usize) -> Self {
        Self {
            n_grad,
            n_mag,
            n_eeg,
        }
    }

    pub fn get(&self, sensor: SensorType) -> usize {
        match sensor {
            SensorType::Grad => self.n_grad,
            SensorType::Mag => self.n_mag,
            SensorType::Eeg => self.n_eeg,
        }
    }

    fn slot(&mut self, sensor: SensorType) -> &mut usize {
        match sensor {
            SensorType::Grad => &mut self.n_grad,
            SensorType::Mag => &mut self.n_mag,
            SensorType::Eeg => &mut self.n_eeg,
        }
    }

    /// Force the rank of every empty group to zero
    pub fn clamp_to(mut self, groups: &ChannelGroups) -> Self {
        for group in groups.iter() {
            let n = self.slot(group.sensor);
            if *n > 0 && group.is_empty() {
                info!(
                    "No {} found. Forcing n_{} to 0",
                    group.sensor.plural(),
                    group.sensor.as_str()
                );
                *n = 0;
            }
        }
        self
    }
}
