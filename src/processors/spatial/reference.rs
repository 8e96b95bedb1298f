// src/processors/spatial/reference.rs

use ndarray::Array2;

use super::projector::{Projection, ProjectionKind};
use crate::error::{Result, SspError};
use crate::processors::channels::{ChannelInfo, ChannelType, Exclude};

/// Average EEG reference as a projection vector
///
/// Applying the resulting projector subtracts the mean across good EEG
/// channels from every EEG channel at each time point.
pub fn eeg_average_ref_proj(info: &ChannelInfo) -> Result<Projection> {
    let eeg_ind = info.pick(&[ChannelType::Eeg], &Exclude::Bads);
    let n_eeg = eeg_ind.len();
    if n_eeg == 0 {
        return Err(SspError::NoChannels(
            "EEG average reference (no good EEG channels)".to_string(),
        ));
    }

    let col_names = eeg_ind.iter().map(|&i| info.ch_names[i].clone()).collect();
    let vec = Array2::from_elem((1, n_eeg), 1.0 / (n_eeg as f64).sqrt());

    Projection::new(
        "Average EEG reference",
        ProjectionKind::EegAverageReference,
        col_names,
        vec,
    )
}
