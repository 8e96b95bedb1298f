// src/processors/spatial/recordings.rs

use std::collections::BTreeMap;

use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use tracing::debug;

use super::covariance::{compute_covariance_segments, CovarianceAccumulator};
use super::projector::Projection;
use super::ssp::compute_proj;
use crate::config::{ProjectionConfig, RawProjectionConfig};
use crate::error::{Result, SspError};
use crate::processors::channels::{ChannelInfo, ChannelType, Exclude};

const DATA_CHANNEL_TYPES: [ChannelType; 6] = [
    ChannelType::Grad,
    ChannelType::Mag,
    ChannelType::Eeg,
    ChannelType::Eog,
    ChannelType::Ecg,
    ChannelType::Emg,
];

fn check_rows(data: &Array2<f64>, info: &ChannelInfo) -> Result<()> {
    if data.nrows() != info.n_channels() {
        return Err(SspError::ShapeMismatch {
            expected: vec![info.n_channels(), data.ncols()],
            got: vec![data.nrows(), data.ncols()],
        });
    }
    Ok(())
}

/// Equal-length windows cut around events, each (channels × samples)
#[derive(Debug, Clone)]
pub struct Epochs {
    pub data: Vec<Array2<f64>>,
    pub info: ChannelInfo,
    /// Window start relative to the event, in seconds
    pub tmin: f64,
    /// Window end relative to the event, in seconds
    pub tmax: f64,
    pub event_id: BTreeMap<String, i32>,
}

impl Epochs {
    pub fn new(
        data: Vec<Array2<f64>>,
        info: ChannelInfo,
        tmin: f64,
        tmax: f64,
        event_id: BTreeMap<String, i32>,
    ) -> Result<Self> {
        for epoch in &data {
            check_rows(epoch, &info)?;
        }
        Ok(Self {
            data,
            info,
            tmin,
            tmax,
            event_id,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn event_label(&self) -> String {
        let mut codes = self.event_id.values();
        match (codes.next(), codes.next()) {
            (None, _) => "0".to_string(),
            (Some(code), None) => code.to_string(),
            _ => "Multiple-events".to_string(),
        }
    }

    /// "{event}-{tmin}-{tmax}" with times to the millisecond
    pub fn desc_prefix(&self) -> String {
        format!("{}-{:.3}-{:.3}", self.event_label(), self.tmin, self.tmax)
    }
}

/// Average over epochs, (channels × samples) with one time per sample
#[derive(Debug, Clone)]
pub struct Evoked {
    pub data: Array2<f64>,
    pub info: ChannelInfo,
    pub times: Array1<f64>,
}

impl Evoked {
    pub fn new(data: Array2<f64>, info: ChannelInfo, times: Array1<f64>) -> Result<Self> {
        check_rows(&data, &info)?;
        if times.len() != data.ncols() {
            return Err(SspError::ShapeMismatch {
                expected: vec![data.ncols()],
                got: vec![times.len()],
            });
        }
        Ok(Self { data, info, times })
    }

    pub fn desc_prefix(&self) -> String {
        let first = self.times.first().copied().unwrap_or(0.0);
        let last = self.times.last().copied().unwrap_or(0.0);
        format!("{:.3}-{:.3}", first, last)
    }
}

/// Continuous recording starting at time zero, (channels × samples)
#[derive(Debug, Clone)]
pub struct Raw {
    pub data: Array2<f64>,
    pub info: ChannelInfo,
}

impl Raw {
    pub fn new(data: Array2<f64>, info: ChannelInfo) -> Result<Self> {
        check_rows(&data, &info)?;
        if !(info.sfreq > 0.0) {
            return Err(SspError::InvalidConfig(format!(
                "sampling rate must be positive (got {})",
                info.sfreq
            )));
        }
        Ok(Self { data, info })
    }

    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    /// Sample index of time `t` (seconds), clipped to the recording
    pub fn time_as_index(&self, t: f64) -> usize {
        let idx = (t * self.info.sfreq).round().max(0.0) as usize;
        idx.min(self.n_times())
    }
}

/// Compute SSP vectors on epochs
///
/// The covariance is accumulated over all epochs with `config.n_jobs`
/// workers before the per-type SVD.
pub fn compute_proj_epochs(epochs: &Epochs, config: &ProjectionConfig) -> Result<Vec<Projection>> {
    let segments: Vec<ArrayView2<'_, f64>> = epochs.data.iter().map(|e| e.view()).collect();
    let cov = compute_covariance_segments(&segments, config.n_jobs)?;
    compute_proj(&cov, &epochs.info, config.ranks(), &epochs.desc_prefix())
}

/// Compute SSP vectors on an evoked (averaged) response
pub fn compute_proj_evoked(evoked: &Evoked, config: &ProjectionConfig) -> Result<Vec<Projection>> {
    let mut accumulator = CovarianceAccumulator::new(evoked.info.n_channels());
    accumulator.add_segment(evoked.data.view())?;
    let cov = accumulator.finish()?;
    compute_proj(&cov, &evoked.info, config.ranks(), &evoked.desc_prefix())
}

/// First channel of `segment` whose peak-to-peak amplitude breaks the
/// `reject` / `flat` threshold of its type, with that amplitude
fn find_bad_channel(
    segment: &ArrayView2<'_, f64>,
    info: &ChannelInfo,
    config: &RawProjectionConfig,
) -> Option<(usize, f64)> {
    segment
        .outer_iter()
        .zip(info.ch_types.iter())
        .enumerate()
        .find_map(|(idx, (row, kind))| {
            let max = row.fold(f64::NEG_INFINITY, |acc, &x| acc.max(x));
            let min = row.fold(f64::INFINITY, |acc, &x| acc.min(x));
            let ptp = max - min;
            let too_large = config.reject.get(kind).is_some_and(|&t| ptp > t);
            let too_flat = config.flat.get(kind).is_some_and(|&t| ptp < t);
            (too_large || too_flat).then_some((idx, ptp))
        })
}

/// Compute SSP vectors on a continuous recording
///
/// With a `duration` the span is cut into consecutive windows of
/// `duration` seconds (inclusive of the end sample) over the good data
/// channels, and windows breaking a `reject` / `flat` peak-to-peak
/// threshold are dropped. Without one the whole span is a single segment
/// over every channel.
pub fn compute_proj_raw(raw: &Raw, config: &RawProjectionConfig) -> Result<Vec<Projection>> {
    config.validate()?;
    let sfreq = raw.info.sfreq;
    let start = raw.time_as_index(config.start);
    let stop = config
        .stop
        .map_or(raw.n_times(), |t| raw.time_as_index(t));
    if stop <= start {
        return Err(SspError::NoUsableData);
    }

    let projection = &config.projection;
    match config.duration {
        Some(duration) => {
            // a window is step + 1 samples and has to fit in the span
            let step = (duration * sfreq).round();
            if !(step < (stop - start) as f64) {
                return Err(SspError::NoUsableData);
            }
            let step = (step as usize).max(1);
            let window = step + 1;

            let picks = raw.info.pick(&DATA_CHANNEL_TYPES, &Exclude::Bads);
            if picks.is_empty() {
                return Err(SspError::NoChannels("SSP on raw data".to_string()));
            }
            let info = raw.info.pick_info(&picks);
            let data = raw.data.select(Axis(0), &picks);

            let segments: Vec<ArrayView2<'_, f64>> = (start..)
                .step_by(step)
                .take_while(|&onset| onset + window <= stop)
                .map(|onset| (onset, data.slice(s![.., onset..onset + window])))
                .filter(|(onset, segment)| match find_bad_channel(segment, &info, config) {
                    Some((idx, ptp)) => {
                        debug!(
                            onset,
                            channel = %info.ch_names[idx],
                            ptp,
                            "rejected raw window"
                        );
                        false
                    }
                    None => true,
                })
                .map(|(_, segment)| segment)
                .collect();
            debug!(
                n_windows = segments.len(),
                window,
                n_channels = info.n_channels(),
                "cut raw data into windows"
            );

            let cov = compute_covariance_segments(&segments, projection.n_jobs)?;
            let stop_time = config.stop.unwrap_or(raw.n_times() as f64 / sfreq);
            let desc_prefix = format!("Raw-{:.3}-{:.3}", config.start, stop_time);
            compute_proj(&cov, &info, projection.ranks(), &desc_prefix)
        }
        None => {
            let mut accumulator = CovarianceAccumulator::new(raw.info.n_channels());
            accumulator.add_segment(raw.data.slice(s![.., start..stop]))?;
            let cov = accumulator.finish()?;
            let desc_prefix = format!(
                "Raw-{:.3}-{:.3}",
                start as f64 / sfreq,
                stop as f64 / sfreq
            );
            compute_proj(&cov, &raw.info, projection.ranks(), &desc_prefix)
        }
    }
}
