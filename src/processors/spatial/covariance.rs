// src/processors/spatial/covariance.rs

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{Result, SspError};

/// Running sum of per-segment outer products `X · Xᵗ`
///
/// Contributions commute, so partial accumulators built from disjoint
/// segments can be merged in any order.
#[derive(Debug, Clone)]
pub struct CovarianceAccumulator {
    data: Array2<f64>,
    n_samples: usize,
    n_segments: usize,
}

impl CovarianceAccumulator {
    pub fn new(n_channels: usize) -> Self {
        Self {
            data: Array2::zeros((n_channels, n_channels)),
            n_samples: 0,
            n_segments: 0,
        }
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn n_segments(&self) -> usize {
        self.n_segments
    }

    /// Add one (channels × samples) segment
    pub fn add_segment(&mut self, segment: ArrayView2<'_, f64>) -> Result<()> {
        self.check_channels(segment.nrows())?;
        let contribution = segment_outer_product(segment);
        self.add_contribution(&contribution, segment.ncols());
        Ok(())
    }

    /// Fold another accumulator over the same channels into this one
    pub fn merge(&mut self, other: CovarianceAccumulator) -> Result<()> {
        self.check_channels(other.n_channels())?;
        self.data += &other.data;
        self.n_samples += other.n_samples;
        self.n_segments += other.n_segments;
        Ok(())
    }

    fn add_contribution(&mut self, contribution: &Array2<f64>, n_samples: usize) {
        self.data += contribution;
        self.n_samples += n_samples;
        self.n_segments += 1;
    }

    fn check_channels(&self, n_channels: usize) -> Result<()> {
        if n_channels != self.n_channels() {
            return Err(SspError::ShapeMismatch {
                expected: vec![self.n_channels()],
                got: vec![n_channels],
            });
        }
        Ok(())
    }

    /// Validate the sample budget and hand out the summed matrix
    pub fn finish(self) -> Result<Array2<f64>> {
        if self.n_segments == 0 {
            return Err(SspError::NoUsableData);
        }
        check_n_samples(self.n_samples, self.n_channels())?;
        debug!(
            n_segments = self.n_segments,
            n_samples = self.n_samples,
            n_channels = self.n_channels(),
            "accumulated covariance"
        );
        Ok(self.data)
    }
}

/// Reject sample counts that cannot give a full-rank covariance and warn
/// when the estimate is likely to be noisy
pub fn check_n_samples(n_samples: usize, n_channels: usize) -> Result<()> {
    if n_samples <= n_channels {
        return Err(SspError::TooFewSamples {
            n_samples,
            n_channels,
        });
    }
    let n_samples_min = 10 * (n_channels + 1) / 2;
    if n_samples < n_samples_min {
        warn!(
            "Too few samples (required : {} got : {}), covariance estimate may be unreliable",
            n_samples_min, n_samples
        );
    }
    Ok(())
}

/// Outer product of one segment with itself
///
/// cov = X @ X.T (not normalized by the number of samples)
pub fn segment_outer_product(segment: ArrayView2<'_, f64>) -> Array2<f64> {
    segment.dot(&segment.t())
}

/// Sum the covariance contributions of all segments
///
/// `n_jobs == 1` computes sequentially, `n_jobs == 0` uses the global rayon
/// pool and any other value runs on a dedicated pool of that size. The
/// reduction always happens in segment order.
pub fn compute_covariance_segments(
    segments: &[ArrayView2<'_, f64>],
    n_jobs: usize,
) -> Result<Array2<f64>> {
    let first = segments.first().ok_or(SspError::NoUsableData)?;
    let n_channels = first.nrows();

    // A single mismatched segment invalidates the whole sum
    if let Some(bad) = segments.iter().find(|s| s.nrows() != n_channels) {
        return Err(SspError::ShapeMismatch {
            expected: vec![n_channels, bad.ncols()],
            got: vec![bad.nrows(), bad.ncols()],
        });
    }

    let contributions: Vec<Array2<f64>> = match n_jobs {
        1 => segments
            .iter()
            .map(|s| segment_outer_product(s.view()))
            .collect(),
        0 => segments
            .par_iter()
            .map(|s| segment_outer_product(s.view()))
            .collect(),
        n => {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
            pool.install(|| {
                segments
                    .par_iter()
                    .map(|s| segment_outer_product(s.view()))
                    .collect()
            })
        }
    };

    // Combine results
    let mut accumulator = CovarianceAccumulator::new(n_channels);
    for (segment, contribution) in segments.iter().zip(contributions.iter()) {
        accumulator.add_contribution(contribution, segment.ncols());
    }
    accumulator.finish()
}
