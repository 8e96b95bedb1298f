// src/processors/spatial/ssp.rs

use ndarray::{Array2, Axis};
use tracing::{info, warn};

use super::projector::{Projection, ProjectionKind};
use super::svd::left_singular_vectors;
use crate::error::{Result, SspError};
use crate::processors::channels::{ChannelGroups, ChannelInfo, ProjectionRanks};

/// Compute SSP vectors from a channel covariance matrix
///
/// For every sensor family with a non-zero rank the covariance is restricted
/// to the family's good channels and its leading left singular vectors become
/// projection vectors named `"{family}-{desc_prefix}-PCA-{k:02}"`. Output is
/// ordered grad, mag, eeg and by descending singular value within a family.
pub fn compute_proj(
    cov: &Array2<f64>,
    info: &ChannelInfo,
    ranks: ProjectionRanks,
    desc_prefix: &str,
) -> Result<Vec<Projection>> {
    let n_channels = info.n_channels();
    if cov.dim() != (n_channels, n_channels) {
        return Err(SspError::ShapeMismatch {
            expected: vec![n_channels, n_channels],
            got: vec![cov.nrows(), cov.ncols()],
        });
    }

    let groups = ChannelGroups::from_info(info);
    let ranks = ranks.clamp_to(&groups);

    let mut projs = Vec::new();
    for group in groups.iter() {
        let mut n = ranks.get(group.sensor);
        if n == 0 {
            continue;
        }

        // Principal submatrix of the group
        let data_ind = cov
            .select(Axis(0), &group.indices)
            .select(Axis(1), &group.indices);
        let (u, _) = left_singular_vectors(&data_ind)?;

        if n > u.ncols() {
            warn!(
                "Requested {} vectors for {} channels of type {}, using {}",
                n,
                group.len(),
                group.sensor,
                u.ncols()
            );
            n = u.ncols();
        }

        for (k, vector) in u.columns().into_iter().take(n).enumerate() {
            let desc = format!(
                "{}-{}-PCA-{:02}",
                group.sensor.desc_label(),
                desc_prefix,
                k + 1
            );
            info!("Adding projection: {}", desc);
            projs.push(Projection::new(
                desc,
                ProjectionKind::Field,
                group.names.clone(),
                vector.to_owned().insert_axis(Axis(0)),
            )?);
        }
    }

    Ok(projs)
}
