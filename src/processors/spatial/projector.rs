// src/processors/spatial/projector.rs

use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::reference::eeg_average_ref_proj;
use super::svd::left_singular_vectors;
use crate::error::{Result, SspError};
use crate::processors::channels::ChannelInfo;

/// Components with a relative singular value below this are dropped
const PROJECTOR_RANK_TOL: f64 = 1e-2;

/// Origin of a projection vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionKind {
    /// Field pattern, e.g. a PCA component of artifact data
    Field,
    /// EEG average reference
    EegAverageReference,
}

impl ProjectionKind {
    /// FIFF code of the projection item kind
    pub fn code(&self) -> i32 {
        match self {
            ProjectionKind::Field => 1,
            ProjectionKind::EegAverageReference => 10,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(ProjectionKind::Field),
            10 => Some(ProjectionKind::EegAverageReference),
            _ => None,
        }
    }
}

/// Signal-space projection record over a named channel subset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub desc: String,
    pub kind: ProjectionKind,
    /// Whether the projection is currently applied to the data
    pub active: bool,
    pub col_names: Vec<String>,
    /// nrow × ncol, one projection vector per row
    pub data: Array2<f64>,
}

impl Projection {
    /// Build an inactive projection, checking the vector width against the names
    pub fn new(
        desc: impl Into<String>,
        kind: ProjectionKind,
        col_names: Vec<String>,
        data: Array2<f64>,
    ) -> Result<Self> {
        let proj = Self {
            desc: desc.into(),
            kind,
            active: false,
            col_names,
            data,
        };
        proj.check()?;
        Ok(proj)
    }

    pub fn nrow(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncol(&self) -> usize {
        self.data.ncols()
    }

    pub fn check(&self) -> Result<()> {
        if self.ncol() != self.col_names.len() {
            return Err(SspError::ProjectionSize {
                desc: self.desc.clone(),
                ncol: self.ncol(),
                n_names: self.col_names.len(),
            });
        }
        Ok(())
    }
}

/// Projection operator `P = I − U·Uᵗ` together with the removed basis `U`
#[derive(Debug, Clone, PartialEq)]
pub struct Projector {
    /// n_channels × n_channels, idempotent
    pub matrix: Array2<f64>,
    /// Number of removed components, equal to `basis.ncols()`
    pub ncomp: usize,
    /// n_channels × ncomp orthonormal basis of the removed subspace
    pub basis: Array2<f64>,
}

impl Projector {
    pub fn identity(n_channels: usize) -> Self {
        Self {
            matrix: Array2::eye(n_channels),
            ncomp: 0,
            basis: Array2::zeros((n_channels, 0)),
        }
    }

    fn from_basis(basis: Array2<f64>) -> Self {
        let n_channels = basis.nrows();
        let matrix = Array2::<f64>::eye(n_channels) - basis.dot(&basis.t());
        Self {
            matrix,
            ncomp: basis.ncols(),
            basis,
        }
    }
}

/// Builds projectors out of projection records
pub trait ProjectorConstructor {
    /// Projector over `ch_names` removing every selected vector.
    ///
    /// Active vectors are only used when `include_active` is set.
    fn make_projector(
        &self,
        projs: &[Projection],
        ch_names: &[String],
        include_active: bool,
    ) -> Result<Projector>;

    /// Average-reference projection over the good EEG channels of `info`
    fn make_eeg_average_ref_proj(&self, info: &ChannelInfo) -> Result<Projection>;
}

/// Default constructor: orthonormalize the stacked vectors with an SVD
#[derive(Debug, Clone, Copy, Default)]
pub struct SvdProjector;

impl ProjectorConstructor for SvdProjector {
    fn make_projector(
        &self,
        projs: &[Projection],
        ch_names: &[String],
        include_active: bool,
    ) -> Result<Projector> {
        let n_channels = ch_names.len();
        let selected: Vec<&Projection> = projs
            .iter()
            .filter(|p| !p.active || include_active)
            .collect();
        let n_vec: usize = selected.iter().map(|p| p.nrow()).sum();
        if n_vec == 0 {
            return Ok(Projector::identity(n_channels));
        }

        // Scatter every vector onto the requested channel ordering
        let mut vecs = Array2::<f64>::zeros((n_channels, n_vec));
        let mut col = 0;
        let mut nonzero = 0;
        for proj in selected {
            proj.check()?;
            let pairs: Vec<(usize, usize)> = ch_names
                .iter()
                .enumerate()
                .filter_map(|(ci, name)| {
                    proj.col_names
                        .iter()
                        .position(|c| c == name)
                        .map(|pi| (ci, pi))
                })
                .collect();
            if pairs.is_empty() {
                continue;
            }

            for row in proj.data.rows() {
                for &(ci, pi) in &pairs {
                    vecs[[ci, col]] = row[pi];
                }
                // Rescale for better detection of small singular values
                let norm = vecs.column(col).dot(&vecs.column(col)).sqrt();
                if norm > 0.0 {
                    vecs.column_mut(col).mapv_inplace(|x| x / norm);
                    nonzero += 1;
                }
                col += 1;
            }
        }
        if nonzero == 0 {
            return Ok(Projector::identity(n_channels));
        }

        let (u, sigma) = left_singular_vectors(&vecs.slice(s![.., ..col]))?;
        let s_max = sigma[0];
        let ncomp = sigma.iter().filter(|&&v| v / s_max > PROJECTOR_RANK_TOL).count();
        debug!(n_vectors = col, ncomp, n_channels, "built projector");

        Ok(Projector::from_basis(u.slice(s![.., ..ncomp]).to_owned()))
    }

    fn make_eeg_average_ref_proj(&self, info: &ChannelInfo) -> Result<Projection> {
        eeg_average_ref_proj(info)
    }
}
