// src/error.rs

//! Error types shared by every processor in the crate.
//!
//! ```text
//! SspError
//! ├── configuration   (bad sensor type / mode, unusable forward model, missing projector)
//! ├── insufficient    (no segments, too few samples, no channels left)
//! └── structural      (shape mismatches, linear algebra and thread pool failures)
//! ```

use ndarray_linalg::error::LinalgError;
use thiserror::Error;

/// Convenient `Result` alias used across the crate.
pub type Result<T> = std::result::Result<T, SspError>;

#[derive(Debug, Error)]
pub enum SspError {
    /// Sensor type string is not one of `grad`, `mag` or `eeg`.
    #[error("ch_type should be 'eeg', 'mag' or 'grad' (got {0})")]
    InvalidSensorType(String),

    /// Channel type string is not a known channel kind.
    #[error("Unknown channel type (got {0})")]
    InvalidChannelType(String),

    /// Sensitivity mode string is not one of the seven supported modes.
    #[error("Unknown mode type (got {0})")]
    InvalidMode(String),

    #[error("fwd should be surface oriented")]
    NotSurfaceOriented,

    #[error("fwd should not have fixed orientation")]
    FixedOrientation,

    /// Mode needs a projector but none was supplied.
    #[error("No projectors used, cannot compute {mode}")]
    MissingProjector { mode: String },

    /// A config struct failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No usable data: no good epochs or segments found")]
    NoUsableData,

    /// Total sample count does not exceed the channel count.
    #[error("Too few samples to compute the covariance (got {n_samples}, need more than {n_channels})")]
    TooFewSamples { n_samples: usize, n_channels: usize },

    /// No channel survived a type / exclusion selection.
    #[error("No valid channels found for {0}")]
    NoChannels(String),

    /// Two arrays that must agree in shape do not.
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },

    /// Projection vector length differs from its channel-name list.
    #[error("Projection '{desc}' has {ncol} columns but {n_names} channel names")]
    ProjectionSize {
        desc: String,
        ncol: usize,
        n_names: usize,
    },

    /// Forward gain matrix does not match its channel or source description.
    #[error("Forward model is inconsistent: {0}")]
    ForwardShape(String),

    /// LAPACK returned no singular vectors although they were requested.
    #[error("SVD did not return the requested singular vectors")]
    MissingSingularVectors,

    #[error("Linear algebra failure: {0}")]
    Linalg(#[from] LinalgError),

    #[error("Could not build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl SspError {
    /// Errors raised before any numerical work, caused by caller configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SspError::InvalidSensorType(_)
                | SspError::InvalidChannelType(_)
                | SspError::InvalidMode(_)
                | SspError::NotSurfaceOriented
                | SspError::FixedOrientation
                | SspError::MissingProjector { .. }
                | SspError::InvalidConfig(_)
        )
    }

    /// Errors caused by there not being enough data to estimate anything.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(
            self,
            SspError::NoUsableData | SspError::TooFewSamples { .. } | SspError::NoChannels(_)
        )
    }
}
