// src/lib.rs

//! Signal-space projection (SSP) estimation and forward-model sensitivity
//! maps for MEG/EEG sensor arrays.
//!
//! Two entry points:
//! - [`compute_proj`] (and the [`compute_proj_epochs`], [`compute_proj_evoked`],
//!   [`compute_proj_raw`] front-ends) turn a channel covariance into per-sensor
//!   PCA projection vectors.
//! - [`sensitivity_map`] scores how visible every source location of a
//!   forward model is to one sensor family, optionally after projection.
//!
//! With the `python` feature the same operations are exposed as the `_rs`
//! extension module.

pub mod config;
pub mod error;
pub mod processors;

#[cfg(feature = "python")]
mod python;

pub use config::{ProjectionConfig, RawProjectionConfig, SensitivityConfig};
pub use error::{Result, SspError};

// Re-export channel bookkeeping
pub use processors::channels::{
    ChannelGroup,
    ChannelGroups,
    ChannelInfo,
    ChannelType,
    Exclude,
    ProjectionRanks,
    SensorType,
};

// Re-export the covariance and SSP functions
pub use processors::spatial::{
    compute_covariance_segments,
    compute_proj,
    compute_proj_epochs,
    compute_proj_evoked,
    compute_proj_raw,
    eeg_average_ref_proj,
    CovarianceAccumulator,
    Epochs,
    Evoked,
    Projection,
    ProjectionKind,
    Projector,
    ProjectorConstructor,
    Raw,
    SvdProjector,
};

// Re-export the sensitivity map
pub use processors::sensitivity::{
    sensitivity_map,
    sensitivity_map_with,
    ForwardModel,
    SensitivityMap,
    SensitivityMode,
    SourceOrientation,
    SourceSpace,
};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python module entry point
#[cfg(feature = "python")]
#[pymodule]
fn _rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Route tracing diagnostics to stderr, honouring RUST_LOG
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();

    // covariance and SSP functions
    m.add_function(wrap_pyfunction!(python::compute_covariance_segments, m)?)?;
    m.add_function(wrap_pyfunction!(python::compute_proj_from_cov, m)?)?;
    m.add_function(wrap_pyfunction!(python::compute_proj_epochs, m)?)?;
    m.add_function(wrap_pyfunction!(python::compute_proj_evoked, m)?)?;
    m.add_function(wrap_pyfunction!(python::compute_proj_raw, m)?)?;
    m.add_function(wrap_pyfunction!(python::make_eeg_average_ref_proj, m)?)?;

    // sensitivity map
    m.add_function(wrap_pyfunction!(python::sensitivity_map, m)?)?;

    Ok(())
}
