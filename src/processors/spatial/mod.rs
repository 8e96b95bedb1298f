// src/processors/spatial/mod.rs
pub mod covariance;
pub mod projector;
pub mod recordings;
pub mod reference;
pub mod ssp;
pub(crate) mod svd;

// Re-export covariance functions
pub use covariance::{
    check_n_samples,
    compute_covariance_segments,
    segment_outer_product,
    CovarianceAccumulator,
};

// Re-export projection construction
pub use projector::{
    Projection,
    ProjectionKind,
    Projector,
    ProjectorConstructor,
    SvdProjector,
};
pub use reference::eeg_average_ref_proj;

// Re-export SSP estimation
pub use recordings::{
    compute_proj_epochs,
    compute_proj_evoked,
    compute_proj_raw,
    Epochs,
    Evoked,
    Raw,
};
pub use ssp::compute_proj;
