// src/processors/sensitivity/mod.rs
pub mod forward;
pub mod map;
pub mod modes;

pub use forward::{ForwardModel, SourceOrientation, SourceSpace};
pub use map::{check_orientation, sensitivity_map, sensitivity_map_with, SensitivityMap};
pub use modes::{Formula, LocationTerms, SensitivityMode};
