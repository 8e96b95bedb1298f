// src/processors/channels/mod.rs
pub mod grouping;
pub mod info;

pub use grouping::{ChannelGroup, ChannelGroups, ProjectionRanks};
pub use info::{ChannelInfo, ChannelType, Exclude, SensorType};
