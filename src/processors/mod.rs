// src/processors/mod.rs
pub mod channels;
pub mod sensitivity;
pub mod spatial;
