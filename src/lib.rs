//! volsynth - synthetic volume generator and bricked container builder

pub mod core;
pub mod voxel;
pub mod generation;
pub mod streaming;
pub mod bricking;
pub mod histogram;
pub mod container;
pub mod pipeline;
