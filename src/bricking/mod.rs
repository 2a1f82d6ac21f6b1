//! Brick/LOD subdivision engine and the bricked volume it produces

pub mod combine;
pub mod volume;
pub mod engine;

pub use combine::{combine_average, simple_max_min, CombineFn, MaxMinFn};
pub use volume::{Brick, BrickedVolume, LodLevel};
pub use engine::{BrickingEngine, FlatFileRequest, OctreeBricker};
