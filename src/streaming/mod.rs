//! Raw volume storage, memory budgeting and brick/LOD planning

pub mod raw_file;
pub mod budget;
pub mod lod;

pub use raw_file::{BackingStore, LargeRawFile, RAW_EXTENSION, raw_path_for};
pub use budget::MemoryBudget;
pub use lod::{
    BrickPlan, BrickSource, brick_counts, lod_level_count, scale_transform,
    DEFAULT_BRICK_OVERLAP, DEFAULT_BRICK_SIZE, LOD_DECIMATION_FACTOR, MAX_BRICK_SIZE,
};
