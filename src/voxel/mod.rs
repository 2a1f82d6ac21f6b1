//! Voxel grid geometry and sample types

pub mod sample;
pub mod dims;

pub use sample::{Sample, SampleFormat};
pub use dims::VolumeDimensions;
