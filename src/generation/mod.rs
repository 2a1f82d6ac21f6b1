//! Volume generation: procedural fields, the streaming writer and run configuration.

pub mod config;
pub mod field;
pub mod writer;

pub use config::GeneratorConfig;
pub use field::{FieldKind, MandelbulbParams, MANDELBULB_EXTENT};
pub use writer::{EtaEstimator, VolumeWriter};
