//! Generation and container assembly pipeline

pub mod assembler;

pub use assembler::{Assembler, BuildReport, MAX_HISTOGRAM_BUCKETS};
