//! Core types and utilities

pub mod types;
pub mod error;
pub mod logging;
pub mod progress;

pub use types::*;
pub use error::Error;
pub use progress::{Eta, LogProgress, NullProgress, ProgressSink, RecordingProgress};
