//! Error types for volume generation and container assembly

use thiserror::Error;

/// Main error type for the generator
///
/// Every variant is fatal to the current run; nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// The backing raw store or the container could not be created/opened.
    #[error("Failed to create {path}: {reason}")]
    ResourceCreation { path: String, reason: String },

    /// Bricking or LOD subdivision failed.
    #[error("Failed to subdivide the volume into bricks: {0}")]
    GenerationIntegrity(String),

    /// Structural verification of the payload block failed.
    #[error("Verify failed with the following reason: {0}")]
    Validation(String),

    /// Histogram computation failed.
    #[error("Computation of {kind} histogram failed: {reason}")]
    DerivedData { kind: &'static str, reason: String },

    /// Appending a block or finalizing the container failed.
    #[error("Assembly error: {0}")]
    Assembly(String),

    /// Invalid run parameters.
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a `ResourceCreation` error for `path`.
    pub fn creation(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        Self::ResourceCreation {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}
