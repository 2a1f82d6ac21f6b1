//! Run configuration for the generator.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::streaming::{DEFAULT_BRICK_OVERLAP, DEFAULT_BRICK_SIZE, MAX_BRICK_SIZE};
use crate::streaming::budget::DEFAULT_BUDGET_BYTES;
use crate::voxel::{SampleFormat, VolumeDimensions};
use super::field::{FieldKind, MandelbulbParams};

/// Every parameter of one generation run.
///
/// Loaded from JSON with [`GeneratorConfig::from_json_file`] and then
/// overridden by command line flags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Container (`.uvf`) or raw output path.
    pub output: PathBuf,
    /// Voxel counts along x, y and z.
    pub dims: [u64; 3],
    /// Sample bit width, 8 or 16.
    pub bit_width: u32,
    /// Generate the Mandelbulb instead of the radial falloff field.
    pub mandelbulb: bool,
    /// Mandelbulb iteration parameters.
    pub mandelbulb_params: MandelbulbParams,
    /// Target brick edge length.
    pub brick_size: u64,
    /// Store the payload as a table-of-contents brick hierarchy.
    pub use_toc: bool,
    /// Keep the raw intermediate next to the container.
    pub keep_raw: bool,
    /// LZ4-compress TOC bricks.
    pub compress: bool,
    /// Memory the bricking engine may hold, in MiB.
    pub memory_budget_mb: u64,
    /// Worker threads for field evaluation; `None` uses all cores.
    pub jobs: Option<usize>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("volume.uvf"),
            dims: [128, 128, 128],
            bit_width: 8,
            mandelbulb: false,
            mandelbulb_params: MandelbulbParams::default(),
            brick_size: DEFAULT_BRICK_SIZE,
            use_toc: false,
            keep_raw: false,
            compress: false,
            memory_budget_mb: DEFAULT_BUDGET_BYTES / (1024 * 1024),
            jobs: None,
        }
    }
}

impl GeneratorConfig {
    /// Load a configuration from a JSON file; missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn dimensions(&self) -> Result<VolumeDimensions> {
        let [x, y, z] = self.dims;
        VolumeDimensions::new(x, y, z)
    }

    pub fn format(&self) -> Result<SampleFormat> {
        SampleFormat::from_bits(self.bit_width)
    }

    pub fn field(&self) -> FieldKind {
        if self.mandelbulb {
            FieldKind::Mandelbulb(self.mandelbulb_params)
        } else {
            FieldKind::RadialFalloff
        }
    }

    /// Check the parameters before anything touches the disk.
    pub fn validate(&self) -> Result<()> {
        let dims = self.dimensions()?;
        let format = self.format()?;
        dims.byte_size(format)?;

        // Raster payloads double the overlap
        let overlap = if self.use_toc { DEFAULT_BRICK_OVERLAP } else { DEFAULT_BRICK_OVERLAP * 2 };
        let min_brick = 2 * overlap + 1;
        if self.brick_size < min_brick {
            return Err(Error::Config(format!(
                "Brick size {} is too small (minimum {})",
                self.brick_size, min_brick
            )));
        }
        if self.brick_size > MAX_BRICK_SIZE {
            return Err(Error::Config(format!(
                "Brick size {} is too large (maximum {})",
                self.brick_size, MAX_BRICK_SIZE
            )));
        }
        if self.memory_budget_mb == 0 {
            return Err(Error::Config("Memory budget must be positive".to_string()));
        }
        if self.jobs == Some(0) {
            return Err(Error::Config("Thread count must be positive".to_string()));
        }
        if self.mandelbulb {
            let params = &self.mandelbulb_params;
            if params.power == 0 {
                return Err(Error::Config("Mandelbulb power must be positive".to_string()));
            }
            if params.max_iterations == Some(0) {
                return Err(Error::Config("Mandelbulb iteration cap must be positive".to_string()));
            }
            if !(params.bailout.is_finite() && params.bailout > 0.0) {
                return Err(Error::Config(format!("Invalid Mandelbulb bailout {}", params.bailout)));
            }
        }
        if self.output.as_os_str().is_empty() {
            return Err(Error::Config("No output path given".to_string()));
        }
        Ok(())
    }
}
