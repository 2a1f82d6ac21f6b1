//! Joint value / gradient-magnitude histogram

use rkyv::{Archive, Deserialize, Serialize};

use crate::bricking::BrickedVolume;
use crate::core::{Error, Result};
use crate::voxel::{Sample, SampleFormat};

/// Gradient magnitude resolution
pub const GRADIENT_BINS: usize = 256;

const KIND: &str = "2D";

/// Counts indexed by `gradient_bin * value_bins + value_bin`
#[derive(Clone, Debug, Default, PartialEq, Archive, Deserialize, Serialize)]
pub struct Histogram2D {
    pub value_bins: u64,
    pub gradient_bins: u64,
    /// Largest gradient magnitude, mapped to the last gradient bin
    pub max_gradient: f64,
    pub bins: Vec<u64>,
}

impl Histogram2D {
    pub fn compute(
        volume: &BrickedVolume,
        component: usize,
        bucket_count: usize,
        global_max: f64,
    ) -> Result<Self> {
        let fail = |reason: String| Error::DerivedData { kind: KIND, reason };

        if component >= volume.component_count as usize {
            return Err(fail(format!(
                "channel {} out of range ({} components)",
                component, volume.component_count
            )));
        }
        if bucket_count == 0 {
            return Err(fail("bucket count is zero".to_string()));
        }
        let dims = volume
            .finest()
            .map(|level| level.dims)
            .ok_or_else(|| fail("volume holds no LOD levels".to_string()))?;

        let format = volume.format().map_err(|e| fail(e.to_string()))?;
        let values = match format {
            SampleFormat::U8 => widen::<u8>(volume),
            SampleFormat::U16 => widen::<u16>(volume),
        }
        .map_err(|e| fail(e.to_string()))?;
        if values.is_empty() {
            return Err(fail("volume holds no voxels".to_string()));
        }

        let grid = Grid::new(&values, dims);
        let max_gradient = (0..values.len())
            .map(|i| grid.gradient_magnitude(i))
            .fold(0.0f64, f64::max);

        let value_scale = bucket_count as f64 / (global_max.max(0.0) + 1.0);
        let gradient_scale = if max_gradient > 0.0 {
            (GRADIENT_BINS - 1) as f64 / max_gradient
        } else {
            0.0
        };

        let mut bins = vec![0u64; bucket_count * GRADIENT_BINS];
        for (i, &value) in values.iter().enumerate() {
            let v = ((value * value_scale) as usize).min(bucket_count - 1);
            let g = ((grid.gradient_magnitude(i) * gradient_scale).round() as usize)
                .min(GRADIENT_BINS - 1);
            bins[g * bucket_count + v] += 1;
        }

        Ok(Self {
            value_bins: bucket_count as u64,
            gradient_bins: GRADIENT_BINS as u64,
            max_gradient,
            bins,
        })
    }

    pub fn get(&self, value_bin: usize, gradient_bin: usize) -> u64 {
        self.bins[gradient_bin * self.value_bins as usize + value_bin]
    }

    pub fn total(&self) -> u64 {
        self.bins.iter().sum()
    }
}

fn widen<T: Sample>(volume: &BrickedVolume) -> Result<Vec<f64>> {
    Ok(volume
        .level_samples::<T>(0)?
        .into_iter()
        .map(T::to_f64)
        .collect())
}

/// Dense x-fastest grid with clamped central differences
struct Grid<'a> {
    values: &'a [f64],
    dims: [usize; 3],
}

impl<'a> Grid<'a> {
    fn new(values: &'a [f64], dims: [u64; 3]) -> Self {
        Self {
            values,
            dims: dims.map(|d| d as usize),
        }
    }

    fn gradient_magnitude(&self, index: usize) -> f64 {
        let [nx, ny, _] = self.dims;
        let pos = [index % nx, (index / nx) % ny, index / (nx * ny)];
        let stride = [1, nx, nx * ny];

        let mut sum = 0.0;
        for axis in 0..3 {
            let lo = pos[axis].saturating_sub(1);
            let hi = (pos[axis] + 1).min(self.dims[axis] - 1);
            if hi == lo {
                continue;
            }
            let base = index - pos[axis] * stride[axis];
            let d = (self.values[base + hi * stride[axis]] - self.values[base + lo * stride[axis]])
                / (hi - lo) as f64;
            sum += d * d;
        }
        sum.sqrt()
    }
}
