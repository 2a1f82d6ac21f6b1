//! Streaming volume writer
//!
//! Evaluates the field one row at a time (x fastest, then y, then z) and
//! appends each finished row to the backing store. Only a single row buffer
//! is alive at any time; the samples of a row are computed in parallel.

use std::time::{Duration, Instant};

use glam::U64Vec3;
use rayon::prelude::*;

use crate::core::{Error, Eta, ProgressSink, Result};
use crate::streaming::raw_file::BackingStore;
use crate::voxel::{Sample, SampleFormat, VolumeDimensions};
use super::field::FieldKind;

/// Progress estimate for slice-by-slice generation
///
/// Before the middle slice it reports elapsed time; after it, the remaining
/// time is guessed as `2 * elapsed_at_middle - elapsed_now`, assuming the
/// second half costs as much as the first.
#[derive(Debug, Clone)]
pub struct EtaEstimator {
    depth: u64,
    halfway: Option<Duration>,
}

impl EtaEstimator {
    pub fn new(depth: u64) -> Self {
        Self { depth, halfway: None }
    }

    /// Called at the start of slice `z`; returns the update to report, if any
    pub fn update(&mut self, z: u64, elapsed: Duration) -> Option<(f64, Eta)> {
        let half = self.depth / 2;
        let percent = 100.0 * z as f64 / self.depth as f64;

        if z < half {
            Some((percent, Eta::Elapsed(elapsed)))
        } else if z > half {
            let halfway = self.halfway.unwrap_or(elapsed);
            let remaining = (halfway * 2).saturating_sub(elapsed);
            Some((percent, Eta::Remaining(remaining)))
        } else {
            self.halfway = Some(elapsed);
            None
        }
    }
}

/// Writes a procedural field into a backing store row by row
pub struct VolumeWriter<'a> {
    dims: VolumeDimensions,
    field: FieldKind,
    progress: &'a dyn ProgressSink,
}

impl<'a> VolumeWriter<'a> {
    pub fn new(dims: VolumeDimensions, field: FieldKind, progress: &'a dyn ProgressSink) -> Self {
        Self { dims, field, progress }
    }

    /// Generate the whole volume in `format`; returns the number of bytes written
    pub fn write(&self, format: SampleFormat, store: &mut dyn BackingStore) -> Result<u64> {
        match format {
            SampleFormat::U8 => self.write_samples::<u8>(store),
            SampleFormat::U16 => self.write_samples::<u16>(store),
        }
    }

    /// Generate the whole volume as samples of type `T`
    pub fn write_samples<T: Sample>(&self, store: &mut dyn BackingStore) -> Result<u64> {
        let dims = self.dims;
        let field = self.field;
        let width = usize::try_from(dims.x())
            .map_err(|_| Error::Config(format!("Row length {} exceeds addressable memory", dims.x())))?;

        let mut row = vec![T::default(); width];
        let mut eta = EtaEstimator::new(dims.z());
        let mut written = 0u64;
        let start = Instant::now();

        for z in 0..dims.z() {
            if let Some((percent, estimate)) = eta.update(z, start.elapsed()) {
                self.progress.generation(percent, estimate);
            }

            for y in 0..dims.y() {
                row.par_iter_mut().enumerate().for_each(|(x, sample)| {
                    *sample = field.sample::<T>(U64Vec3::new(x as u64, y, z), dims);
                });

                let bytes: &[u8] = bytemuck::cast_slice(&row);
                store.append_row(bytes)?;
                written += bytes.len() as u64;
            }
        }

        log::debug!(
            "Generated {} volume {} ({} bytes) in {:.2}s",
            field.name(),
            dims,
            written,
            start.elapsed().as_secs_f64()
        );
        Ok(written)
    }
}
