//! Value histogram

use rkyv::{Archive, Deserialize, Serialize};

use crate::bricking::BrickedVolume;
use crate::core::{Error, Result};
use crate::voxel::{Sample, SampleFormat};

pub(crate) const KIND: &str = "1D";

/// Occurrence count per sample value of the finest LOD level
#[derive(Clone, Debug, Default, PartialEq, Eq, Archive, Deserialize, Serialize)]
pub struct Histogram1D {
    pub bins: Vec<u64>,
}

impl Histogram1D {
    pub fn compute(volume: &BrickedVolume, component: usize) -> Result<Self> {
        let fail = |reason: String| Error::DerivedData { kind: KIND, reason };

        if component >= volume.component_count as usize {
            return Err(fail(format!(
                "channel {} out of range ({} components)",
                component, volume.component_count
            )));
        }
        let format = volume.format().map_err(|e| fail(e.to_string()))?;
        let bins = match format {
            SampleFormat::U8 => count_values::<u8>(volume),
            SampleFormat::U16 => count_values::<u16>(volume),
        }
        .map_err(|e| fail(e.to_string()))?;

        if bins.iter().all(|&count| count == 0) {
            return Err(fail("volume holds no voxels".to_string()));
        }
        Ok(Self { bins })
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.bins.iter().sum()
    }

    /// Shrink to at most `max_buckets` buckets
    ///
    /// Trailing empty buckets are dropped first; if still too long, groups of
    /// `ceil(len / max_buckets)` adjacent buckets are summed.
    pub fn compress(&mut self, max_buckets: usize) {
        let max_buckets = max_buckets.max(1);
        let used = self.bins.iter().rposition(|&count| count != 0).map_or(1, |last| last + 1);
        self.bins.truncate(used);

        if self.bins.len() > max_buckets {
            let group = self.bins.len().div_ceil(max_buckets);
            self.bins = self.bins.chunks(group).map(|chunk| chunk.iter().sum()).collect();
        }
    }
}

fn count_values<T: Sample>(volume: &BrickedVolume) -> Result<Vec<u64>> {
    let samples = volume.level_samples::<T>(0)?;
    let mut bins = vec![0u64; T::FORMAT.max_value() as usize + 1];
    for sample in samples {
        bins[sample.to_usize()] += 1;
    }
    Ok(bins)
}
