//! Bricked multi-resolution volume storage

use std::borrow::Cow;

use glam::U64Vec3;
use rkyv::{Archive, Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::voxel::{Sample, SampleFormat};

/// One brick of a LOD level
///
/// `origin`/`extent` describe the stored region, overlap included; the
/// `core_*` region is the part of the level this brick is responsible for.
#[derive(Clone, Debug, PartialEq, Archive, Deserialize, Serialize)]
pub struct Brick {
    pub origin: [u64; 3],
    pub extent: [u64; 3],
    pub core_origin: [u64; 3],
    pub core_extent: [u64; 3],
    /// Payload is LZ4 compressed (size prepended)
    pub compressed: bool,
    pub data: Vec<u8>,
}

impl Brick {
    pub fn voxel_count(&self) -> u64 {
        self.extent.iter().product()
    }

    /// Uncompressed sample bytes
    pub fn payload(&self) -> Result<Cow<'_, [u8]>> {
        if self.compressed {
            lz4_flex::decompress_size_prepended(&self.data)
                .map(Cow::Owned)
                .map_err(|e| Error::GenerationIntegrity(format!("LZ4 decompression failed: {}", e)))
        } else {
            Ok(Cow::Borrowed(&self.data))
        }
    }
}

/// One resolution level: its dimensions and bricks in x-fastest order
#[derive(Clone, Debug, PartialEq, Archive, Deserialize, Serialize)]
pub struct LodLevel {
    pub dims: [u64; 3],
    pub brick_counts: [u64; 3],
    pub bricks: Vec<Brick>,
}

impl LodLevel {
    pub fn voxel_count(&self) -> u64 {
        self.dims.iter().product()
    }

    pub fn expected_brick_count(&self) -> u64 {
        self.brick_counts.iter().product()
    }
}

/// Brick hierarchy, finest level first
#[derive(Clone, Debug, PartialEq, Archive, Deserialize, Serialize)]
pub struct BrickedVolume {
    pub bits: u32,
    pub component_count: u32,
    pub brick_size: u64,
    pub brick_overlap: u64,
    pub levels: Vec<LodLevel>,
}

impl BrickedVolume {
    pub fn format(&self) -> Result<SampleFormat> {
        SampleFormat::from_bits(self.bits)
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn finest(&self) -> Option<&LodLevel> {
        self.levels.first()
    }

    pub fn brick_count(&self) -> usize {
        self.levels.iter().map(|l| l.bricks.len()).sum()
    }

    /// Reassemble the core voxels of `level` into a dense x-fastest array
    pub fn level_samples<T: Sample>(&self, level: usize) -> Result<Vec<T>> {
        if T::FORMAT.bits() != self.bits {
            return Err(Error::GenerationIntegrity(format!(
                "Requested {}-bit samples from a {}-bit volume",
                T::FORMAT.bits(),
                self.bits
            )));
        }
        let lod = self.levels.get(level).ok_or_else(|| {
            Error::GenerationIntegrity(format!(
                "LOD level {} out of range ({} levels)",
                level,
                self.levels.len()
            ))
        })?;

        let dims = U64Vec3::from_array(lod.dims);
        let mut out = vec![T::default(); lod.voxel_count() as usize];

        for brick in &lod.bricks {
            let bytes = brick.payload()?;
            let expected = brick.voxel_count() as usize * std::mem::size_of::<T>();
            if bytes.len() != expected {
                return Err(Error::GenerationIntegrity(format!(
                    "Brick at {:?} holds {} bytes, expected {}",
                    brick.origin,
                    bytes.len(),
                    expected
                )));
            }
            let mut samples = vec![T::default(); brick.voxel_count() as usize];
            bytemuck::cast_slice_mut::<T, u8>(&mut samples).copy_from_slice(&bytes);

            let origin = U64Vec3::from_array(brick.origin);
            let extent = U64Vec3::from_array(brick.extent);
            let core = U64Vec3::from_array(brick.core_origin);
            let core_extent = U64Vec3::from_array(brick.core_extent);
            if (core + core_extent).cmpgt(dims).any()
                || core.cmplt(origin).any()
                || (core + core_extent).cmpgt(origin + extent).any()
            {
                return Err(Error::GenerationIntegrity(format!(
                    "Brick core {:?}+{:?} lies outside its stored region or the level",
                    brick.core_origin, brick.core_extent
                )));
            }

            let row = core_extent.x as usize;
            for z in core.z..core.z + core_extent.z {
                for y in core.y..core.y + core_extent.y {
                    let src = (core.x - origin.x)
                        + extent.x * ((y - origin.y) + extent.y * (z - origin.z));
                    let dst = core.x + dims.x * (y + dims.y * z);
                    let (src, dst) = (src as usize, dst as usize);
                    out[dst..dst + row].copy_from_slice(&samples[src..src + row]);
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_brick_volume(data: Vec<u8>, compressed: bool) -> BrickedVolume {
        let data = if compressed {
            lz4_flex::compress_prepend_size(&data)
        } else {
            data
        };
        BrickedVolume {
            bits: 8,
            component_count: 1,
            brick_size: 4,
            brick_overlap: 0,
            levels: vec![LodLevel {
                dims: [2, 2, 2],
                brick_counts: [1, 1, 1],
                bricks: vec![Brick {
                    origin: [0, 0, 0],
                    extent: [2, 2, 2],
                    core_origin: [0, 0, 0],
                    core_extent: [2, 2, 2],
                    compressed,
                    data,
                }],
            }],
        }
    }

    #[test]
    fn test_level_samples_roundtrip() {
        let values: Vec<u8> = (0..8).collect();
        for compressed in [false, true] {
            let volume = single_brick_volume(values.clone(), compressed);
            assert_eq!(volume.level_samples::<u8>(0).unwrap(), values);
        }
    }

    #[test]
    fn test_level_samples_wrong_width() {
        let volume = single_brick_volume((0..8).collect(), false);
        assert!(volume.level_samples::<u16>(0).is_err());
        assert!(volume.level_samples::<u8>(1).is_err());
    }

    #[test]
    fn test_level_samples_short_brick() {
        let volume = single_brick_volume(vec![0; 5], false);
        assert!(volume.level_samples::<u8>(0).is_err());
    }

    #[test]
    fn test_counts() {
        let volume = single_brick_volume(vec![0; 8], false);
        assert_eq!(volume.level_count(), 1);
        assert_eq!(volume.brick_count(), 1);
        assert_eq!(volume.finest().unwrap().expected_brick_count(), 1);
        assert_eq!(volume.format().unwrap(), SampleFormat::U8);
    }
}
