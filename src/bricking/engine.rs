//! Brick/LOD subdivision
//!
//! Level 0 is read in full from the raw store; each further level halves the
//! previous one with the supplied combiner. Every level is then cut into
//! cubic bricks whose core regions tile the level, each padded by the overlap
//! on all sides and clamped at the volume border.

use std::path::Path;

use glam::{DVec3, U64Vec3};
use rayon::prelude::*;

use crate::container::{MaxMin, MaxMinBlock, RasterBlock, TocBlock};
use crate::core::{Error, ProgressSink, Result};
use crate::streaming::lod::{brick_counts, decimate, lod_level_count};
use crate::streaming::{BackingStore, LargeRawFile, MemoryBudget};
use crate::voxel::{Sample, SampleFormat, VolumeDimensions};
use super::combine::{combine_average, simple_max_min, CombineFn, MaxMinFn};
use super::volume::{Brick, BrickedVolume, LodLevel};

/// Parameters for bricking a raw file on disk
#[derive(Debug, Clone)]
pub struct FlatFileRequest<'a> {
    pub source: &'a Path,
    pub format: SampleFormat,
    pub component_count: u32,
    pub dims: VolumeDimensions,
    pub voxel_spacing: DVec3,
    pub brick_size: u64,
    pub brick_overlap: u64,
    pub allow_compression: bool,
    pub allow_multi_resolution: bool,
    pub memory_budget: u64,
    pub block_id: &'a str,
}

/// Subdivides flat volumes into LOD brick hierarchies
pub trait BrickingEngine {
    /// Brick the raw file at `request.source` into a table-of-contents block
    fn flat_file_to_bricked_lod(
        &self,
        request: &FlatFileRequest<'_>,
        acceleration: &mut MaxMinBlock,
        progress: &dyn ProgressSink,
    ) -> Result<TocBlock>;

    /// Fill the brick data of `block` from the open `source` store
    fn raster_to_bricked_lod<T: Sample>(
        &self,
        block: &mut RasterBlock,
        source: &mut dyn BackingStore,
        combine: CombineFn<T>,
        max_min: MaxMinFn<T>,
        acceleration: &mut MaxMinBlock,
        progress: &dyn ProgressSink,
    ) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
struct BrickLayout {
    dims: U64Vec3,
    brick_size: u64,
    overlap: u64,
    levels: u64,
    compress: bool,
}

impl BrickLayout {
    fn core(&self) -> Result<u64> {
        self.overlap
            .checked_mul(2)
            .and_then(|sides| self.brick_size.checked_sub(sides))
            .filter(|&core| core > 0)
            .ok_or_else(|| {
                Error::GenerationIntegrity(format!(
                    "Brick size {} leaves no interior with overlap {}",
                    self.brick_size, self.overlap
                ))
            })
    }
}

/// In-core bricker bounded by a memory budget
#[derive(Debug, Clone)]
pub struct OctreeBricker {
    budget_bytes: u64,
}

impl OctreeBricker {
    pub fn new(budget_bytes: u64) -> Self {
        Self { budget_bytes }
    }

    fn flat_file_typed<T: Sample>(
        &self,
        request: &FlatFileRequest<'_>,
        acceleration: &mut MaxMinBlock,
        progress: &dyn ProgressSink,
    ) -> Result<TocBlock> {
        if request.component_count != 1 {
            return Err(Error::GenerationIntegrity(format!(
                "Only scalar volumes are supported, got {} components",
                request.component_count
            )));
        }

        let dims = request.dims.as_uvec();
        let layout = BrickLayout {
            dims,
            brick_size: request.brick_size,
            overlap: request.brick_overlap,
            levels: if request.allow_multi_resolution {
                lod_level_count(request.dims.max_dim(), request.brick_size)
            } else {
                1
            },
            compress: request.allow_compression,
        };

        let mut budget = MemoryBudget::new(request.memory_budget.min(self.budget_bytes));
        let mut source = LargeRawFile::new(request.source);
        source.open().map_err(|e| {
            Error::GenerationIntegrity(format!("Cannot open {}: {}", request.source.display(), e))
        })?;
        let level0 = read_level0::<T>(&mut source, dims, &mut budget)?;
        source.close()?;

        let volume = build_volume(
            level0,
            &layout,
            combine_average::<T>,
            simple_max_min::<T>,
            &mut budget,
            acceleration,
            progress,
        )?;

        let spacing = request.voxel_spacing;
        Ok(TocBlock::new(
            request.block_id,
            request.dims.to_array(),
            [spacing.x, spacing.y, spacing.z],
            volume,
        ))
    }
}

impl Default for OctreeBricker {
    fn default() -> Self {
        Self::new(crate::streaming::budget::DEFAULT_BUDGET_BYTES)
    }
}

impl BrickingEngine for OctreeBricker {
    fn flat_file_to_bricked_lod(
        &self,
        request: &FlatFileRequest<'_>,
        acceleration: &mut MaxMinBlock,
        progress: &dyn ProgressSink,
    ) -> Result<TocBlock> {
        match request.format {
            SampleFormat::U8 => self.flat_file_typed::<u8>(request, acceleration, progress),
            SampleFormat::U16 => self.flat_file_typed::<u16>(request, acceleration, progress),
        }
    }

    fn raster_to_bricked_lod<T: Sample>(
        &self,
        block: &mut RasterBlock,
        source: &mut dyn BackingStore,
        combine: CombineFn<T>,
        max_min: MaxMinFn<T>,
        acceleration: &mut MaxMinBlock,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        if block.element.bit_size != T::FORMAT.bits() as u64 {
            return Err(Error::GenerationIntegrity(format!(
                "Raster block expects {}-bit samples, combiners are {}-bit",
                block.element.bit_size,
                T::FORMAT.bits()
            )));
        }
        let dims = block
            .dims()
            .ok_or_else(|| Error::GenerationIntegrity("Raster block has no 3-D domain".to_string()))?;
        let (brick_size, overlap, levels) = match (
            block.brick_size.first(),
            block.brick_overlap.first(),
            block.lod_level_count.first(),
        ) {
            (Some(&size), Some(&overlap), Some(&levels)) => (size, overlap, levels),
            _ => {
                return Err(Error::GenerationIntegrity(
                    "Raster block descriptor is incomplete".to_string(),
                ))
            }
        };
        let layout = BrickLayout {
            dims,
            brick_size,
            overlap,
            levels,
            compress: false,
        };

        let mut budget = MemoryBudget::new(self.budget_bytes);
        let level0 = read_level0::<T>(source, dims, &mut budget)?;
        let volume = build_volume(level0, &layout, combine, max_min, &mut budget, acceleration, progress)?;
        block.volume = Some(volume);
        Ok(())
    }
}

fn read_level0<T: Sample>(
    source: &mut dyn BackingStore,
    dims: U64Vec3,
    budget: &mut MemoryBudget,
) -> Result<Vec<T>> {
    let count = dims
        .x
        .checked_mul(dims.y)
        .and_then(|n| n.checked_mul(dims.z))
        .ok_or_else(|| Error::GenerationIntegrity(format!("Volume {} is too large", dims)))?;
    let bytes = count * std::mem::size_of::<T>() as u64;
    budget.reserve(bytes, "LOD level 0")?;

    let available = source.len()?;
    if available < bytes {
        return Err(Error::GenerationIntegrity(format!(
            "{} holds {} bytes, expected {}",
            source.path().display(),
            available,
            bytes
        )));
    }

    let mut data = vec![T::default(); count as usize];
    source
        .read_at(0, bytemuck::cast_slice_mut(&mut data))
        .map_err(|e| {
            Error::GenerationIntegrity(format!("Reading {}: {}", source.path().display(), e))
        })?;
    Ok(data)
}

fn build_volume<T: Sample>(
    level0: Vec<T>,
    layout: &BrickLayout,
    combine: CombineFn<T>,
    max_min: MaxMinFn<T>,
    budget: &mut MemoryBudget,
    acceleration: &mut MaxMinBlock,
    progress: &dyn ProgressSink,
) -> Result<BrickedVolume> {
    let core = layout.core()?;
    let sample_size = std::mem::size_of::<T>() as u64;

    let mut levels = Vec::with_capacity(layout.levels as usize);
    let mut data = level0;
    let mut dims = layout.dims;

    for index in 0..layout.levels {
        progress.stage(&format!("Bricking LOD level {} of {}...", index + 1, layout.levels));
        let (level, ranges) = brick_level(&data, dims, core, layout, max_min);

        let stored: u64 = level.bricks.iter().map(|b| b.data.len() as u64).sum();
        budget.reserve(stored, "Brick data")?;
        for range in ranges {
            acceleration.push_brick(range);
        }
        log::debug!(
            "LOD level {}: {} ({} bricks, {} bytes)",
            index,
            dims,
            level.bricks.len(),
            stored
        );
        levels.push(level);

        if index + 1 < layout.levels {
            let next_dims = decimate(dims);
            let next_bytes = next_dims.x * next_dims.y * next_dims.z * sample_size;
            budget.reserve(next_bytes, "Downsampled LOD level")?;
            let next = downsample(&data, dims, combine);
            budget.release(data.len() as u64 * sample_size);
            data = next;
            dims = next_dims;
        }
    }

    Ok(BrickedVolume {
        bits: T::FORMAT.bits(),
        component_count: 1,
        brick_size: layout.brick_size,
        brick_overlap: layout.overlap,
        levels,
    })
}

/// Halve `dims` along every axis, combining up to eight voxels per cell
fn downsample<T: Sample>(data: &[T], dims: U64Vec3, combine: CombineFn<T>) -> Vec<T> {
    let next = decimate(dims);
    let (sx, sy, sz) = (dims.x as usize, dims.y as usize, dims.z as usize);
    let (nx, ny) = (next.x as usize, next.y as usize);
    let mut out = vec![T::default(); (next.x * next.y * next.z) as usize];

    out.par_chunks_mut(nx * ny).enumerate().for_each(|(z, slice)| {
        let mut cell = [T::default(); 8];
        for y in 0..ny {
            for x in 0..nx {
                let mut n = 0;
                for oz in 2 * z..(2 * z + 2).min(sz) {
                    for oy in 2 * y..(2 * y + 2).min(sy) {
                        for ox in 2 * x..(2 * x + 2).min(sx) {
                            cell[n] = data[ox + sx * (oy + sy * oz)];
                            n += 1;
                        }
                    }
                }
                slice[x + nx * y] = combine(&cell[..n]);
            }
        }
    });
    out
}

fn brick_level<T: Sample>(
    data: &[T],
    dims: U64Vec3,
    core: u64,
    layout: &BrickLayout,
    max_min: MaxMinFn<T>,
) -> (LodLevel, Vec<MaxMin>) {
    let counts = brick_counts(dims, core);
    let overlap = U64Vec3::splat(layout.overlap);
    let total = counts.x * counts.y * counts.z;

    let (bricks, ranges): (Vec<Brick>, Vec<MaxMin>) = (0..total)
        .into_par_iter()
        .map(|i| {
            let index = U64Vec3::new(i % counts.x, (i / counts.x) % counts.y, i / (counts.x * counts.y));
            let core_origin = index * core;
            let core_extent = (dims - core_origin).min(U64Vec3::splat(core));
            let origin = core_origin.saturating_sub(overlap);
            let end = (core_origin + core_extent + overlap).min(dims);
            let extent = end - origin;

            let mut samples = Vec::with_capacity((extent.x * extent.y * extent.z) as usize);
            for z in origin.z..end.z {
                for y in origin.y..end.y {
                    let start = (origin.x + dims.x * (y + dims.y * z)) as usize;
                    samples.extend_from_slice(&data[start..start + extent.x as usize]);
                }
            }

            let range = max_min(&samples);
            let bytes: &[u8] = bytemuck::cast_slice(&samples);
            let (compressed, payload) = if layout.compress {
                (true, lz4_flex::compress_prepend_size(bytes))
            } else {
                (false, bytes.to_vec())
            };

            let brick = Brick {
                origin: origin.to_array(),
                extent: extent.to_array(),
                core_origin: core_origin.to_array(),
                core_extent: core_extent.to_array(),
                compressed,
                data: payload,
            };
            (brick, range)
        })
        .unzip();

    let level = LodLevel {
        dims: dims.to_array(),
        brick_counts: counts.to_array(),
        bricks,
    };
    (level, ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NullProgress, RecordingProgress};
    use crate::streaming::{BrickPlan, BrickSource};
    use tempfile::TempDir;

    fn pattern_u8(dims: U64Vec3) -> Vec<u8> {
        (0..dims.x * dims.y * dims.z).map(|i| (i * 7 % 251) as u8).collect()
    }

    fn write_raw(path: &Path, bytes: &[u8]) -> LargeRawFile {
        let mut store = LargeRawFile::new(path);
        store.create(bytes.len() as u64).expect("create failed");
        store.append_row(bytes).expect("append failed");
        store
    }

    #[test]
    fn test_raster_roundtrip() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let dims = VolumeDimensions::new(20, 12, 9).unwrap();
        let values = pattern_u8(dims.as_uvec());
        let mut store = write_raw(&temp_dir.path().join("volume.raw"), &values);

        let plan = BrickPlan::new(dims, 12, BrickSource::Raster).unwrap();
        assert_eq!(plan.lod_levels, 2);
        let mut block = RasterBlock::from_plan("Test Volume 1", &plan, SampleFormat::U8);
        let mut acceleration = MaxMinBlock::new(1);
        let progress = RecordingProgress::new();

        OctreeBricker::default()
            .raster_to_bricked_lod::<u8>(
                &mut block,
                &mut store,
                combine_average::<u8>,
                simple_max_min::<u8>,
                &mut acceleration,
                &progress,
            )
            .expect("bricking failed");

        block.verify().expect("verify failed");
        let volume = block.volume.as_ref().unwrap();
        assert_eq!(volume.level_count(), 2);
        assert_eq!(volume.level_samples::<u8>(0).unwrap(), values);

        // Level 1 voxel (1, 2, 3) averages the 2x2x2 cell at (2, 4, 6)
        let level1 = volume.level_samples::<u8>(1).unwrap();
        let at = |x: u64, y: u64, z: u64| values[(x + 20 * (y + 12 * z)) as usize];
        let cell: Vec<u8> = (0..8).map(|i| at(2 + (i & 1), 4 + ((i >> 1) & 1), 6 + (i >> 2))).collect();
        assert_eq!(level1[(1 + 10 * (2 + 6 * 3)) as usize], combine_average(&cell));

        let expected = simple_max_min(&values);
        assert_eq!(acceleration.global, expected);
        assert_eq!(acceleration.brick_count(), volume.brick_count());
        assert_eq!(progress.stages.borrow().len(), 2);
    }

    #[test]
    fn test_flat_file_compressed_u16() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("volume.raw");
        let dims = VolumeDimensions::new(16, 16, 16).unwrap();
        let values: Vec<u16> = (0..4096u32).map(|i| (i * 13 % 60000) as u16).collect();
        let mut store = write_raw(&path, bytemuck::cast_slice(&values));
        store.close().unwrap();

        let request = FlatFileRequest {
            source: &path,
            format: SampleFormat::U16,
            component_count: 1,
            dims,
            voxel_spacing: DVec3::ONE,
            brick_size: 8,
            brick_overlap: 2,
            allow_compression: true,
            allow_multi_resolution: true,
            memory_budget: 64 * 1024 * 1024,
            block_id: "Test TOC Volume 1",
        };
        let mut acceleration = MaxMinBlock::new(1);
        let toc = OctreeBricker::default()
            .flat_file_to_bricked_lod(&request, &mut acceleration, &NullProgress)
            .expect("bricking failed");

        toc.verify().expect("verify failed");
        assert_eq!(toc.block_id, "Test TOC Volume 1");
        assert_eq!(toc.volume.level_count(), 2);
        assert!(toc.volume.levels[0].bricks.iter().all(|b| b.compressed));
        assert_eq!(toc.volume.level_samples::<u16>(0).unwrap(), values);
        assert_eq!(acceleration.global, simple_max_min(&values));
    }

    #[test]
    fn test_flat_file_single_resolution() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("volume.raw");
        let dims = VolumeDimensions::cube(10).unwrap();
        write_raw(&path, &pattern_u8(dims.as_uvec())).close().unwrap();

        let request = FlatFileRequest {
            source: &path,
            format: SampleFormat::U8,
            component_count: 1,
            dims,
            voxel_spacing: DVec3::ONE,
            brick_size: 8,
            brick_overlap: 2,
            allow_compression: false,
            allow_multi_resolution: false,
            memory_budget: 1024 * 1024,
            block_id: "Test TOC Volume 1",
        };
        let toc = OctreeBricker::default()
            .flat_file_to_bricked_lod(&request, &mut MaxMinBlock::new(1), &NullProgress)
            .unwrap();
        assert_eq!(toc.volume.level_count(), 1);
        assert_eq!(toc.volume.levels[0].brick_counts, [3, 3, 3]);
    }

    #[test]
    fn test_flat_file_oversized_brick() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("volume.raw");
        let dims = VolumeDimensions::cube(16).unwrap();
        let values = pattern_u8(dims.as_uvec());
        write_raw(&path, &values).close().unwrap();

        let request = FlatFileRequest {
            source: &path,
            format: SampleFormat::U8,
            component_count: 1,
            dims,
            voxel_spacing: DVec3::ONE,
            brick_size: u64::MAX,
            brick_overlap: 2,
            allow_compression: false,
            allow_multi_resolution: true,
            memory_budget: 1024 * 1024,
            block_id: "Test TOC Volume 1",
        };
        let toc = OctreeBricker::default()
            .flat_file_to_bricked_lod(&request, &mut MaxMinBlock::new(1), &NullProgress)
            .expect("bricking failed");

        toc.verify().expect("verify failed");
        assert_eq!(toc.volume.level_count(), 1);
        assert_eq!(toc.volume.levels[0].brick_counts, [1, 1, 1]);
        assert_eq!(toc.volume.level_samples::<u8>(0).unwrap(), values);
    }

    #[test]
    fn test_budget_exceeded() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let dims = VolumeDimensions::cube(16).unwrap();
        let mut store = write_raw(&temp_dir.path().join("big.raw"), &pattern_u8(dims.as_uvec()));

        let plan = BrickPlan::new(dims, 12, BrickSource::Raster).unwrap();
        let mut block = RasterBlock::from_plan("Test Volume 1", &plan, SampleFormat::U8);
        let result = OctreeBricker::new(1000).raster_to_bricked_lod::<u8>(
            &mut block,
            &mut store,
            combine_average::<u8>,
            simple_max_min::<u8>,
            &mut MaxMinBlock::new(1),
            &NullProgress,
        );
        assert!(matches!(result, Err(Error::GenerationIntegrity(_))));
        assert!(block.volume.is_none());
    }

    #[test]
    fn test_short_source_rejected() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let dims = VolumeDimensions::cube(8).unwrap();
        let mut store = write_raw(&temp_dir.path().join("short.raw"), &[0u8; 100]);

        let plan = BrickPlan::new(dims, 12, BrickSource::Raster).unwrap();
        let mut block = RasterBlock::from_plan("Test Volume 1", &plan, SampleFormat::U8);
        let result = OctreeBricker::default().raster_to_bricked_lod::<u8>(
            &mut block,
            &mut store,
            combine_average::<u8>,
            simple_max_min::<u8>,
            &mut MaxMinBlock::new(1),
            &NullProgress,
        );
        assert!(matches!(result, Err(Error::GenerationIntegrity(_))));
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let dims = VolumeDimensions::cube(8).unwrap();
        let mut store = write_raw(&temp_dir.path().join("w.raw"), &[0u8; 512]);

        let plan = BrickPlan::new(dims, 12, BrickSource::Raster).unwrap();
        let mut block = RasterBlock::from_plan("Test Volume 1", &plan, SampleFormat::U8);
        let result = OctreeBricker::default().raster_to_bricked_lod::<u16>(
            &mut block,
            &mut store,
            combine_average::<u16>,
            simple_max_min::<u16>,
            &mut MaxMinBlock::new(1),
            &NullProgress,
        );
        assert!(result.is_err());
    }
}
