//! Brick and level-of-detail planning
//!
//! Each LOD level halves the resolution of the one above it. The plan picks
//! enough levels that the coarsest one fits in a single brick along its
//! largest axis.

use glam::{DVec3, U64Vec3};

use crate::core::{Error, Result};
use crate::voxel::VolumeDimensions;

/// Default overlap (voxels per side) between neighbouring bricks
pub const DEFAULT_BRICK_OVERLAP: u64 = 2;

/// Resolution reduction between consecutive LOD levels, per axis
pub const LOD_DECIMATION_FACTOR: u64 = 2;

/// Default brick edge length
pub const DEFAULT_BRICK_SIZE: u64 = 64;

/// Largest accepted brick edge length
pub const MAX_BRICK_SIZE: u64 = 4096;

/// Where the bricked payload is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrickSource {
    /// Raster block bricked from the open backing store
    Raster,
    /// Table-of-contents block bricked straight from the raw file
    FlatFile,
}

/// Number of LOD levels for a volume
///
/// Starts at 1 and halves the largest dimension until it is no larger than
/// `brick_size`.
///
/// # Examples
/// ```
/// use volsynth::streaming::lod::lod_level_count;
///
/// assert_eq!(lod_level_count(64, 32), 2);
/// assert_eq!(lod_level_count(32, 32), 1);
/// assert_eq!(lod_level_count(1000, 64), 5);
/// ```
pub fn lod_level_count(max_dim: u64, brick_size: u64) -> u64 {
    let mut levels = 1;
    let mut size = max_dim;
    while size > brick_size {
        size /= LOD_DECIMATION_FACTOR;
        levels += 1;
    }
    levels
}

/// Dimensions of the level below `dims`
///
/// Odd extents round up so no voxel is dropped; no axis shrinks below 1.
pub fn decimate(dims: U64Vec3) -> U64Vec3 {
    (dims + U64Vec3::splat(LOD_DECIMATION_FACTOR - 1)) / LOD_DECIMATION_FACTOR
}

/// Bricks per axis needed to cover `dims` with cores of edge `core`
pub fn brick_counts(dims: U64Vec3, core: u64) -> U64Vec3 {
    U64Vec3::new(dims.x.div_ceil(core), dims.y.div_ceil(core), dims.z.div_ceil(core))
}

/// Per-axis scale that makes voxel spacing uniform on anisotropic volumes
pub fn scale_transform(dims: VolumeDimensions) -> DVec3 {
    DVec3::splat(dims.max_dim() as f64) / dims.as_dvec()
}

/// Brick layout and LOD plan for one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrickPlan {
    pub dims: VolumeDimensions,
    /// Cubic brick edge length, overlap included
    pub brick_size: u64,
    /// Overlap voxels on each brick side
    pub brick_overlap: u64,
    pub decimation_factor: u64,
    pub lod_levels: u64,
    pub scale: DVec3,
}

impl BrickPlan {
    /// Plan bricks of edge `brick_size` for `source`
    ///
    /// Raster payloads double the default overlap for seamless trilinear
    /// reconstruction across brick borders.
    pub fn new(dims: VolumeDimensions, brick_size: u64, source: BrickSource) -> Result<Self> {
        let brick_overlap = match source {
            BrickSource::Raster => DEFAULT_BRICK_OVERLAP * 2,
            BrickSource::FlatFile => DEFAULT_BRICK_OVERLAP,
        };

        if brick_size <= 2 * brick_overlap {
            return Err(Error::Config(format!(
                "Brick size {} leaves no interior with an overlap of {} voxels per side",
                brick_size, brick_overlap
            )));
        }

        Ok(Self {
            dims,
            brick_size,
            brick_overlap,
            decimation_factor: LOD_DECIMATION_FACTOR,
            lod_levels: lod_level_count(dims.max_dim(), brick_size),
            scale: scale_transform(dims),
        })
    }

    /// Brick edge without the overlap on both sides
    pub fn core_size(&self) -> u64 {
        self.brick_size - 2 * self.brick_overlap
    }

    /// Dimensions of every LOD level, finest first
    pub fn level_dims(&self) -> Vec<U64Vec3> {
        let mut dims = self.dims.as_uvec();
        let mut levels = Vec::with_capacity(self.lod_levels as usize);
        for _ in 0..self.lod_levels {
            levels.push(dims);
            dims = decimate(dims);
        }
        levels
    }

    /// Bricks per axis for a level of `dims`
    pub fn brick_counts(&self, dims: U64Vec3) -> U64Vec3 {
        brick_counts(dims, self.core_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lod_level_count() {
        assert_eq!(lod_level_count(64, 32), 2);
        assert_eq!(lod_level_count(65, 32), 2);
        assert_eq!(lod_level_count(128, 32), 3);
        assert_eq!(lod_level_count(16, 64), 1);
        assert_eq!(lod_level_count(1, 1), 1);
    }

    #[test]
    fn test_single_level_when_fits() {
        for max_dim in 1..=32 {
            assert_eq!(lod_level_count(max_dim, 32), 1);
        }
    }

    #[test]
    fn test_monotonic_in_max_dim() {
        for brick_size in [8, 16, 32, 100] {
            let mut prev = lod_level_count(1, brick_size);
            for max_dim in 2..2000 {
                let levels = lod_level_count(max_dim, brick_size);
                assert!(
                    levels >= prev,
                    "LOD count dropped from {} to {} at max_dim {}",
                    prev,
                    levels,
                    max_dim
                );
                prev = levels;
            }
        }
    }

    #[test]
    fn test_plan_raster() {
        let dims = VolumeDimensions::cube(64).unwrap();
        let plan = BrickPlan::new(dims, 32, BrickSource::Raster).unwrap();
        assert_eq!(plan.lod_levels, 2);
        assert_eq!(plan.brick_overlap, 4);
        assert_eq!(plan.core_size(), 24);
        assert_eq!(plan.decimation_factor, 2);
        assert_eq!(plan.scale, DVec3::ONE);
        assert_eq!(plan.level_dims(), vec![U64Vec3::splat(64), U64Vec3::splat(32)]);
        assert_eq!(plan.brick_counts(U64Vec3::splat(64)), U64Vec3::splat(3));
        assert_eq!(plan.brick_counts(U64Vec3::splat(32)), U64Vec3::splat(2));
    }

    #[test]
    fn test_brick_counts_huge_core() {
        let dims = U64Vec3::new(16, 9, 1);
        assert_eq!(brick_counts(dims, u64::MAX), U64Vec3::ONE);
        assert_eq!(brick_counts(dims, 4), U64Vec3::new(4, 3, 1));
    }

    #[test]
    fn test_plan_flat_file_overlap() {
        let dims = VolumeDimensions::cube(16).unwrap();
        let plan = BrickPlan::new(dims, 8, BrickSource::FlatFile).unwrap();
        assert_eq!(plan.brick_overlap, DEFAULT_BRICK_OVERLAP);
        assert_eq!(plan.core_size(), 4);
        assert_eq!(plan.lod_levels, 2);
    }

    #[test]
    fn test_plan_rejects_tiny_bricks() {
        let dims = VolumeDimensions::cube(16).unwrap();
        assert!(BrickPlan::new(dims, 8, BrickSource::Raster).is_err());
        assert!(BrickPlan::new(dims, 4, BrickSource::FlatFile).is_err());
        assert!(BrickPlan::new(dims, 5, BrickSource::FlatFile).is_ok());
    }

    #[test]
    fn test_scale_anisotropic() {
        let dims = VolumeDimensions::new(128, 64, 32).unwrap();
        assert_eq!(scale_transform(dims), DVec3::new(1.0, 2.0, 4.0));
    }

    #[test]
    fn test_decimate() {
        assert_eq!(decimate(U64Vec3::new(64, 33, 1)), U64Vec3::new(32, 17, 1));
        assert_eq!(decimate(U64Vec3::new(3, 2, 5)), U64Vec3::new(2, 1, 3));
    }
}
