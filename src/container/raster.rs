//! Raster payload block
//!
//! Describes a regular grid bricked into a LOD hierarchy: domain axes and
//! sizes, decimation, element type, brick layout and a scale-only transform.
//! The brick data itself is filled in by the bricking engine.

use glam::{DVec3, U64Vec3};
use rkyv::{Archive, Deserialize, Serialize};

use crate::bricking::BrickedVolume;
use crate::streaming::BrickPlan;
use crate::streaming::lod::decimate;
use crate::voxel::SampleFormat;
use super::block::CompressionScheme;

/// Meaning of one domain axis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Archive, Deserialize, Serialize)]
pub enum DomainSemantic {
    X,
    Y,
    Z,
}

/// Scalar element description
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Archive, Deserialize, Serialize)]
pub struct ElementType {
    pub bit_size: u64,
    pub mantissa: u64,
    pub signed: bool,
    pub floating_point: bool,
}

impl ElementType {
    /// Unsigned integer element of `format`
    pub fn unsigned(format: SampleFormat) -> Self {
        let bits = format.bits() as u64;
        Self {
            bit_size: bits,
            mantissa: bits,
            signed: false,
            floating_point: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Archive, Deserialize, Serialize)]
pub struct RasterBlock {
    pub block_id: String,
    pub compression: CompressionScheme,
    pub domain_semantics: Vec<DomainSemantic>,
    pub domain_size: Vec<u64>,
    pub lod_dec_factor: Vec<u64>,
    pub lod_groups: Vec<u64>,
    pub lod_level_count: Vec<u64>,
    pub element: ElementType,
    pub brick_size: Vec<u64>,
    pub brick_overlap: Vec<u64>,
    /// Row-major 4x4 matrix
    pub transformation: [f64; 16],
    pub volume: Option<BrickedVolume>,
}

impl RasterBlock {
    /// Empty block; the descriptor still has to be populated
    pub fn new(block_id: impl Into<String>) -> Self {
        Self {
            block_id: block_id.into(),
            compression: CompressionScheme::None,
            domain_semantics: Vec::new(),
            domain_size: Vec::new(),
            lod_dec_factor: Vec::new(),
            lod_groups: Vec::new(),
            lod_level_count: Vec::new(),
            element: ElementType::default(),
            brick_size: Vec::new(),
            brick_overlap: Vec::new(),
            transformation: identity(),
            volume: None,
        }
    }

    /// Block describing a single-group XYZ grid laid out by `plan`
    pub fn from_plan(block_id: impl Into<String>, plan: &BrickPlan, format: SampleFormat) -> Self {
        let mut block = Self::new(block_id);
        block.domain_semantics = vec![DomainSemantic::X, DomainSemantic::Y, DomainSemantic::Z];
        block.domain_size = plan.dims.to_array().to_vec();
        block.lod_dec_factor = vec![plan.decimation_factor; 3];
        block.lod_groups = vec![0; 3];
        block.lod_level_count = vec![plan.lod_levels];
        block.element = ElementType::unsigned(format);
        block.brick_size = vec![plan.brick_size; 3];
        block.brick_overlap = vec![plan.brick_overlap; 3];
        block.set_scale_only_transformation(plan.scale);
        block
    }

    pub fn set_scale_only_transformation(&mut self, scale: DVec3) {
        let mut m = identity();
        m[0] = scale.x;
        m[5] = scale.y;
        m[10] = scale.z;
        self.transformation = m;
    }

    pub fn scale(&self) -> DVec3 {
        DVec3::new(self.transformation[0], self.transformation[5], self.transformation[10])
    }

    /// Grid dimensions, if the descriptor has three axes
    pub fn dims(&self) -> Option<U64Vec3> {
        match self.domain_size.as_slice() {
            &[x, y, z] => Some(U64Vec3::new(x, y, z)),
            _ => None,
        }
    }

    /// Structural check of the descriptor against the brick data
    pub fn verify(&self) -> Result<(), String> {
        if self.domain_semantics != [DomainSemantic::X, DomainSemantic::Y, DomainSemantic::Z] {
            return Err(format!("unexpected domain semantics {:?}", self.domain_semantics));
        }
        for (name, values) in [
            ("domain size", &self.domain_size),
            ("LOD decimation factor", &self.lod_dec_factor),
            ("brick size", &self.brick_size),
            ("brick overlap", &self.brick_overlap),
        ] {
            if values.len() != self.domain_semantics.len() {
                return Err(format!(
                    "{} has {} entries for {} axes",
                    name,
                    values.len(),
                    self.domain_semantics.len()
                ));
            }
        }
        if self.lod_groups.len() != self.domain_semantics.len() {
            return Err(format!(
                "LOD groups has {} entries for {} axes",
                self.lod_groups.len(),
                self.domain_semantics.len()
            ));
        }
        // Groups are numbered from 0 and each one has a level count
        let group_count = self.lod_groups.iter().max().map_or(0, |&g| g + 1);
        let all_used = (0..group_count).all(|g| self.lod_groups.contains(&g));
        if !all_used || group_count != self.lod_level_count.len() as u64 {
            return Err(format!(
                "LOD groups {:?} do not match level counts {:?}",
                self.lod_groups, self.lod_level_count
            ));
        }
        let dims = self.dims().ok_or("missing domain size")?;
        if dims.cmpeq(U64Vec3::ZERO).any() {
            return Err(format!("empty domain {:?}", self.domain_size));
        }
        if !matches!(self.element.bit_size, 8 | 16) || self.element.signed || self.element.floating_point {
            return Err(format!("unsupported element type {:?}", self.element));
        }
        if self.lod_dec_factor.iter().any(|&f| f != 2) {
            return Err(format!("unsupported decimation factor {:?}", self.lod_dec_factor));
        }
        let core = self
            .brick_size
            .iter()
            .zip(&self.brick_overlap)
            .map(|(&size, &overlap)| size.checked_sub(2 * overlap).filter(|&c| c > 0))
            .collect::<Option<Vec<u64>>>()
            .ok_or("brick overlap leaves no brick interior")?;
        let core = U64Vec3::new(core[0], core[1], core[2]);

        let volume = self.volume.as_ref().ok_or("block holds no brick data")?;
        if volume.bits as u64 != self.element.bit_size {
            return Err(format!(
                "brick data is {}-bit but the element type is {}-bit",
                volume.bits, self.element.bit_size
            ));
        }
        let expected_levels = self.lod_level_count.first().copied().unwrap_or(0);
        if volume.level_count() as u64 != expected_levels {
            return Err(format!(
                "expected {} LOD levels, found {}",
                expected_levels,
                volume.level_count()
            ));
        }

        let bytes_per_sample = self.element.bit_size / 8;
        let mut level_dims = dims;
        for (index, level) in volume.levels.iter().enumerate() {
            if U64Vec3::from_array(level.dims) != level_dims {
                return Err(format!(
                    "LOD level {} is {:?}, expected {}",
                    index, level.dims, level_dims
                ));
            }
            let counts = U64Vec3::new(
                level_dims.x.div_ceil(core.x),
                level_dims.y.div_ceil(core.y),
                level_dims.z.div_ceil(core.z),
            );
            if U64Vec3::from_array(level.brick_counts) != counts
                || level.bricks.len() as u64 != level.expected_brick_count()
            {
                return Err(format!(
                    "LOD level {} holds {} bricks, expected {}",
                    index,
                    level.bricks.len(),
                    counts.x * counts.y * counts.z
                ));
            }

            let mut covered = 0u64;
            for brick in &level.bricks {
                let payload = brick.payload().map_err(|e| e.to_string())?;
                if payload.len() as u64 != brick.voxel_count() * bytes_per_sample {
                    return Err(format!(
                        "brick at {:?} in LOD level {} has {} bytes for {} voxels",
                        brick.origin,
                        index,
                        payload.len(),
                        brick.voxel_count()
                    ));
                }
                covered += brick.core_extent.iter().product::<u64>();
            }
            if covered != level.voxel_count() {
                return Err(format!(
                    "bricks of LOD level {} cover {} of {} voxels",
                    index,
                    covered,
                    level.voxel_count()
                ));
            }
            level_dims = decimate(level_dims);
        }
        Ok(())
    }
}

fn identity() -> [f64; 16] {
    let mut m = [0.0; 16];
    for i in 0..4 {
        m[i * 5] = 1.0;
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::BrickSource;
    use crate::voxel::VolumeDimensions;

    fn plan() -> BrickPlan {
        BrickPlan::new(VolumeDimensions::new(40, 20, 10).unwrap(), 16, BrickSource::Raster).unwrap()
    }

    #[test]
    fn test_from_plan() {
        let block = RasterBlock::from_plan("Test Volume 1", &plan(), SampleFormat::U16);
        assert_eq!(block.dims(), Some(U64Vec3::new(40, 20, 10)));
        assert_eq!(block.lod_dec_factor, vec![2, 2, 2]);
        assert_eq!(block.lod_groups, vec![0, 0, 0]);
        assert_eq!(block.lod_level_count, vec![3]);
        assert_eq!(block.brick_overlap, vec![4, 4, 4]);
        assert_eq!(block.element.bit_size, 16);
        assert_eq!(block.scale(), DVec3::new(1.0, 2.0, 4.0));
        assert_eq!(block.transformation[15], 1.0);
    }

    #[test]
    fn test_verify_without_data() {
        let block = RasterBlock::from_plan("Test Volume 1", &plan(), SampleFormat::U8);
        assert_eq!(block.verify().unwrap_err(), "block holds no brick data");
    }

    #[test]
    fn test_verify_bad_descriptor() {
        let mut block = RasterBlock::from_plan("Test Volume 1", &plan(), SampleFormat::U8);
        block.brick_size.pop();
        assert!(block.verify().unwrap_err().contains("brick size"));

        let empty = RasterBlock::new("empty");
        assert!(empty.verify().is_err());
    }

    #[test]
    fn test_verify_lod_groups() {
        let mut block = RasterBlock::from_plan("Test Volume 1", &plan(), SampleFormat::U8);
        block.lod_groups = vec![1];
        assert!(block.verify().unwrap_err().contains("LOD groups has 1 entries"));

        block.lod_groups = vec![0, 0, 1];
        assert!(block.verify().unwrap_err().contains("do not match level counts"));

        block.lod_groups = vec![0, 2, 0];
        block.lod_level_count = vec![3, 3];
        assert!(block.verify().unwrap_err().contains("do not match level counts"));

        // A well-formed descriptor gets past the group checks
        let block = RasterBlock::from_plan("Test Volume 1", &plan(), SampleFormat::U8);
        assert_eq!(block.verify().unwrap_err(), "block holds no brick data");
    }
}
