//! Table-of-contents payload block

use rkyv::{Archive, Deserialize, Serialize};

use crate::bricking::BrickedVolume;
use super::block::CompressionScheme;

/// Brick hierarchy built straight from a flat raw file
#[derive(Clone, Debug, PartialEq, Archive, Deserialize, Serialize)]
pub struct TocBlock {
    pub block_id: String,
    pub compression: CompressionScheme,
    pub dims: [u64; 3],
    pub voxel_spacing: [f64; 3],
    pub volume: BrickedVolume,
}

impl TocBlock {
    pub fn new(block_id: impl Into<String>, dims: [u64; 3], voxel_spacing: [f64; 3], volume: BrickedVolume) -> Self {
        Self {
            block_id: block_id.into(),
            compression: CompressionScheme::None,
            dims,
            voxel_spacing,
            volume,
        }
    }

    pub fn verify(&self) -> Result<(), String> {
        let finest = self.volume.finest().ok_or("TOC holds no LOD levels")?;
        if finest.dims != self.dims {
            return Err(format!(
                "finest LOD level is {:?}, expected {:?}",
                finest.dims, self.dims
            ));
        }
        for (index, level) in self.volume.levels.iter().enumerate() {
            if level.bricks.len() as u64 != level.expected_brick_count() {
                return Err(format!(
                    "LOD level {} holds {} bricks, expected {}",
                    index,
                    level.bricks.len(),
                    level.expected_brick_count()
                ));
            }
            let covered: u64 = level.bricks.iter().map(|b| b.core_extent.iter().product::<u64>()).sum();
            if covered != level.voxel_count() {
                return Err(format!(
                    "bricks of LOD level {} cover {} of {} voxels",
                    index,
                    covered,
                    level.voxel_count()
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bricking::LodLevel;

    fn volume(levels: Vec<LodLevel>) -> BrickedVolume {
        BrickedVolume {
            bits: 8,
            component_count: 1,
            brick_size: 8,
            brick_overlap: 2,
            levels,
        }
    }

    #[test]
    fn test_verify() {
        let level = LodLevel { dims: [4, 4, 4], brick_counts: [1, 1, 1], bricks: Vec::new() };
        let toc = TocBlock::new("Test TOC Volume 1", [4, 4, 4], [1.0; 3], volume(vec![level.clone()]));
        assert!(toc.verify().unwrap_err().contains("holds 0 bricks"));

        let empty = TocBlock::new("Test TOC Volume 1", [4, 4, 4], [1.0; 3], volume(Vec::new()));
        assert!(empty.verify().is_err());

        let wrong_dims = TocBlock::new("Test TOC Volume 1", [8, 4, 4], [1.0; 3], volume(vec![level]));
        assert!(wrong_dims.verify().unwrap_err().contains("finest"));
    }

    #[test]
    fn test_verify_zero_brick_grid() {
        let level = LodLevel { dims: [4, 4, 4], brick_counts: [0, 0, 0], bricks: Vec::new() };
        let toc = TocBlock::new("Test TOC Volume 1", [4, 4, 4], [1.0; 3], volume(vec![level]));
        assert!(toc.verify().unwrap_err().contains("cover 0 of 64"));
    }
}
