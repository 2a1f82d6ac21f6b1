//! Container blocks
//!
//! Every block is an id string, a semantic tag, a compression tag and an
//! rkyv-encoded payload. The set of block kinds is closed.

use rkyv::{Archive, Deserialize, Serialize};

use crate::bricking::BrickedVolume;
use crate::core::{Error, Result};
use crate::histogram::{Histogram1D, Histogram2D};
use super::keyvalue::KeyValueBlock;
use super::maxmin::MaxMinBlock;
use super::raster::RasterBlock;
use super::toc::TocBlock;

/// Block payload compression
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Archive, Deserialize, Serialize)]
pub enum CompressionScheme {
    #[default]
    None,
    Lz4,
}

impl CompressionScheme {
    pub fn tag(self) -> u64 {
        match self {
            CompressionScheme::None => 0,
            CompressionScheme::Lz4 => 1,
        }
    }
}

/// What a block holds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockSemantic {
    Empty,
    RegularNDimGrid,
    Toc,
    Histogram1D,
    Histogram2D,
    MaxMinData,
    KeyValuePairs,
}

impl BlockSemantic {
    pub fn tag(self) -> u64 {
        match self {
            BlockSemantic::Empty => 0,
            BlockSemantic::RegularNDimGrid => 1,
            BlockSemantic::Toc => 2,
            BlockSemantic::Histogram1D => 3,
            BlockSemantic::Histogram2D => 4,
            BlockSemantic::MaxMinData => 5,
            BlockSemantic::KeyValuePairs => 6,
        }
    }
}

/// Block with an id and no payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaceholderBlock {
    pub block_id: String,
    pub compression: CompressionScheme,
}

impl PlaceholderBlock {
    pub fn new(block_id: impl Into<String>, compression: CompressionScheme) -> Self {
        Self { block_id: block_id.into(), compression }
    }
}

pub const HISTOGRAM_1D_ID: &str = "1D Histogram";
pub const HISTOGRAM_2D_ID: &str = "2D Histogram";
pub const ACCELERATION_ID: &str = "Brick Min/Max";
pub const METADATA_ID: &str = "Metadata";

#[derive(Clone, Debug, PartialEq)]
pub enum ContainerBlock {
    Placeholder(PlaceholderBlock),
    Raster(RasterBlock),
    Toc(TocBlock),
    Histogram1D(Histogram1D),
    Histogram2D(Histogram2D),
    MaxMin(MaxMinBlock),
    KeyValue(KeyValueBlock),
}

impl ContainerBlock {
    pub fn block_id(&self) -> &str {
        match self {
            ContainerBlock::Placeholder(b) => &b.block_id,
            ContainerBlock::Raster(b) => &b.block_id,
            ContainerBlock::Toc(b) => &b.block_id,
            ContainerBlock::Histogram1D(_) => HISTOGRAM_1D_ID,
            ContainerBlock::Histogram2D(_) => HISTOGRAM_2D_ID,
            ContainerBlock::MaxMin(_) => ACCELERATION_ID,
            ContainerBlock::KeyValue(_) => METADATA_ID,
        }
    }

    pub fn semantic(&self) -> BlockSemantic {
        match self {
            ContainerBlock::Placeholder(_) => BlockSemantic::Empty,
            ContainerBlock::Raster(_) => BlockSemantic::RegularNDimGrid,
            ContainerBlock::Toc(_) => BlockSemantic::Toc,
            ContainerBlock::Histogram1D(_) => BlockSemantic::Histogram1D,
            ContainerBlock::Histogram2D(_) => BlockSemantic::Histogram2D,
            ContainerBlock::MaxMin(_) => BlockSemantic::MaxMinData,
            ContainerBlock::KeyValue(_) => BlockSemantic::KeyValuePairs,
        }
    }

    pub fn compression(&self) -> CompressionScheme {
        match self {
            ContainerBlock::Placeholder(b) => b.compression,
            ContainerBlock::Raster(b) => b.compression,
            ContainerBlock::Toc(b) => b.compression,
            _ => CompressionScheme::None,
        }
    }

    /// The bricked volume of a payload block
    pub fn volume(&self) -> Option<&BrickedVolume> {
        match self {
            ContainerBlock::Raster(b) => b.volume.as_ref(),
            ContainerBlock::Toc(b) => Some(&b.volume),
            _ => None,
        }
    }

    /// Structural check run before a block is accepted
    pub fn verify(&self) -> std::result::Result<(), String> {
        match self {
            ContainerBlock::Raster(b) => b.verify(),
            ContainerBlock::Toc(b) => b.verify(),
            _ => Ok(()),
        }
    }

    /// Serialized payload, compressed per [`ContainerBlock::compression`]
    pub fn encode_payload(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            ContainerBlock::Placeholder(_) => Ok(Vec::new()),
            ContainerBlock::Raster(b) => rkyv::to_bytes::<rkyv::rancor::Error>(b).map(|v| v.to_vec()),
            ContainerBlock::Toc(b) => rkyv::to_bytes::<rkyv::rancor::Error>(b).map(|v| v.to_vec()),
            ContainerBlock::Histogram1D(b) => rkyv::to_bytes::<rkyv::rancor::Error>(b).map(|v| v.to_vec()),
            ContainerBlock::Histogram2D(b) => rkyv::to_bytes::<rkyv::rancor::Error>(b).map(|v| v.to_vec()),
            ContainerBlock::MaxMin(b) => rkyv::to_bytes::<rkyv::rancor::Error>(b).map(|v| v.to_vec()),
            ContainerBlock::KeyValue(b) => rkyv::to_bytes::<rkyv::rancor::Error>(b).map(|v| v.to_vec()),
        }
        .map_err(|e| Error::Assembly(format!("Failed to encode block '{}': {}", self.block_id(), e)))?;

        Ok(match self.compression() {
            CompressionScheme::Lz4 if !bytes.is_empty() => lz4_flex::compress_prepend_size(&bytes),
            _ => bytes,
        })
    }
}

impl From<PlaceholderBlock> for ContainerBlock {
    fn from(block: PlaceholderBlock) -> Self {
        ContainerBlock::Placeholder(block)
    }
}

impl From<RasterBlock> for ContainerBlock {
    fn from(block: RasterBlock) -> Self {
        ContainerBlock::Raster(block)
    }
}

impl From<TocBlock> for ContainerBlock {
    fn from(block: TocBlock) -> Self {
        ContainerBlock::Toc(block)
    }
}

impl From<Histogram1D> for ContainerBlock {
    fn from(block: Histogram1D) -> Self {
        ContainerBlock::Histogram1D(block)
    }
}

impl From<Histogram2D> for ContainerBlock {
    fn from(block: Histogram2D) -> Self {
        ContainerBlock::Histogram2D(block)
    }
}

impl From<MaxMinBlock> for ContainerBlock {
    fn from(block: MaxMinBlock) -> Self {
        ContainerBlock::MaxMin(block)
    }
}

impl From<KeyValueBlock> for ContainerBlock {
    fn from(block: KeyValueBlock) -> Self {
        ContainerBlock::KeyValue(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::maxmin::MaxMin;

    #[test]
    fn test_placeholder() {
        let block: ContainerBlock = PlaceholderBlock::new("Test Block 2", CompressionScheme::Lz4).into();
        assert_eq!(block.block_id(), "Test Block 2");
        assert_eq!(block.semantic(), BlockSemantic::Empty);
        assert_eq!(block.compression(), CompressionScheme::Lz4);
        assert!(block.encode_payload().unwrap().is_empty());
        assert!(block.volume().is_none());
    }

    #[test]
    fn test_fixed_ids() {
        let block: ContainerBlock = KeyValueBlock::new().into();
        assert_eq!(block.block_id(), METADATA_ID);
        assert_eq!(block.semantic().tag(), 6);
    }

    #[test]
    fn test_encode_decodes_back() {
        let mut maxmin = MaxMinBlock::new(1);
        maxmin.push_brick(MaxMin::new(1.0, 9.0));
        let block = ContainerBlock::from(maxmin.clone());

        let bytes = block.encode_payload().expect("encode failed");
        let mut aligned = rkyv::util::AlignedVec::<16>::new();
        aligned.extend_from_slice(&bytes);
        let decoded = rkyv::from_bytes::<MaxMinBlock, rkyv::rancor::Error>(&aligned).expect("decode failed");
        assert_eq!(decoded, maxmin);
    }
}
