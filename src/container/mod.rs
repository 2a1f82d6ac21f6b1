//! Checksummed, block-structured volume container

pub mod header;
pub mod block;
pub mod raster;
pub mod toc;
pub mod maxmin;
pub mod keyvalue;
pub mod writer;

pub use header::{ChecksumScheme, Endianness, GlobalHeader};
pub use block::{BlockSemantic, CompressionScheme, ContainerBlock, PlaceholderBlock};
pub use raster::{DomainSemantic, ElementType, RasterBlock};
pub use toc::TocBlock;
pub use maxmin::{MaxMin, MaxMinBlock};
pub use keyvalue::KeyValueBlock;
pub use writer::{ContainerFile, CONTAINER_EXTENSION};
