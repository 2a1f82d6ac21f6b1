//! Container file writer
//!
//! Blocks are collected in memory and written in one pass by
//! [`ContainerFile::create`]. Layout, all integers little-endian:
//!
//! ```text
//! magic[8] | version u64 | endianness u8 | checksum tag u64 | digest len u64 | digest
//! block count u64
//! per block: id len u64 | id | semantic u64 | compression u64 | payload len u64 | payload
//! ```
//!
//! The digest covers every byte after the digest field and is patched in
//! once all blocks are written.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use md5::{Digest, Md5};

use crate::core::{Error, Result};
use super::block::ContainerBlock;
use super::header::{ChecksumScheme, GlobalHeader, MAGIC};

/// Extension of container files
pub const CONTAINER_EXTENSION: &str = "uvf";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FileState {
    Open,
    Written,
    Closed,
}

/// Forwards writes and feeds them to the digest
struct HashingWriter<W: Write> {
    inner: W,
    hasher: Option<Md5>,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W, scheme: ChecksumScheme) -> Self {
        let hasher = match scheme {
            ChecksumScheme::None => None,
            ChecksumScheme::Md5 => Some(Md5::new()),
        };
        Self { inner, hasher }
    }

    fn finish(self) -> (W, Vec<u8>) {
        let digest = self.hasher.map(|h| h.finalize().to_vec()).unwrap_or_default();
        (self.inner, digest)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(&buf[..n]);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// A container being assembled
#[derive(Debug)]
pub struct ContainerFile {
    path: PathBuf,
    header: GlobalHeader,
    blocks: Vec<ContainerBlock>,
    state: FileState,
}

impl ContainerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            header: GlobalHeader::default(),
            blocks: Vec::new(),
            state: FileState::Open,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &GlobalHeader {
        &self.header
    }

    pub fn set_global_header(&mut self, header: GlobalHeader) {
        self.header = header;
    }

    pub fn blocks(&self) -> &[ContainerBlock] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&ContainerBlock> {
        self.blocks.get(index)
    }

    pub fn is_closed(&self) -> bool {
        self.state == FileState::Closed
    }

    /// Append a block; returns its index
    pub fn add_block(&mut self, block: impl Into<ContainerBlock>) -> Result<usize> {
        let block = block.into();
        if self.state != FileState::Open {
            return Err(Error::Assembly(format!(
                "Cannot add block '{}' to {}: container is already finalized",
                block.block_id(),
                self.path.display()
            )));
        }
        if block.block_id().is_empty() {
            return Err(Error::Assembly("Block id must not be empty".to_string()));
        }
        block.verify().map_err(|reason| {
            Error::Assembly(format!("Block '{}' is inconsistent: {}", block.block_id(), reason))
        })?;

        self.blocks.push(block);
        Ok(self.blocks.len() - 1)
    }

    /// Write the container to disk; returns the file size
    ///
    /// A partially written file is removed on failure.
    pub fn create(&mut self) -> Result<u64> {
        if self.state != FileState::Open {
            return Err(Error::creation(&self.path, "container was already written or closed"));
        }

        match self.write_all() {
            Ok(size) => {
                self.state = FileState::Written;
                log::debug!(
                    "Wrote {} ({} blocks, {} bytes)",
                    self.path.display(),
                    self.blocks.len(),
                    size
                );
                Ok(size)
            }
            Err(e) => {
                if let Err(remove) = std::fs::remove_file(&self.path) {
                    if remove.kind() != io::ErrorKind::NotFound {
                        log::warn!("Failed to remove partial {}: {}", self.path.display(), remove);
                    }
                }
                Err(Error::creation(&self.path, e))
            }
        }
    }

    fn write_all(&self) -> Result<u64> {
        let file = File::create(&self.path)?;
        let mut out = BufWriter::new(file);
        let scheme = self.header.checksum;

        out.write_all(&MAGIC)?;
        out.write_u64::<LittleEndian>(self.header.format_version)?;
        out.write_u8(self.header.endianness.flag())?;
        out.write_u64::<LittleEndian>(scheme.tag())?;
        out.write_u64::<LittleEndian>(scheme.digest_len() as u64)?;
        out.write_all(&vec![0u8; scheme.digest_len()])?;

        let mut hashed = HashingWriter::new(out, scheme);
        hashed.write_u64::<LittleEndian>(self.blocks.len() as u64)?;
        for block in &self.blocks {
            let payload = block.encode_payload()?;
            let id = block.block_id().as_bytes();
            hashed.write_u64::<LittleEndian>(id.len() as u64)?;
            hashed.write_all(id)?;
            hashed.write_u64::<LittleEndian>(block.semantic().tag())?;
            hashed.write_u64::<LittleEndian>(block.compression().tag())?;
            hashed.write_u64::<LittleEndian>(payload.len() as u64)?;
            hashed.write_all(&payload)?;
        }

        let (mut out, digest) = hashed.finish();
        let size = out.stream_position()?;
        if !digest.is_empty() {
            out.seek(SeekFrom::Start(GlobalHeader::digest_offset()))?;
            out.write_all(&digest)?;
        }
        out.flush()?;
        out.get_ref().sync_all()?;
        Ok(size)
    }

    /// Release the container; no further blocks are accepted
    pub fn close(&mut self) {
        self.state = FileState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::block::{CompressionScheme, PlaceholderBlock};
    use super::super::keyvalue::KeyValueBlock;
    use super::super::raster::RasterBlock;
    use byteorder::{ByteOrder, LittleEndian};
    use tempfile::TempDir;

    fn placeholder(id: &str) -> PlaceholderBlock {
        PlaceholderBlock::new(id, CompressionScheme::None)
    }

    #[test]
    fn test_md5_covers_blocks() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("test.uvf");

        let mut container = ContainerFile::new(&path);
        container.set_global_header(GlobalHeader::with_checksum(ChecksumScheme::Md5));
        container.add_block(placeholder("Test Block 1")).unwrap();
        let mut meta = KeyValueBlock::new();
        meta.add_pair("Source Type", "integer");
        container.add_block(meta).unwrap();

        let size = container.create().expect("create failed");
        container.close();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len() as u64, size);
        assert_eq!(&bytes[..8], &MAGIC);
        assert_eq!(LittleEndian::read_u64(&bytes[17..25]), ChecksumScheme::Md5.tag());
        assert_eq!(LittleEndian::read_u64(&bytes[25..33]), 16);

        let digest = &bytes[33..49];
        let expected = Md5::digest(&bytes[49..]);
        assert_eq!(digest, expected.as_slice());
        assert_eq!(LittleEndian::read_u64(&bytes[49..57]), 2);
    }

    #[test]
    fn test_no_checksum_layout() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("plain.uvf");

        let mut container = ContainerFile::new(&path);
        container.add_block(placeholder("Test Block 1")).unwrap();
        container.create().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(LittleEndian::read_u64(&bytes[25..33]), 0);
        assert_eq!(LittleEndian::read_u64(&bytes[33..41]), 1);
        let id_len = LittleEndian::read_u64(&bytes[41..49]) as usize;
        assert_eq!(&bytes[49..49 + id_len], b"Test Block 1");
    }

    #[test]
    fn test_add_block_rejections() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut container = ContainerFile::new(temp_dir.path().join("reject.uvf"));

        assert!(matches!(container.add_block(placeholder("")), Err(Error::Assembly(_))));
        // Raster without brick data fails verification
        assert!(matches!(
            container.add_block(RasterBlock::new("Test Volume 1")),
            Err(Error::Assembly(_))
        ));
        assert_eq!(container.add_block(placeholder("ok")).unwrap(), 0);

        container.close();
        assert!(container.is_closed());
        assert!(matches!(container.add_block(placeholder("late")), Err(Error::Assembly(_))));
        assert!(matches!(container.create(), Err(Error::ResourceCreation { .. })));
        assert_eq!(container.blocks().len(), 1);
    }

    #[test]
    fn test_create_twice_fails() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut container = ContainerFile::new(temp_dir.path().join("twice.uvf"));
        container.create().unwrap();
        assert!(container.create().is_err());
        assert!(container.add_block(placeholder("late")).is_err());
    }

    #[test]
    fn test_create_in_missing_directory() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("missing").join("x.uvf");
        let mut container = ContainerFile::new(&path);
        assert!(matches!(container.create(), Err(Error::ResourceCreation { .. })));
        assert!(!path.exists());
    }
}
