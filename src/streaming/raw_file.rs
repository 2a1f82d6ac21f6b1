//! Raw volume file I/O
//!
//! The raw intermediate is a headerless file of packed samples in row-major
//! order (x fastest, then y, then z), written in host byte order.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Extension of the raw intermediate file
pub const RAW_EXTENSION: &str = "raw";

/// Random-access store the generated volume is streamed into
pub trait BackingStore {
    /// Location of the store on disk
    fn path(&self) -> &Path;

    /// Create (or truncate) the store, reserving `size_bytes`, and open it for appending
    fn create(&mut self, size_bytes: u64) -> io::Result<()>;

    /// Open an existing store; the append cursor starts at offset 0
    fn open(&mut self) -> io::Result<()>;

    /// Write `bytes` at the append cursor and advance it
    fn append_row(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Fill `buf` from absolute `offset`
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Current size in bytes
    fn len(&self) -> io::Result<u64>;

    /// Flush and release the handle; closing twice is a no-op
    fn close(&mut self) -> io::Result<()>;

    /// Close and remove the store from disk
    fn delete(&mut self) -> io::Result<()>;
}

/// File-backed [`BackingStore`]
pub struct LargeRawFile {
    path: PathBuf,
    handle: Option<BufWriter<File>>,
}

impl std::fmt::Debug for LargeRawFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LargeRawFile")
            .field("path", &self.path)
            .field("open", &self.handle.is_some())
            .finish()
    }
}

impl LargeRawFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            handle: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn handle_mut(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.handle.as_mut().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} is not open", self.path.display()),
            )
        })
    }
}

impl BackingStore for LargeRawFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn create(&mut self, size_bytes: u64) -> io::Result<()> {
        self.close()?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        file.set_len(size_bytes)?;
        self.handle = Some(BufWriter::new(file));
        Ok(())
    }

    fn open(&mut self) -> io::Result<()> {
        self.close()?;
        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        self.handle = Some(BufWriter::new(file));
        Ok(())
    }

    fn append_row(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.handle_mut()?.write_all(bytes)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let handle = self.handle_mut()?;
        handle.flush()?;
        let file = handle.get_mut();
        let cursor = file.stream_position()?;
        file.seek(SeekFrom::Start(offset))?;
        let result = file.read_exact(buf);
        file.seek(SeekFrom::Start(cursor))?;
        result
    }

    fn len(&self) -> io::Result<u64> {
        match &self.handle {
            Some(handle) => Ok(handle.get_ref().metadata()?.len()),
            None => Ok(std::fs::metadata(&self.path)?.len()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        if let Some(mut handle) = self.handle.take() {
            handle.flush()?;
        }
        Ok(())
    }

    fn delete(&mut self) -> io::Result<()> {
        // Drop without flushing, the data is going away
        self.handle = None;
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Drop for LargeRawFile {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to flush {}: {}", self.path.display(), e);
        }
    }
}

/// Raw intermediate path for `output`
///
/// A container output keeps its raw data beside it with the `raw` extension;
/// any other output path is itself the raw file.
pub fn raw_path_for(output: &Path, container_extension: &str) -> PathBuf {
    if has_extension(output, container_extension) {
        output.with_extension(RAW_EXTENSION)
    } else {
        output.to_path_buf()
    }
}

/// Case-insensitive extension check
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}
