//! Container global header

use md5::{Digest, Md5};

/// File signature
pub const MAGIC: [u8; 8] = *b"VSYNVOL\0";

/// Layout version written into every container
pub const FORMAT_VERSION: u64 = 1;

/// Content digest embedded in the header
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u64)]
pub enum ChecksumScheme {
    #[default]
    None = 0,
    Md5 = 1,
}

impl ChecksumScheme {
    pub fn tag(self) -> u64 {
        self as u64
    }

    /// Digest length in bytes
    pub fn digest_len(self) -> usize {
        match self {
            ChecksumScheme::None => 0,
            ChecksumScheme::Md5 => <Md5 as Digest>::output_size(),
        }
    }
}

/// Byte order the payload samples were written in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    pub fn host() -> Self {
        if cfg!(target_endian = "little") {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Endianness::Little => "little",
            Endianness::Big => "big",
        }
    }

    pub fn flag(self) -> u8 {
        match self {
            Endianness::Little => 0,
            Endianness::Big => 1,
        }
    }
}

/// Container-wide settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlobalHeader {
    pub checksum: ChecksumScheme,
    pub endianness: Endianness,
    pub format_version: u64,
}

impl Default for GlobalHeader {
    fn default() -> Self {
        Self {
            checksum: ChecksumScheme::None,
            endianness: Endianness::host(),
            format_version: FORMAT_VERSION,
        }
    }
}

impl GlobalHeader {
    pub fn with_checksum(checksum: ChecksumScheme) -> Self {
        Self { checksum, ..Default::default() }
    }

    /// Offset of the digest field from the start of the file
    pub fn digest_offset() -> u64 {
        // magic, version, endianness flag, checksum tag, digest length
        (MAGIC.len() + 8 + 1 + 8 + 8) as u64
    }
}
