//! Scalar sample formats

use bytemuck::Pod;
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Bit width of the unsigned integer samples written for a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    U8,
    U16,
}

impl SampleFormat {
    /// Parse a bit width (8 or 16)
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(SampleFormat::U8),
            16 => Ok(SampleFormat::U16),
            other => Err(Error::Config(format!("Invalid bit width {} (expected 8 or 16)", other))),
        }
    }

    pub fn bits(&self) -> u32 {
        match self {
            SampleFormat::U8 => 8,
            SampleFormat::U16 => 16,
        }
    }

    pub fn bytes(&self) -> u64 {
        self.bits() as u64 / 8
    }

    /// Largest representable sample value
    pub fn max_value(&self) -> u32 {
        match self {
            SampleFormat::U8 => u8::MAX as u32,
            SampleFormat::U16 => u16::MAX as u32,
        }
    }
}

/// A concrete sample type the generator can write
///
/// Rows of samples are reinterpreted as bytes in host order when they are
/// written to the backing store.
pub trait Sample: Pod + Default + PartialOrd + Send + Sync + 'static {
    const FORMAT: SampleFormat;

    /// Largest value as f64, used to rescale unit field outputs
    fn max_f64() -> f64;

    /// Truncating, saturating conversion from f64
    fn from_f64(v: f64) -> Self;

    fn to_f64(self) -> f64;

    fn to_usize(self) -> usize;
}

impl Sample for u8 {
    const FORMAT: SampleFormat = SampleFormat::U8;

    #[inline]
    fn max_f64() -> f64 {
        u8::MAX as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as u8
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn to_usize(self) -> usize {
        self as usize
    }
}

impl Sample for u16 {
    const FORMAT: SampleFormat = SampleFormat::U16;

    #[inline]
    fn max_f64() -> f64 {
        u16::MAX as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as u16
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn to_usize(self) -> usize {
        self as usize
    }
}
