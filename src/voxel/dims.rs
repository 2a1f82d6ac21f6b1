//! Volume dimensions

use std::fmt;

use glam::{DVec3, U64Vec3};

use crate::core::{Error, Result};
use super::sample::SampleFormat;

/// Voxel counts per axis; every component is positive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VolumeDimensions(U64Vec3);

impl VolumeDimensions {
    /// Create dimensions, rejecting zero-sized axes
    pub fn new(x: u64, y: u64, z: u64) -> Result<Self> {
        if x == 0 || y == 0 || z == 0 {
            return Err(Error::Config(format!(
                "Volume dimensions must be positive, got {}x{}x{}",
                x, y, z
            )));
        }
        Ok(Self(U64Vec3::new(x, y, z)))
    }

    /// Cubic volume of edge `n`
    pub fn cube(n: u64) -> Result<Self> {
        Self::new(n, n, n)
    }

    pub fn x(&self) -> u64 {
        self.0.x
    }

    pub fn y(&self) -> u64 {
        self.0.y
    }

    pub fn z(&self) -> u64 {
        self.0.z
    }

    pub fn as_uvec(&self) -> U64Vec3 {
        self.0
    }

    pub fn as_dvec(&self) -> DVec3 {
        self.0.as_dvec3()
    }

    pub fn to_array(&self) -> [u64; 3] {
        self.0.to_array()
    }

    pub fn max_dim(&self) -> u64 {
        self.0.max_element()
    }

    /// Number of voxels, `None` on overflow
    pub fn voxel_count(&self) -> Option<u64> {
        self.0.x.checked_mul(self.0.y)?.checked_mul(self.0.z)
    }

    /// Size of the packed raw volume in bytes
    pub fn byte_size(&self, format: SampleFormat) -> Result<u64> {
        self.voxel_count()
            .and_then(|n| n.checked_mul(format.bytes()))
            .ok_or_else(|| Error::Config(format!("Volume {} is too large to address", self)))
    }
}

impl fmt::Display for VolumeDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.0.x, self.0.y, self.0.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero() {
        assert!(VolumeDimensions::new(0, 4, 4).is_err());
        assert!(VolumeDimensions::new(4, 0, 4).is_err());
        assert!(VolumeDimensions::new(4, 4, 0).is_err());
        assert!(VolumeDimensions::new(1, 1, 1).is_ok());
    }

    #[test]
    fn test_byte_size() {
        let dims = VolumeDimensions::new(64, 32, 16).unwrap();
        assert_eq!(dims.voxel_count(), Some(64 * 32 * 16));
        assert_eq!(dims.byte_size(SampleFormat::U8).unwrap(), 32768);
        assert_eq!(dims.byte_size(SampleFormat::U16).unwrap(), 65536);
        assert_eq!(dims.max_dim(), 64);
    }

    #[test]
    fn test_overflow() {
        let dims = VolumeDimensions::new(u64::MAX, 2, 1).unwrap();
        assert!(dims.voxel_count().is_none());
        assert!(dims.byte_size(SampleFormat::U8).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(VolumeDimensions::new(3, 4, 5).unwrap().to_string(), "3x4x5");
    }
}
