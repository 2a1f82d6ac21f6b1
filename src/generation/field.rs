//! Procedural scalar fields
//!
//! Two built-in fields map a voxel position to a unit intensity in `[0, 1]`:
//! - `RadialFalloff`: brightest at the grid center, falling off linearly with
//!   the distance in normalized `[0, 1]` coordinates
//! - `Mandelbulb`: escape-time fraction of the power-n Mandelbulb iteration
//!   sampled over `[-1.125, 1.125]` per axis
//!
//! All math runs in double precision; the writer rescales the unit value to
//! the sample type's range.

use glam::{DVec3, U64Vec3};
use serde::{Deserialize, Serialize};

use crate::voxel::{Sample, VolumeDimensions};

/// Half extent of the Mandelbulb sampling cube
pub const MANDELBULB_EXTENT: f64 = 1.125;

/// Parameters of the Mandelbulb iteration
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MandelbulbParams {
    /// Exponent n of the iteration
    pub power: u32,
    /// Iteration cap; `None` uses the sample type's maximum value
    pub max_iterations: Option<u32>,
    /// Escape radius
    pub bailout: f64,
}

impl Default for MandelbulbParams {
    fn default() -> Self {
        Self {
            power: 8,
            max_iterations: None,
            bailout: 4.0,
        }
    }
}

impl MandelbulbParams {
    /// Iteration cap for sample type `T`
    pub fn iterations_for<T: Sample>(&self) -> u32 {
        self.max_iterations.unwrap_or(T::max_f64() as u32)
    }
}

/// The built-in fields
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    RadialFalloff,
    Mandelbulb(MandelbulbParams),
}

impl FieldKind {
    pub fn mandelbulb() -> Self {
        FieldKind::Mandelbulb(MandelbulbParams::default())
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::RadialFalloff => "radial falloff",
            FieldKind::Mandelbulb(_) => "mandelbulb",
        }
    }

    /// Evaluate the field at voxel `v` and rescale it to `T`
    #[inline]
    pub fn sample<T: Sample>(&self, v: U64Vec3, dims: VolumeDimensions) -> T {
        let unit = match self {
            FieldKind::RadialFalloff => radial_falloff(unit_position(v, dims)),
            FieldKind::Mandelbulb(params) => mandelbulb(
                mandelbulb_position(v, dims),
                params.power,
                params.iterations_for::<T>(),
                params.bailout,
            ),
        };
        T::from_f64(unit * T::max_f64())
    }
}

/// Voxel index divided by the volume extent, in `[0, 1)` per axis
#[inline]
pub fn unit_position(v: U64Vec3, dims: VolumeDimensions) -> DVec3 {
    v.as_dvec3() / dims.as_dvec()
}

/// Voxel index mapped linearly onto `[-1.125, 1.125]` per axis
///
/// Uses `index / (extent - 1)`, so both end voxels land on the cube faces.
/// A single-voxel axis samples the cube center.
#[inline]
pub fn mandelbulb_position(v: U64Vec3, dims: VolumeDimensions) -> DVec3 {
    let axis = |i: u64, n: u64| {
        if n <= 1 {
            0.0
        } else {
            2.0 * MANDELBULB_EXTENT * i as f64 / (n - 1) as f64 - MANDELBULB_EXTENT
        }
    };
    DVec3::new(
        axis(v.x, dims.x()),
        axis(v.y, dims.y()),
        axis(v.z, dims.z()),
    )
}

/// Radial falloff around `(0.5, 0.5, 0.5)`, clamped at zero
///
/// Returns 1.0 at the center and 0.0 at distance 0.5 and beyond.
#[inline]
pub fn radial_falloff(p: DVec3) -> f64 {
    let d = (DVec3::splat(0.5) - p).length();
    ((0.5 - d) * 2.0).max(0.0)
}

/// Escape-time fraction of the Mandelbulb iteration started at the origin
///
/// Returns `i / max_iterations` for the iteration `i` at which the iterate
/// left the `bailout` radius, or 1.0 if it never did.
pub fn mandelbulb(s: DVec3, power: u32, max_iterations: u32, bailout: f64) -> f64 {
    let n = power as f64;
    let mut f = DVec3::ZERO;

    for i in 0..max_iterations {
        let r = f.length();
        let theta = (f.x * f.x + f.y * f.y).sqrt().atan2(f.z);
        let phi = f.y.atan2(f.x);
        let rn = r.powf(n);

        f = DVec3::new(
            s.x + rn * (n * theta).sin() * (n * phi).cos(),
            s.y + rn * (n * theta).sin() * (n * phi).sin(),
            s.z + rn * (n * theta).cos(),
        );

        if f.length() > bailout {
            return i as f64 / max_iterations as f64;
        }
    }

    1.0
}
