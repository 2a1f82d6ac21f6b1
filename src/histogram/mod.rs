//! Derived histograms over a bricked payload

pub mod hist1d;
pub mod hist2d;

pub use hist1d::Histogram1D;
pub use hist2d::{Histogram2D, GRADIENT_BINS};

use crate::bricking::BrickedVolume;
use crate::core::Result;

/// Computes the derived histogram blocks of a payload
pub trait HistogramEngine {
    fn compute_1d(&self, volume: &BrickedVolume, component: usize) -> Result<Histogram1D>;

    fn compute_2d(
        &self,
        volume: &BrickedVolume,
        component: usize,
        bucket_count: usize,
        global_max: f64,
    ) -> Result<Histogram2D>;
}

/// Value histogram plus value/gradient-magnitude joint histogram
#[derive(Debug, Default, Clone, Copy)]
pub struct GradientHistograms;

impl HistogramEngine for GradientHistograms {
    fn compute_1d(&self, volume: &BrickedVolume, component: usize) -> Result<Histogram1D> {
        Histogram1D::compute(volume, component)
    }

    fn compute_2d(
        &self,
        volume: &BrickedVolume,
        component: usize,
        bucket_count: usize,
        global_max: f64,
    ) -> Result<Histogram2D> {
        Histogram2D::compute(volume, component, bucket_count, global_max)
    }
}
