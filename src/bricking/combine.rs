//! Sample combiners used while building LOD levels

use crate::container::maxmin::MaxMin;
use crate::voxel::Sample;

/// Reduces the voxels of one decimation cell to a single sample
pub type CombineFn<T> = fn(&[T]) -> T;

/// Extracts the value range of a brick
pub type MaxMinFn<T> = fn(&[T]) -> MaxMin;

/// Rounded mean of `values`; default sample for an empty slice
pub fn combine_average<T: Sample>(values: &[T]) -> T {
    if values.is_empty() {
        return T::default();
    }
    let sum: f64 = values.iter().map(|v| v.to_f64()).sum();
    T::from_f64((sum / values.len() as f64).round())
}

/// Smallest and largest value in `values`
pub fn simple_max_min<T: Sample>(values: &[T]) -> MaxMin {
    values
        .iter()
        .fold(MaxMin::EMPTY, |acc, v| acc.include(v.to_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_average() {
        assert_eq!(combine_average::<u8>(&[0, 255]), 128);
        assert_eq!(combine_average::<u8>(&[10, 10, 10, 10, 10, 10, 10, 10]), 10);
        assert_eq!(combine_average::<u16>(&[1000, 2000, 3001]), 2000);
        assert_eq!(combine_average::<u16>(&[]), 0);
    }

    #[test]
    fn test_average_stays_in_range() {
        assert_eq!(combine_average::<u16>(&[u16::MAX; 8]), u16::MAX);
    }

    #[test]
    fn test_simple_max_min() {
        let mm = simple_max_min::<u8>(&[7, 3, 200, 9]);
        assert_eq!(mm.min_scalar, 3.0);
        assert_eq!(mm.max_scalar, 200.0);
        assert!(simple_max_min::<u16>(&[]).is_empty());
    }
}
