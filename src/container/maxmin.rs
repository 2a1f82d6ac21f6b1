//! Min/max acceleration data

use rkyv::{Archive, Deserialize, Serialize};

/// Value range of a region
#[derive(Clone, Copy, Debug, PartialEq, Archive, Deserialize, Serialize)]
pub struct MaxMin {
    pub min_scalar: f64,
    pub max_scalar: f64,
}

impl MaxMin {
    /// Range containing nothing; the identity of [`MaxMin::merge`]
    pub const EMPTY: MaxMin = MaxMin {
        min_scalar: f64::INFINITY,
        max_scalar: f64::NEG_INFINITY,
    };

    pub fn new(min_scalar: f64, max_scalar: f64) -> Self {
        Self { min_scalar, max_scalar }
    }

    pub fn is_empty(&self) -> bool {
        self.min_scalar > self.max_scalar
    }

    pub fn include(self, value: f64) -> Self {
        Self {
            min_scalar: self.min_scalar.min(value),
            max_scalar: self.max_scalar.max(value),
        }
    }

    pub fn merge(self, other: MaxMin) -> Self {
        Self {
            min_scalar: self.min_scalar.min(other.min_scalar),
            max_scalar: self.max_scalar.max(other.max_scalar),
        }
    }
}

impl Default for MaxMin {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Global and per-brick value ranges, bricks in the order they were produced
#[derive(Clone, Debug, Default, PartialEq, Archive, Deserialize, Serialize)]
pub struct MaxMinBlock {
    pub component_count: u64,
    pub global: MaxMin,
    pub bricks: Vec<MaxMin>,
}

impl MaxMinBlock {
    pub fn new(component_count: u64) -> Self {
        Self {
            component_count,
            global: MaxMin::EMPTY,
            bricks: Vec::new(),
        }
    }

    pub fn push_brick(&mut self, range: MaxMin) {
        self.global = self.global.merge(range);
        self.bricks.push(range);
    }

    pub fn brick_count(&self) -> usize {
        self.bricks.len()
    }

    /// Largest value seen, 0 when nothing was recorded
    pub fn global_max(&self) -> f64 {
        if self.global.is_empty() { 0.0 } else { self.global.max_scalar }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge() {
        let a = MaxMin::new(2.0, 5.0);
        let b = MaxMin::new(-1.0, 3.0);
        assert_eq!(a.merge(b), MaxMin::new(-1.0, 5.0));
        assert_eq!(MaxMin::EMPTY.merge(a), a);
        assert!(MaxMin::EMPTY.is_empty());
        assert!(!MaxMin::EMPTY.include(4.0).is_empty());
    }

    #[test]
    fn test_block_tracks_global() {
        let mut block = MaxMinBlock::new(1);
        assert_eq!(block.global_max(), 0.0);

        block.push_brick(MaxMin::new(10.0, 20.0));
        block.push_brick(MaxMin::new(0.0, 12.0));
        assert_eq!(block.brick_count(), 2);
        assert_eq!(block.global, MaxMin::new(0.0, 20.0));
        assert_eq!(block.global_max(), 20.0);
    }
}
