//! Memory budget for in-core bricking
//!
//! Tracks how many bytes the bricking engine holds so that an oversized
//! volume fails up front instead of exhausting memory halfway through.

use crate::core::{Error, Result};

/// Default bricking budget: 1 GiB
pub const DEFAULT_BUDGET_BYTES: u64 = 1024 * 1024 * 1024;

/// Memory budget manager
#[derive(Debug, Clone)]
pub struct MemoryBudget {
    /// Maximum memory allowed (bytes)
    budget_bytes: u64,
    /// Currently reserved memory (bytes)
    used_bytes: u64,
}

impl MemoryBudget {
    /// Create a budget of `budget_bytes`
    pub fn new(budget_bytes: u64) -> Self {
        Self {
            budget_bytes,
            used_bytes: 0,
        }
    }

    /// Create a budget given in megabytes
    pub fn from_mb(budget_mb: u64) -> Self {
        Self::new(budget_mb.saturating_mul(1024 * 1024))
    }

    /// Reserve `bytes`, failing if that would exceed the budget
    pub fn reserve(&mut self, bytes: u64, what: &str) -> Result<()> {
        if !self.can_load(bytes) {
            return Err(Error::GenerationIntegrity(format!(
                "{} needs {} bytes but only {} of {} are available",
                what,
                bytes,
                self.available(),
                self.budget_bytes
            )));
        }
        self.used_bytes = self.used_bytes.saturating_add(bytes);
        Ok(())
    }

    /// Return `bytes` to the budget
    pub fn release(&mut self, bytes: u64) {
        self.used_bytes = self.used_bytes.saturating_sub(bytes);
    }

    pub fn used(&self) -> u64 {
        self.used_bytes
    }

    pub fn available(&self) -> u64 {
        self.budget_bytes.saturating_sub(self.used_bytes)
    }

    /// Usage ratio (0.0 to 1.0)
    pub fn pressure(&self) -> f32 {
        if self.budget_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f32 / self.budget_bytes as f32
    }

    pub fn can_load(&self, bytes: u64) -> bool {
        self.available() >= bytes
    }
}

impl Default for MemoryBudget {
    fn default() -> Self {
        Self::new(DEFAULT_BUDGET_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_new() {
        let budget = MemoryBudget::from_mb(512);
        assert_eq!(budget.used(), 0);
        assert_eq!(budget.available(), 512 * 1024 * 1024);
        assert_eq!(MemoryBudget::default().available(), DEFAULT_BUDGET_BYTES);
    }

    #[test]
    fn test_reserve_release() {
        let mut budget = MemoryBudget::from_mb(100);
        budget.reserve(50 * 1024 * 1024, "level 0").unwrap();
        assert!((budget.pressure() - 0.5).abs() < 0.01);

        budget.release(20 * 1024 * 1024);
        assert_eq!(budget.used(), 30 * 1024 * 1024);

        // Saturates at zero
        budget.release(u64::MAX);
        assert_eq!(budget.used(), 0);
    }

    #[test]
    fn test_reserve_over_budget() {
        let mut budget = MemoryBudget::new(1000);
        budget.reserve(900, "level 0").unwrap();
        let err = budget.reserve(200, "level 1").unwrap_err();
        assert!(matches!(err, Error::GenerationIntegrity(_)));
        // Failed reservation leaves usage untouched
        assert_eq!(budget.used(), 900);
        assert!(budget.can_load(100));
    }

    #[test]
    fn test_zero_budget_pressure() {
        let budget = MemoryBudget::new(0);
        assert_eq!(budget.pressure(), 0.0);
        assert!(!budget.can_load(1));
        assert!(budget.can_load(0));
    }
}
