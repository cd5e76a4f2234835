//! Batch progress accounting.

use serde::{Deserialize, Serialize};

/// Completed-of-total counter for a batch operation.
///
/// `completed` only ever grows and never exceeds `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    completed: usize,
    total: usize,
}

impl Progress {
    /// Start a batch of `total` items with nothing completed.
    #[must_use]
    pub const fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
        }
    }

    /// Record one more completed item, saturating at `total`.
    #[must_use]
    pub const fn advance(self) -> Self {
        let completed = if self.completed < self.total {
            self.completed + 1
        } else {
            self.total
        };
        Self {
            completed,
            total: self.total,
        }
    }

    #[must_use]
    pub const fn completed(&self) -> usize {
        self.completed
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Returns true once every item has completed.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }

    /// Completion as a percentage in `0.0..=100.0`. An empty batch reports 0.
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)] // batch sizes are tiny
        let ratio = self.completed as f64 / self.total as f64;
        ratio * 100.0
    }

    /// Percentage rounded to the nearest whole number, for display.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // bounded to 0..=100
    pub fn rounded_percent(&self) -> u8 {
        self.percent().round() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_is_monotonic_and_saturates() {
        let mut p = Progress::new(3);
        let mut last = p.completed();
        for _ in 0..5 {
            p = p.advance();
            assert!(p.completed() >= last);
            last = p.completed();
        }
        assert_eq!(p.completed(), 3);
        assert!(p.is_done());
    }

    #[test]
    fn test_percent() {
        let p = Progress::new(4).advance();
        assert!((p.percent() - 25.0).abs() < f64::EPSILON);
        let p = p.advance().advance().advance();
        assert!((p.percent() - 100.0).abs() < f64::EPSILON);
        assert_eq!(p.rounded_percent(), 100);
    }

    #[test]
    fn test_thirds_round_for_display() {
        let p = Progress::new(3).advance();
        assert_eq!(p.rounded_percent(), 33);
        assert_eq!(p.advance().rounded_percent(), 67);
    }

    #[test]
    fn test_empty_batch() {
        let p = Progress::new(0);
        assert!(p.percent().abs() < f64::EPSILON);
        assert!(!p.is_done());
        assert_eq!(p.advance().completed(), 0);
    }
}
