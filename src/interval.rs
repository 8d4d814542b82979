//! Interval arithmetic for ray parameter ranges.
//!
//! Provides intervals [min, max] used for ray t-values and bounds checking.

/// Interval [min, max] for range checking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    /// Minimum value of the interval
    pub min: f32,
    /// Maximum value of the interval
    pub max: f32,
}

impl Interval {
    /// Create a new interval with given min and max values
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Everything strictly beyond `min`.
    pub fn beyond(min: f32) -> Self {
        Self {
            min,
            max: f32::INFINITY,
        }
    }

    /// Check if the interval surrounds the given value (exclusive bounds)
    pub fn surrounds(&self, x: f32) -> bool {
        self.min < x && x < self.max
    }

    /// Same interval with `max` pulled in to `max`. Used to shrink the search
    /// window as closer hits are found.
    pub fn with_max(&self, max: f32) -> Self {
        Self { min: self.min, max }
    }
}
