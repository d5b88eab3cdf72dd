//! Wind-condition bin specifications and bin coordinates.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which wind-condition dimensions the analysis steps over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepVar {
    Direction,
    Speed,
}

impl StepVar {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepVar::Direction => "direction",
            StepVar::Speed => "speed",
        }
    }
}

/// Bin specification for one wind-condition dimension: a half-open range
/// `[lower_bound, upper_bound)` stepped by `width`.
///
/// Bin assignment is only defined for values inside the range; rows outside
/// must be filtered before bins are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinSpec {
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub width: f64,
}

impl BinSpec {
    pub fn new(lower_bound: f64, upper_bound: f64, width: f64) -> Self {
        Self {
            lower_bound,
            upper_bound,
            width,
        }
    }

    /// Whether `value` falls inside `[lower_bound, upper_bound)`. A value
    /// exactly at the upper bound is excluded.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower_bound && value < self.upper_bound
    }

    /// Lower bound of the bin containing `value`:
    /// `lower + width * floor((value - lower) / width)`.
    ///
    /// Only correct for values inside the range.
    pub fn bin_lower_bound(&self, value: f64) -> f64 {
        self.lower_bound + self.width * ((value - self.lower_bound) / self.width).floor()
    }

    /// Integer offset of the bin containing `value` from the range start.
    pub fn bin_index(&self, value: f64) -> i64 {
        ((value - self.lower_bound) / self.width).floor() as i64
    }

    /// Inverse of [`BinSpec::bin_index`] for a bin coordinate.
    pub fn lower_of(&self, index: i64) -> f64 {
        self.lower_bound + self.width * index as f64
    }

    /// Recover the bin coordinate from a bin-lower-bound column value.
    /// Rounding absorbs the float error accumulated by the forward pass.
    pub fn index_of_lower(&self, lower: f64) -> i64 {
        ((lower - self.lower_bound) / self.width).round() as i64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.width > 0.0) {
            return Err(ConfigError::NonPositiveWidth(self.width));
        }
        if !(self.lower_bound < self.upper_bound) {
            return Err(ConfigError::EmptyRange {
                lower: self.lower_bound,
                upper: self.upper_bound,
            });
        }
        Ok(())
    }
}

/// Coordinate of one wind-condition bin: the integer bin offset per active
/// dimension. Inactive dimensions are `None`.
///
/// Keys order canonically (direction-major, then speed), which gives every
/// grouped table a deterministic row order without defensive reordering
/// downstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BinKey {
    pub direction: Option<i64>,
    pub speed: Option<i64>,
}

impl BinKey {
    pub fn direction_lower(&self, spec: &BinSpec) -> Option<f64> {
        self.direction.map(|index| spec.lower_of(index))
    }

    pub fn speed_lower(&self, spec: &BinSpec) -> Option<f64> {
        self.speed.map(|index| spec.lower_of(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_lower_bound_is_grid_aligned() {
        let spec = BinSpec::new(0.0, 360.0, 5.0);
        assert_eq!(spec.bin_lower_bound(0.0), 0.0);
        assert_eq!(spec.bin_lower_bound(4.999), 0.0);
        assert_eq!(spec.bin_lower_bound(5.0), 5.0);
        assert_eq!(spec.bin_lower_bound(197.3), 195.0);
    }

    #[test]
    fn bin_lower_bound_respects_offset_origin() {
        let spec = BinSpec::new(2.0, 20.0, 3.0);
        for value in [2.0, 2.9, 7.1, 19.9] {
            let lower = spec.bin_lower_bound(value);
            // Every bin lower bound is lower + k * width for integer k >= 0.
            let k = (lower - spec.lower_bound) / spec.width;
            assert!((k - k.round()).abs() < 1e-9);
            assert!(k >= 0.0);
            assert!(value >= lower && value < lower + spec.width);
        }
    }

    #[test]
    fn upper_bound_is_excluded() {
        let spec = BinSpec::new(0.0, 20.0, 5.0);
        assert!(spec.contains(0.0));
        assert!(spec.contains(19.999));
        assert!(!spec.contains(20.0));
    }

    #[test]
    fn index_round_trips_through_lower_bound() {
        let spec = BinSpec::new(0.0, 360.0, 1.0);
        for value in [0.0, 0.5, 17.2, 359.9] {
            let index = spec.bin_index(value);
            assert_eq!(spec.index_of_lower(spec.lower_of(index)), index);
        }
    }

    #[test]
    fn validate_rejects_degenerate_specs() {
        assert!(BinSpec::new(0.0, 10.0, 0.0).validate().is_err());
        assert!(BinSpec::new(10.0, 10.0, 1.0).validate().is_err());
        assert!(BinSpec::new(0.0, 10.0, 1.0).validate().is_ok());
    }

    #[test]
    fn keys_order_direction_major() {
        let a = BinKey {
            direction: Some(0),
            speed: Some(5),
        };
        let b = BinKey {
            direction: Some(1),
            speed: Some(0),
        };
        assert!(a < b);
    }
}
