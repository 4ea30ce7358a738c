//! Pass/fail thresholds for cross-architecture comparisons.
//!
//! The three relative thresholds are each a fraction of the absolute reference mean. They can only
//! be overridden together, by scaling from a single value.
//!
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Absolute bound on the test mean when the reference mean is exactly zero.
pub const ZERO_MEAN_ABS_TOLERANCE: f64 = 1e-10;

/// Reference values with magnitude at or below this contribute a relative difference of zero.
pub const REL_DIFF_FLOOR: f64 = 1e-10;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Bound on mean absolute difference / |mean reference|
    pub mean: f64,

    /// Bound on RMSE / |mean reference|
    pub rmse: f64,

    /// Bound on maximum absolute difference / |mean reference|
    pub max_abs_diff: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            mean: 1e-5,
            rmse: 1e-4,
            max_abs_diff: 1e-3,
        }
    }
}

impl Thresholds {
    /// Derive all three thresholds from a single override value `t`: `{t, 10t, 100t}`.
    ///
    pub fn scaled(t: f64) -> Result<Self> {
        if !t.is_finite() || t <= 0.0 {
            return Err(Error::InvalidThreshold(t));
        }

        Ok(Self {
            mean: t,
            rmse: t * 10.0,
            max_abs_diff: t * 100.0,
        })
    }
}
