//! Statistical comparison of a reference slice against a test slice.
//!
//! Both slices are flattened and positions where either side is NaN are dropped. All statistics
//! are computed in `f64` over the remaining positions, whatever the input precision.
//!
use std::fmt;

use ndarray::ArrayViewD;
use num_traits::Float;
use serde::Serialize;

use crate::species::Species;
use crate::tolerance::{Thresholds, REL_DIFF_FLOOR, ZERO_MEAN_ABS_TOLERANCE};

/// Why a pair of slices could not be compared.
///
/// Skipped pairs are reported as warnings and never become comparison records.
///
#[derive(Clone, Debug, PartialEq)]
pub enum Skip {
    ShapeMismatch {
        reference: Vec<usize>,
        test: Vec<usize>,
    },
    NoValidData,
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skip::ShapeMismatch { reference, test } => {
                write!(f, "shape mismatch: {reference:?} vs {test:?}")
            }
            Skip::NoValidData => write!(f, "no valid (non-NaN) data"),
        }
    }
}

/// Values at the positions where neither reference nor test is NaN.
///
pub struct Pairs {
    reference: Vec<f64>,
    test: Vec<f64>,
}

impl Pairs {
    /// Apply the joint validity mask to two equally shaped arrays.
    ///
    pub fn new<N: Float>(
        reference: &ArrayViewD<N>,
        test: &ArrayViewD<N>,
    ) -> Result<Self, Skip> {
        if reference.shape() != test.shape() {
            return Err(Skip::ShapeMismatch {
                reference: reference.shape().to_vec(),
                test: test.shape().to_vec(),
            });
        }

        let (reference, test): (Vec<f64>, Vec<f64>) = reference
            .iter()
            .zip(test.iter())
            .filter(|(r, t)| !r.is_nan() && !t.is_nan())
            .filter_map(|(r, t)| Some((r.to_f64()?, t.to_f64()?)))
            .unzip();

        if reference.is_empty() {
            return Err(Skip::NoValidData);
        }

        Ok(Self { reference, test })
    }

    pub fn len(&self) -> usize {
        self.reference.len()
    }

    pub fn reference(&self) -> &[f64] {
        &self.reference
    }

    pub fn test(&self) -> &[f64] {
        &self.test
    }

    /// Elementwise |test - reference|
    pub fn abs_differences(&self) -> Vec<f64> {
        self.reference
            .iter()
            .zip(&self.test)
            .map(|(r, t)| (t - r).abs())
            .collect()
    }

    /// Elementwise |test - reference| / |reference|, or exactly 0 where |reference| is at or
    /// below `REL_DIFF_FLOOR`.
    ///
    pub fn relative_differences(&self) -> Vec<f64> {
        self.reference
            .iter()
            .zip(&self.test)
            .map(|(r, t)| {
                if r.abs() > REL_DIFF_FLOOR {
                    (t - r).abs() / r.abs()
                } else {
                    0.0
                }
            })
            .collect()
    }

    pub fn statistics(&self) -> Statistics {
        let abs_diff = self.abs_differences();
        let rel_diff = self.relative_differences();
        let squared: Vec<f64> = abs_diff.iter().map(|d| d * d).collect();

        Statistics {
            mean_ref: mean(&self.reference),
            mean_test: mean(&self.test),
            mean_abs_diff: mean(&abs_diff),
            max_abs_diff: max(&abs_diff),
            rmse: mean(&squared).sqrt(),
            mean_rel_diff: mean(&rel_diff),
            max_rel_diff: max(&rel_diff),
            corr_coef: pearson(&self.reference, &self.test),
            valid_points: self.len(),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Pearson correlation coefficient of two equal length samples.
///
/// NaN when either sample has zero variance.
///
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let (mean_x, mean_y) = (mean(x), mean(y));
    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mean_x, b - mean_y);
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    covariance / (var_x.sqrt() * var_y.sqrt())
}

/// Comparison statistics for one species within one file.
///
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Statistics {
    pub mean_ref: f64,
    pub mean_test: f64,
    pub mean_abs_diff: f64,
    pub max_abs_diff: f64,
    pub rmse: f64,
    pub mean_rel_diff: f64,
    pub max_rel_diff: f64,
    pub corr_coef: f64,

    /// Number of positions that survived the NaN mask
    pub valid_points: usize,
}

/// Difference metrics expressed as fractions of |mean reference|.
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Normalized {
    pub mean_diff: f64,
    pub rmse: f64,
    pub max_diff: f64,
}

impl Statistics {
    /// `None` when the reference mean is exactly zero.
    pub fn normalized(&self) -> Option<Normalized> {
        if self.mean_ref == 0.0 {
            return None;
        }

        let scale = self.mean_ref.abs();
        Some(Normalized {
            mean_diff: self.mean_abs_diff / scale,
            rmse: self.rmse / scale,
            max_diff: self.max_abs_diff / scale,
        })
    }

    /// Apply the pass/fail policy.
    ///
    /// With a nonzero reference mean all three normalized metrics must be under their thresholds.
    /// With a reference mean of exactly zero, the test mean must be within
    /// `ZERO_MEAN_ABS_TOLERANCE` of zero.
    ///
    pub fn passes(&self, thresholds: &Thresholds) -> bool {
        match self.normalized() {
            Some(normalized) => {
                normalized.mean_diff < thresholds.mean
                    && normalized.rmse < thresholds.rmse
                    && normalized.max_diff < thresholds.max_abs_diff
            }
            None => self.mean_test.abs() < ZERO_MEAN_ABS_TOLERANCE,
        }
    }
}

/// Compute comparison statistics for two slices of the same species and file.
///
pub fn compare<N: Float>(
    reference: &ArrayViewD<N>,
    test: &ArrayViewD<N>,
) -> Result<Statistics, Skip> {
    Ok(Pairs::new(reference, test)?.statistics())
}

/// The statistics and verdict for one species within one file identifier.
///
#[derive(Clone, Debug, Serialize)]
pub struct ComparisonRecord {
    pub species: Species,
    pub file_id: String,
    #[serde(flatten)]
    pub statistics: Statistics,
    pub passed: bool,
}

impl ComparisonRecord {
    pub fn new<S: Into<String>>(
        species: Species,
        file_id: S,
        statistics: Statistics,
        thresholds: &Thresholds,
    ) -> Self {
        let passed = statistics.passes(thresholds);
        Self {
            species,
            file_id: file_id.into(),
            statistics,
            passed,
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, ArrayD, IxDyn};
    use num_traits::cast;
    use paste::paste;

    use super::*;

    fn array<N: Float>(values: &[f64]) -> ArrayD<N> {
        arr1(values).mapv(|v| cast(v).unwrap()).into_dyn()
    }

    fn close(a: f64, b: f64, rel: f64) -> bool {
        (a - b).abs() <= rel * b.abs().max(f64::MIN_POSITIVE)
    }

    macro_rules! compare_tests {
        ($type:ty) => {
            paste! {
                #[test]
                fn [<test_shape_mismatch_ $type>]() {
                    let reference = ArrayD::<$type>::zeros(IxDyn(&[2, 3]));
                    let test = ArrayD::<$type>::zeros(IxDyn(&[3, 2]));
                    let skip = compare(&reference.view(), &test.view()).unwrap_err();
                    assert_eq!(
                        skip,
                        Skip::ShapeMismatch {
                            reference: vec![2, 3],
                            test: vec![3, 2]
                        }
                    );

                    // And the other way around
                    assert!(compare(&test.view(), &reference.view()).is_err());
                }

                #[test]
                fn [<test_all_nan_ $type>]() {
                    let reference = array::<$type>(&[f64::NAN, 1.0]);
                    let test = array::<$type>(&[1.0, f64::NAN]);
                    let skip = compare(&reference.view(), &test.view()).unwrap_err();
                    assert_eq!(skip, Skip::NoValidData);
                }

                #[test]
                fn [<test_nan_mask_ $type>]() {
                    let reference = array::<$type>(&[1.0, f64::NAN, 3.0, 4.0]);
                    let test = array::<$type>(&[1.0, 2.0, f64::NAN, 6.0]);
                    let stats = compare(&reference.view(), &test.view()).unwrap();
                    assert_eq!(stats.valid_points, 2);
                    assert_eq!(stats.mean_ref, 2.5);
                    assert_eq!(stats.mean_test, 3.5);
                    assert_eq!(stats.max_abs_diff, 2.0);
                    assert_eq!(stats.mean_abs_diff, 1.0);
                }

                #[test]
                fn [<test_passing_scenario_ $type>]() {
                    let reference = array::<$type>(&[100.0; 4]);
                    let test = array::<$type>(&[100.0001; 4]);
                    let stats = compare(&reference.view(), &test.view()).unwrap();
                    let normalized = stats.normalized().unwrap();

                    // Exact in f64, within float rounding for f32
                    assert!(close(stats.mean_abs_diff, 1e-4, 0.1));
                    assert!(close(normalized.mean_diff, 1e-6, 0.1));
                    assert!(close(normalized.rmse, normalized.mean_diff, 1e-6));
                    assert!(close(normalized.max_diff, normalized.mean_diff, 1e-6));
                    assert!(stats.passes(&Thresholds::default()));
                }

                #[test]
                fn [<test_failing_scenario_ $type>]() {
                    let reference = array::<$type>(&[100.0; 4]);
                    let test = array::<$type>(&[100.0, 100.0, 100.0, 105.0]);
                    let stats = compare(&reference.view(), &test.view()).unwrap();
                    assert_eq!(stats.max_abs_diff, 5.0);
                    assert_eq!(stats.normalized().unwrap().max_diff, 0.05);
                    assert!(!stats.passes(&Thresholds::default()));
                }

                #[test]
                fn [<test_identical_ $type>]() {
                    let reference = array::<$type>(&[1.0, 2.0, 3.0, 4.0]);
                    let stats = compare(&reference.view(), &reference.view()).unwrap();
                    assert_eq!(stats.mean_abs_diff, 0.0);
                    assert_eq!(stats.max_abs_diff, 0.0);
                    assert_eq!(stats.rmse, 0.0);
                    assert_eq!(stats.max_rel_diff, 0.0);
                    assert!(close(stats.corr_coef, 1.0, 1e-12));
                    assert!(stats.passes(&Thresholds::default()));
                }
            }
        };
    }

    compare_tests!(f32);
    compare_tests!(f64);

    #[test]
    fn test_statistics() {
        let reference = array::<f64>(&[1.0, 2.0, 3.0, 4.0]);
        let test = array::<f64>(&[1.0, 2.0, 3.0, 6.0]);
        let stats = compare(&reference.view(), &test.view()).unwrap();

        assert_eq!(stats.mean_ref, 2.5);
        assert_eq!(stats.mean_test, 3.0);
        assert_eq!(stats.mean_abs_diff, 0.5);
        assert_eq!(stats.max_abs_diff, 2.0);
        assert_eq!(stats.rmse, 1.0);
        assert_eq!(stats.mean_rel_diff, 0.125);
        assert_eq!(stats.max_rel_diff, 0.5);
        assert_eq!(stats.valid_points, 4);

        // r = cov / (sd_x * sd_y) with deviations x: [-1.5, -.5, .5, 1.5], y: [-2, -1, 0, 3]
        let expected = 8.0 / (5.0_f64.sqrt() * 14.0_f64.sqrt());
        assert!(close(stats.corr_coef, expected, 1e-12));
    }

    #[test]
    fn test_relative_difference_floor() {
        let reference = array::<f64>(&[0.0, 1e-10, -1e-10, 1e-9, 2.0]);
        let test = array::<f64>(&[5.0, 5.0, 5.0, 2e-9, 3.0]);
        let pairs = Pairs::new(&reference.view(), &test.view()).unwrap();
        let rel = pairs.relative_differences();

        assert_eq!(rel[0], 0.0);
        assert_eq!(rel[1], 0.0);
        assert_eq!(rel[2], 0.0);
        assert!(close(rel[3], 1.0, 1e-12));
        assert_eq!(rel[4], 0.5);

        let stats = pairs.statistics();
        assert_eq!(stats.max_rel_diff, rel[3]);
        assert!(stats.mean_rel_diff.is_finite());
    }

    #[test]
    fn test_zero_mean_reference() {
        let reference = array::<f64>(&[0.0, 0.0]);

        let test = array::<f64>(&[1e-11, 1e-11]);
        let stats = compare(&reference.view(), &test.view()).unwrap();
        assert_eq!(stats.mean_ref, 0.0);
        assert!(stats.normalized().is_none());
        assert!(stats.passes(&Thresholds::default()));

        let test = array::<f64>(&[1e-9, 1e-9]);
        let stats = compare(&reference.view(), &test.view()).unwrap();
        assert!(!stats.passes(&Thresholds::default()));

        // The absolute check ignores the configured thresholds entirely
        let loose = Thresholds::scaled(1.0).unwrap();
        assert!(!stats.passes(&loose));
    }

    #[test]
    fn test_zero_mean_with_nonzero_values() {
        let reference = array::<f64>(&[-1.0, 1.0]);
        let test = array::<f64>(&[-1.5, 1.5]);
        let stats = compare(&reference.view(), &test.view()).unwrap();
        assert_eq!(stats.mean_ref, 0.0);
        assert_eq!(stats.mean_test, 0.0);
        assert!(stats.passes(&Thresholds::default()));
    }

    #[test]
    fn test_threshold_conjunction() {
        // One outlier among many: mean difference and RMSE stay small, max difference does not
        let mut test = vec![100.0; 1000];
        test[500] = 100.2;
        let reference = array::<f64>(&[100.0; 1000]);
        let test = array::<f64>(&test);
        let stats = compare(&reference.view(), &test.view()).unwrap();
        let normalized = stats.normalized().unwrap();
        let thresholds = Thresholds::default();

        assert!(normalized.mean_diff < thresholds.mean);
        assert!(normalized.rmse < thresholds.rmse);
        assert!(normalized.max_diff > thresholds.max_abs_diff);
        assert!(!stats.passes(&thresholds));
    }

    #[test]
    fn test_override_threshold() {
        let reference = array::<f64>(&[100.0; 4]);
        let test = array::<f64>(&[100.0, 100.0, 100.0, 100.5]);
        let stats = compare(&reference.view(), &test.view()).unwrap();
        assert!(!stats.passes(&Thresholds::default()));
        assert!(stats.passes(&Thresholds::scaled(1e-2).unwrap()));
    }

    #[test]
    fn test_constant_correlation_is_nan() {
        let reference = array::<f64>(&[2.0; 3]);
        let stats = compare(&reference.view(), &reference.view()).unwrap();
        assert!(stats.corr_coef.is_nan());
        assert!(stats.passes(&Thresholds::default()));
    }

    #[test]
    fn test_multidimensional() {
        let reference = ArrayD::from_shape_fn(IxDyn(&[2, 3, 4]), |ix| (ix[0] + ix[1] + ix[2]) as f64);
        let test = reference.mapv(|v| v * 2.0);
        let stats = compare(&reference.view(), &test.view()).unwrap();
        assert_eq!(stats.valid_points, 24);
        assert_eq!(stats.mean_test, stats.mean_ref * 2.0);
        assert!(close(stats.corr_coef, 1.0, 1e-12));
    }

    #[test]
    fn test_record() {
        let reference = array::<f64>(&[100.0; 4]);
        let test = array::<f64>(&[100.0, 100.0, 100.0, 105.0]);
        let stats = compare(&reference.view(), &test.view()).unwrap();
        let record = ComparisonRecord::new(
            Species::new("O3"),
            "GEOSChem.SpeciesConc",
            stats,
            &Thresholds::default(),
        );
        assert!(!record.passed);
        assert_eq!(record.file_id, "GEOSChem.SpeciesConc");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["species"], "O3");
        assert_eq!(json["max_abs_diff"], 5.0);
        assert_eq!(json["passed"], false);
    }
}
