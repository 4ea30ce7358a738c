//! The validation pipeline: resolve, slice and compare every requested species in every file
//! identifier shared by a reference run and a test run.
//!
use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::compare::{ComparisonRecord, Pairs, Skip};
use crate::dataset::{Run, Variable};
use crate::errors::{Error, Result};
use crate::plot::Diagnostics;
use crate::slice::{extract, TimeStep};
use crate::species::{default_species, resolve, Species};
use crate::tolerance::Thresholds;

/// Everything that parameterizes a validation run.
///
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationOptions {
    pub species: Vec<Species>,
    pub time_step: TimeStep,
    pub thresholds: Thresholds,

    /// The single override value the thresholds were scaled from, if any
    pub custom_threshold: Option<f64>,

    /// Whether to keep the data needed to draw diagnostic plots
    pub plots: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            species: default_species(),
            time_step: TimeStep::Last,
            thresholds: Thresholds::default(),
            custom_threshold: None,
            plots: true,
        }
    }
}

impl ValidationOptions {
    /// Species are normalized on the way in, so `O3` and `SpeciesConc_O3` name the same one.
    /// Only the first of such repeats is kept.
    ///
    pub fn with_species<I, S>(mut self, species: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Species>,
    {
        let mut seen = BTreeSet::new();
        self.species = species
            .into_iter()
            .map(Into::into)
            .filter(|species: &Species| seen.insert(species.clone()))
            .collect();
        self
    }

    pub fn with_time_step(mut self, time_step: TimeStep) -> Self {
        self.time_step = time_step;
        self
    }

    /// Replace the default thresholds with ones scaled from `t`.
    ///
    pub fn with_threshold(mut self, t: f64) -> Result<Self> {
        self.thresholds = Thresholds::scaled(t)?;
        self.custom_threshold = Some(t);
        Ok(self)
    }

    pub fn with_plots(mut self, plots: bool) -> Self {
        self.plots = plots;
        self
    }
}

/// A species/file pair that was excluded from comparison, and why.
///
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Warning {
    pub species: Species,

    /// `None` when the warning concerns the species across all files
    pub file_id: Option<String>,
    pub reason: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file_id {
            Some(file_id) => write!(f, "{} in {}: {}", self.species, file_id, self.reason),
            None => write!(f, "{}: {}", self.species, self.reason),
        }
    }
}

/// A comparison record along with the data for its diagnostic plot.
///
#[derive(Clone, Debug)]
pub struct Comparison {
    pub record: ComparisonRecord,
    pub diagnostics: Option<Diagnostics>,
}

/// The result of validating a test run against a reference run.
///
#[derive(Clone, Debug, Default)]
pub struct Outcome {
    pub comparisons: Vec<Comparison>,
    pub warnings: Vec<Warning>,
}

impl Outcome {
    pub fn records(&self) -> impl Iterator<Item = &ComparisonRecord> {
        self.comparisons.iter().map(|comparison| &comparison.record)
    }

    pub fn total(&self) -> usize {
        self.comparisons.len()
    }

    pub fn passed(&self) -> usize {
        self.records().filter(|record| record.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    /// True when no comparison failed. Vacuously true when nothing was compared.
    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    /// Process exit code for use as an automated gate
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }

    fn warn(&mut self, species: &Species, file_id: Option<&str>, reason: String) {
        match file_id {
            Some(file_id) => warn!(species = %species, file_id, "{reason}"),
            None => warn!(species = %species, "{reason}"),
        }
        self.warnings.push(Warning {
            species: species.clone(),
            file_id: file_id.map(String::from),
            reason,
        });
    }
}

/// Why a pair that both runs carry was still not compared
enum Exclusion {
    Extract(Error),
    Compare(Skip),
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::Extract(err) => write!(f, "{err}"),
            Exclusion::Compare(skip) => write!(f, "{skip}"),
        }
    }
}

impl From<Skip> for Exclusion {
    fn from(skip: Skip) -> Self {
        Exclusion::Compare(skip)
    }
}

fn compare_pair(
    species: &Species,
    file_id: &str,
    reference: &Variable,
    test: &Variable,
    options: &ValidationOptions,
) -> std::result::Result<Comparison, Exclusion> {
    let reference = extract(reference, options.time_step).map_err(Exclusion::Extract)?;
    let test = extract(test, options.time_step).map_err(Exclusion::Extract)?;

    let pairs = Pairs::new(&reference.view(), &test.view())?;
    let statistics = pairs.statistics();
    let diagnostics = options
        .plots
        .then(|| Diagnostics::new(&reference.view(), &pairs));
    let record = ComparisonRecord::new(
        species.clone(),
        file_id,
        statistics,
        &options.thresholds,
    );

    Ok(Comparison {
        record,
        diagnostics,
    })
}

/// Compare every requested species between a reference run and a test run.
///
/// Problems with individual species/file pairs never abort validation. They are logged and
/// collected as warnings, and the pair is left out of the comparison records.
///
pub fn validate(reference: &Run, test: &Run, options: &ValidationOptions) -> Outcome {
    let mut outcome = Outcome::default();
    let file_ids: BTreeSet<&str> = reference
        .keys()
        .chain(test.keys())
        .map(String::as_str)
        .collect();

    for species in &options.species {
        let mut present = false;
        for &file_id in &file_ids {
            let in_reference = reference.get(file_id).and_then(|d| resolve(d, species));
            let in_test = test.get(file_id).and_then(|d| resolve(d, species));

            match (in_reference, in_test) {
                (None, None) => {
                    debug!(species = %species, file_id, "not present in either run");
                }
                (Some(_), None) => {
                    present = true;
                    outcome.warn(species, Some(file_id), String::from("missing from test run"));
                }
                (None, Some(_)) => {
                    present = true;
                    outcome.warn(
                        species,
                        Some(file_id),
                        String::from("missing from reference run"),
                    );
                }
                (Some(reference), Some(test)) => {
                    present = true;
                    match compare_pair(species, file_id, reference, test, options) {
                        Ok(comparison) => {
                            let record = &comparison.record;
                            debug!(
                                species = %species,
                                file_id,
                                passed = record.passed,
                                mean_abs_diff = record.statistics.mean_abs_diff,
                                max_abs_diff = record.statistics.max_abs_diff,
                                "compared"
                            );
                            outcome.comparisons.push(comparison);
                        }
                        Err(exclusion) => {
                            outcome.warn(species, Some(file_id), exclusion.to_string());
                        }
                    }
                }
            }
        }

        if !present {
            outcome.warn(species, None, String::from("not found in either run"));
        }
    }

    info!(
        "Validation complete: {}/{} tests passed",
        outcome.passed(),
        outcome.total()
    );

    outcome
}
