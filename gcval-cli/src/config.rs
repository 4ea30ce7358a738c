//! Command line arguments and the optional YAML config file they can be layered over.
//!
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;

use gcval::{TimeStep, ValidationOptions};

pub const DEFAULT_OUTPUT: &str = "validation-results";

#[derive(Args, Debug, Default)]
pub struct ValidateArgs {
    /// Directory containing reference simulation results
    #[arg(short, long)]
    pub reference: Option<PathBuf>,

    /// Directory containing test simulation results
    #[arg(short, long)]
    pub test: Option<PathBuf>,

    /// Directory to store validation results [default: validation-results]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Species to validate [default: O3 CO NO NO2 OH SO4 BC OC]
    #[arg(short, long, num_args = 1..)]
    pub species: Vec<String>,

    /// Time step to validate, -1 for the last one [default: -1]
    #[arg(long, allow_negative_numbers = true)]
    pub time_step: Option<i64>,

    /// Single validation threshold overriding the defaults (rmse and max difference are scaled
    /// from it by 10 and 100)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// YAML file with defaults for any of these options
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Don't render diagnostic plots
    #[arg(long)]
    pub no_plots: bool,
}

/// Validation settings read from a YAML file. Every key is optional.
///
/// ```yaml
/// reference: runs/x86_64
/// test: runs/graviton
/// species: [O3, CO]
/// time_step: 0
/// threshold: 1.0e-4
/// plots: false
/// ```
///
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub reference: Option<PathBuf>,
    pub test: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub species: Option<Vec<String>>,
    pub time_step: Option<i64>,
    pub threshold: Option<f64>,
    pub plots: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;

        serde_yaml::from_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))
    }
}

/// Everything needed to run one validation
#[derive(Debug)]
pub struct RunConfig {
    pub reference: PathBuf,
    pub test: PathBuf,
    pub output: PathBuf,
    pub options: ValidationOptions,
}

impl ValidateArgs {
    /// Layer these arguments over `file`. Arguments given on the command line win.
    ///
    pub fn resolve(self, file: FileConfig) -> Result<RunConfig> {
        let reference = self
            .reference
            .or(file.reference)
            .context("no reference directory given, use --reference or the config file")?;
        let test = self
            .test
            .or(file.test)
            .context("no test directory given, use --test or the config file")?;
        let output = self
            .output
            .or(file.output)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

        let time_step = TimeStep::try_from(self.time_step.or(file.time_step).unwrap_or(-1))?;
        let plots = !self.no_plots && file.plots.unwrap_or(true);
        let mut options = ValidationOptions::default()
            .with_time_step(time_step)
            .with_plots(plots);

        let species = Some(self.species)
            .filter(|species| !species.is_empty())
            .or(file.species)
            .filter(|species| !species.is_empty());
        if let Some(species) = species {
            options = options.with_species(species);
        }

        if let Some(threshold) = self.threshold.or(file.threshold) {
            options = options.with_threshold(threshold)?;
        }

        Ok(RunConfig {
            reference,
            test,
            output,
            options,
        })
    }
}
