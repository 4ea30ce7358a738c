//! Species keys and their resolution to raw variable names.
//!
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dataset::{classify, classify_names, Dataset, FileKind, Variable};

/// Prefix of species variables in diagnostic output files
pub const OUTPUT_PREFIX: &str = "SpeciesConc_";

/// Prefix of species variables in restart files
pub const RESTART_PREFIX: &str = "SPC_";

/// Substring whose presence in any variable name marks a restart file
pub const RESTART_MARKER: &str = "SPC_";

/// Species validated when none are requested explicitly: ozone, carbon monoxide, nitric oxide,
/// nitrogen dioxide, hydroxyl radical, sulfate, black carbon and organic carbon.
pub const DEFAULT_SPECIES: [&str; 8] = ["O3", "CO", "NO", "NO2", "OH", "SO4", "BC", "OC"];

/// A tracked chemical quantity, identified by its canonical short name, e.g. "O3".
///
/// Keys given in either raw form ("SpeciesConc_O3", "SPC_O3") are normalized to the canonical
/// key on construction.
///
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Species(String);

impl Species {
    pub fn new<S: AsRef<str>>(key: S) -> Self {
        let key = key.as_ref().trim();
        let key = key
            .strip_prefix(OUTPUT_PREFIX)
            .or_else(|| key.strip_prefix(RESTART_PREFIX))
            .unwrap_or(key);

        Self(key.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of this species' variable in a dataset of the given kind.
    ///
    /// Datasets of unknown kind are assumed to follow the output naming convention.
    ///
    pub fn variable_name(&self, kind: FileKind) -> String {
        match kind {
            FileKind::Restart => format!("{RESTART_PREFIX}{}", self.0),
            FileKind::Output | FileKind::Unknown => format!("{OUTPUT_PREFIX}{}", self.0),
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Species {
    fn from(key: String) -> Self {
        Species::new(key)
    }
}

impl From<&str> for Species {
    fn from(key: &str) -> Self {
        Species::new(key)
    }
}

impl From<Species> for String {
    fn from(species: Species) -> Self {
        species.0
    }
}

pub fn default_species() -> Vec<Species> {
    DEFAULT_SPECIES.iter().copied().map(Species::new).collect()
}

/// Find the variable holding `species` in `dataset`.
///
/// Returns `None` if the dataset doesn't carry the species under the name its naming convention
/// calls for. That's a missing data point, not an error.
///
pub fn resolve<'a>(dataset: &'a Dataset, species: &Species) -> Option<&'a Variable> {
    let name = species.variable_name(classify(dataset));
    dataset.get_variable(&name)
}

/// Of the variables `names` in a file, those that hold one of `species`.
///
/// This is what `resolve` can find once the file is loaded, so a reader can leave every other
/// variable on disk.
///
pub fn select_variables<'a, I>(names: I, species: &[Species]) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
    I::IntoIter: Clone,
{
    let names = names.into_iter();
    let kind = classify_names(names.clone());
    let wanted: BTreeSet<String> = species.iter().map(|s| s.variable_name(kind)).collect();

    names
        .filter(|name| wanted.contains(*name))
        .map(String::from)
        .collect()
}
