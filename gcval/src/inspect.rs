//! A catalog of the variables a dataset carries, for finding species names and checking what a
//! run produced before validating it.
//!
use std::collections::BTreeMap;

use serde::Serialize;

use crate::dataset::{AttrValue, Dataset, FileKind, Variable};
use crate::species::{OUTPUT_PREFIX, RESTART_PREFIX};

pub const AEROSOL_PREFIX: &str = "AerosolMass_";
pub const MET_PREFIX: &str = "Met_";

/// Global attributes worth reporting, when present
const GLOBAL_ATTRS: [&str; 5] = ["title", "source", "history", "references", "comment"];

/// Broad grouping of a variable, by naming convention
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableCategory {
    Concentration,
    Aerosol,
    Meteorology,
    Flux,
    Emission,
    Restart,
    Other,
}

impl VariableCategory {
    pub fn of(name: &str) -> Self {
        if name.starts_with(OUTPUT_PREFIX) {
            VariableCategory::Concentration
        } else if name.starts_with(AEROSOL_PREFIX) {
            VariableCategory::Aerosol
        } else if name.starts_with(MET_PREFIX) {
            VariableCategory::Meteorology
        } else if name.contains("Flux") {
            VariableCategory::Flux
        } else if name.contains("Emis") {
            VariableCategory::Emission
        } else if name.starts_with(RESTART_PREFIX) {
            VariableCategory::Restart
        } else {
            VariableCategory::Other
        }
    }
}

/// The species a variable carries, if its name follows one of the species conventions
pub fn species_of(name: &str) -> Option<&str> {
    [OUTPUT_PREFIX, AEROSOL_PREFIX, RESTART_PREFIX]
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .filter(|species| !species.is_empty())
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VariableInfo {
    pub name: String,
    pub category: VariableCategory,
    pub species: Option<String>,
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub attrs: BTreeMap<String, AttrValue>,
}

impl From<&Variable> for VariableInfo {
    fn from(variable: &Variable) -> Self {
        let attrs = ["units", "long_name", "standard_name", "description"]
            .into_iter()
            .filter_map(|name| {
                variable
                    .attr(name)
                    .map(|value| (name.to_string(), value.clone()))
            })
            .collect();

        Self {
            name: variable.name().to_string(),
            category: VariableCategory::of(variable.name()),
            species: species_of(variable.name()).map(String::from),
            dims: variable.dims().to_vec(),
            shape: variable.shape().to_vec(),
            attrs,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DatasetCatalog {
    pub name: String,
    pub kind: FileKind,
    pub dimensions: BTreeMap<String, usize>,
    pub global_attrs: BTreeMap<String, AttrValue>,
    pub variables: BTreeMap<VariableCategory, Vec<VariableInfo>>,
}

impl DatasetCatalog {
    pub fn variable_count(&self) -> usize {
        self.variables.values().map(Vec::len).sum()
    }

    /// Every species key found, sorted and without duplicates
    pub fn species(&self) -> Vec<&str> {
        let mut species: Vec<&str> = self
            .variables
            .values()
            .flatten()
            .filter_map(|info| info.species.as_deref())
            .collect();
        species.sort_unstable();
        species.dedup();

        species
    }
}

/// Build the variable catalog of a dataset.
///
/// Only variables with at least two dimensions are listed. Coordinate and bookkeeping variables
/// such as `lat`, `time` or `hyam` have fewer and aren't interesting here.
///
pub fn catalog(dataset: &Dataset) -> DatasetCatalog {
    let mut variables: BTreeMap<VariableCategory, Vec<VariableInfo>> = BTreeMap::new();
    for variable in dataset.variables().filter(|v| v.dims().len() >= 2) {
        let info = VariableInfo::from(variable);
        variables.entry(info.category).or_default().push(info);
    }

    let global_attrs = GLOBAL_ATTRS
        .into_iter()
        .filter_map(|name| {
            dataset
                .attr(name)
                .map(|value| (name.to_string(), value.clone()))
        })
        .collect();

    DatasetCatalog {
        name: dataset.name().to_string(),
        kind: dataset.kind(),
        dimensions: dataset.dimensions(),
        global_attrs,
        variables,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Result;
    use crate::testing;

    #[test]
    fn test_category() {
        use VariableCategory::*;
        let cases = [
            ("SpeciesConc_O3", Concentration),
            ("AerosolMass_SO4", Aerosol),
            ("Met_T", Meteorology),
            ("DryDepFlux_O3", Flux),
            ("EmisNO_Total", Emission),
            ("SPC_CO", Restart),
            ("AREA", Other),
            ("Met_EmisLayer", Meteorology),
        ];
        for (name, category) in cases {
            assert_eq!(VariableCategory::of(name), category, "{name}");
        }
    }

    #[test]
    fn test_species_of() {
        assert_eq!(species_of("SpeciesConc_NO2"), Some("NO2"));
        assert_eq!(species_of("AerosolMass_BC"), Some("BC"));
        assert_eq!(species_of("SPC_OH"), Some("OH"));
        assert_eq!(species_of("SpeciesConc_"), None);
        assert_eq!(species_of("Met_PS"), None);
    }

    fn dataset() -> Result<Dataset> {
        let grid = ["time", "lev", "lat", "lon"];
        let shape = [2, 3, 4, 5];
        Ok(Dataset::new("GEOSChem.SpeciesConc.20190701_0000z")
            .with_attr("title", "GEOS-Chem diagnostic collection: SpeciesConc")
            .with_attr("conventions", "COARDS")
            .with_variable(
                testing::variable("SpeciesConc_O3", &grid, &shape, |_| 1.0)?
                    .with_attr("units", "mol mol-1 dry")
                    .with_attr("long_name", "Dry mixing ratio of species O3")
                    .with_attr("averaging_method", "time-averaged"),
            )
            .with_variable(testing::variable("SpeciesConc_CO", &grid, &shape, |_| 1.0)?)
            .with_variable(testing::variable("AerosolMass_SO4", &grid, &shape, |_| 1.0)?)
            .with_variable(testing::variable(
                "Met_PS",
                &["time", "lat", "lon"],
                &[2, 4, 5],
                |_| 1.0,
            )?)
            .with_variable(testing::variable("lat", &["lat"], &[4], |i| i as f64)?)
            .with_variable(testing::variable("AREA", &["lat", "lon"], &[4, 5], |_| 1.0)?))
    }

    #[test]
    fn test_catalog() -> Result<()> {
        let catalog = catalog(&dataset()?);

        assert_eq!(catalog.name, "GEOSChem.SpeciesConc.20190701_0000z");
        assert_eq!(catalog.kind, FileKind::Output);
        assert_eq!(catalog.dimensions["lev"], 3);
        assert_eq!(catalog.dimensions["lon"], 5);
        assert_eq!(catalog.variable_count(), 5);
        assert_eq!(catalog.species(), vec!["CO", "O3", "SO4"]);

        // Only the interesting global attributes
        assert_eq!(catalog.global_attrs.len(), 1);
        assert!(catalog.global_attrs.contains_key("title"));

        let concentrations = &catalog.variables[&VariableCategory::Concentration];
        let names: Vec<&str> = concentrations.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["SpeciesConc_CO", "SpeciesConc_O3"]);

        let o3 = &concentrations[1];
        assert_eq!(o3.species.as_deref(), Some("O3"));
        assert_eq!(o3.dims, vec!["time", "lev", "lat", "lon"]);
        assert_eq!(o3.shape, vec![2, 3, 4, 5]);
        assert_eq!(o3.attrs.len(), 2);
        assert_eq!(o3.attrs["units"], AttrValue::from("mol mol-1 dry"));

        assert_eq!(catalog.variables[&VariableCategory::Other].len(), 1);
        assert!(!catalog.variables.contains_key(&VariableCategory::Restart));

        Ok(())
    }

    #[test]
    fn test_catalog_json() -> Result<()> {
        let json = serde_json::to_value(catalog(&dataset()?))?;

        assert_eq!(json["kind"], "output");
        assert_eq!(json["variables"]["aerosol"][0]["name"], "AerosolMass_SO4");
        assert_eq!(json["variables"]["meteorology"][0]["shape"][2], 5);
        assert_eq!(
            json["variables"]["concentration"][1]["attrs"]["long_name"],
            "Dry mixing ratio of species O3"
        );
        assert!(json["variables"]["concentration"][0]["species"] == "CO");

        Ok(())
    }
}
