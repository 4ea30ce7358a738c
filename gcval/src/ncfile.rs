//! `DatasetReader` for NetCDF files, using the system NetCDF library.
//!
use std::collections::BTreeMap;
use std::path::Path;

use ndarray::{ArrayD, IxDyn};
use netcdf::AttributeValue;
use tracing::{debug, warn};

use crate::dataset::{AttrValue, Dataset, Variable};
use crate::errors::{Error, Result};
use crate::loader::DatasetReader;
use crate::species::{select_variables, Species};

const FILL_ATTRS: [&str; 2] = ["_FillValue", "missing_value"];

/// Reads NetCDF (classic and NetCDF-4) files.
///
/// Variables are read in full and converted to `f64`. Elements equal to the variable's
/// `_FillValue` or `missing_value` become NaN. Variables that can't be read as numbers, character
/// data for example, are left out of the dataset.
///
/// By default every variable is read. A reader made with `for_species` reads only the variables
/// holding those species and leaves the rest of the file on disk.
///
#[derive(Clone, Debug, Default)]
pub struct NetcdfReader {
    species: Option<Vec<Species>>,
}

impl NetcdfReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_species(species: &[Species]) -> Self {
        Self {
            species: Some(species.to_vec()),
        }
    }
}

impl DatasetReader for NetcdfReader {
    fn extensions(&self) -> &[&str] {
        &["nc", "nc4"]
    }

    fn read(&self, path: &Path) -> Result<Dataset> {
        let read_error = |reason: String| Error::Read {
            path: path.to_path_buf(),
            reason,
        };

        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| read_error(String::from("bad file name")))?;
        let file = netcdf::open(path).map_err(|err| read_error(err.to_string()))?;

        let mut dataset = Dataset::new(name);
        for attr in file.attributes() {
            if let Some(value) = attr.value().ok().and_then(convert) {
                dataset = dataset.with_attr(attr.name(), value);
            }
        }

        let selected = self.species.as_deref().map(|species| {
            let names: Vec<String> = file.variables().map(|var| var.name()).collect();
            select_variables(names.iter().map(String::as_str), species)
        });

        for var in file.variables() {
            let var_name = var.name();
            if let Some(selected) = &selected {
                if !selected.contains(&var_name) {
                    continue;
                }
            }
            match read_variable(path, &var) {
                Ok(variable) => dataset = dataset.with_variable(variable),
                Err(err) => {
                    warn!(path = %path.display(), variable = %var_name, "Skipping variable: {err}");
                }
            }
        }
        debug!(path = %path.display(), kind = %dataset.kind(), "read dataset");

        Ok(dataset)
    }
}

fn read_variable(path: &Path, var: &netcdf::Variable) -> Result<Variable> {
    let unreadable = |err: netcdf::Error| Error::Read {
        path: path.to_path_buf(),
        reason: format!("{}: {err}", var.name()),
    };

    let dims: Vec<String> = var.dimensions().iter().map(|dim| dim.name()).collect();
    let shape: Vec<usize> = var.dimensions().iter().map(|dim| dim.len()).collect();
    let mut values = var.get_values::<f64, _>(..).map_err(unreadable)?;

    let mut attrs = BTreeMap::new();
    for attr in var.attributes() {
        if let Some(value) = attr.value().ok().and_then(convert) {
            attrs.insert(attr.name().to_string(), value);
        }
    }

    for fill in FILL_ATTRS.iter().filter_map(|name| attrs.get(*name)) {
        if let AttrValue::Number(fill) = *fill {
            for value in values.iter_mut().filter(|value| **value == fill) {
                *value = f64::NAN;
            }
        }
    }

    let data = ArrayD::from_shape_vec(IxDyn(&shape), values)?;
    let variable = Variable::new(var.name(), dims, data)?;

    Ok(attrs
        .into_iter()
        .fold(variable, |variable, (name, value)| variable.with_attr(name, value)))
}

fn convert(value: AttributeValue) -> Option<AttrValue> {
    let value = match value {
        AttributeValue::Str(text) => AttrValue::Text(text),
        AttributeValue::Strs(texts) => AttrValue::Text(texts.join("\n")),
        AttributeValue::Double(n) => AttrValue::Number(n),
        AttributeValue::Float(n) => AttrValue::Number(n.into()),
        AttributeValue::Int(n) => AttrValue::Number(n.into()),
        AttributeValue::Uint(n) => AttrValue::Number(n.into()),
        AttributeValue::Short(n) => AttrValue::Number(n.into()),
        AttributeValue::Ushort(n) => AttrValue::Number(n.into()),
        AttributeValue::Schar(n) => AttrValue::Number(n.into()),
        AttributeValue::Uchar(n) => AttrValue::Number(n.into()),
        AttributeValue::Longlong(n) => AttrValue::Number(n as f64),
        AttributeValue::Ulonglong(n) => AttrValue::Number(n as f64),
        AttributeValue::Doubles(values) => AttrValue::Numbers(values),
        AttributeValue::Floats(values) => numbers(values),
        AttributeValue::Ints(values) => numbers(values),
        AttributeValue::Uints(values) => numbers(values),
        AttributeValue::Shorts(values) => numbers(values),
        AttributeValue::Ushorts(values) => numbers(values),
        AttributeValue::Schars(values) => numbers(values),
        AttributeValue::Uchars(values) => numbers(values),
        _ => return None,
    };

    Some(value)
}

fn numbers<T: Into<f64>>(values: Vec<T>) -> AttrValue {
    AttrValue::Numbers(values.into_iter().map(Into::into).collect())
}
