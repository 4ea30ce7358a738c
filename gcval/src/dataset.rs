//! In-memory model of a self-describing scientific data file.
//!
//! A `Dataset` is what a `DatasetReader` produces for a single file: a set of named,
//! multidimensional variables, each tagged with its ordered dimension names and descriptive
//! attributes, plus the file's global attributes. Datasets are immutable once built.
//!
use std::collections::BTreeMap;
use std::fmt;

use ndarray::{ArrayD, ArrayViewD};
use serde::Serialize;

use crate::errors::{Error, Result};
use crate::species::{OUTPUT_PREFIX, RESTART_MARKER};

/// All datasets loaded for one simulation run, keyed by file identifier (the file stem).
///
pub type Run = BTreeMap<String, Dataset>;

/// The value of a variable or global attribute.
///
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    Number(f64),
    Numbers(Vec<f64>),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(text) => write!(f, "{text}"),
            AttrValue::Number(n) => write!(f, "{n}"),
            AttrValue::Numbers(values) => {
                let values: Vec<String> = values.iter().map(|n| n.to_string()).collect();
                write!(f, "[{}]", values.join(", "))
            }
        }
    }
}

impl From<&str> for AttrValue {
    fn from(text: &str) -> Self {
        AttrValue::Text(text.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(text: String) -> Self {
        AttrValue::Text(text)
    }
}

impl From<f64> for AttrValue {
    fn from(n: f64) -> Self {
        AttrValue::Number(n)
    }
}

/// A named multidimensional array with ordered dimension names and attributes.
///
#[derive(Clone, Debug)]
pub struct Variable {
    name: String,
    dims: Vec<String>,
    data: ArrayD<f64>,
    attrs: BTreeMap<String, AttrValue>,
}

impl Variable {
    /// Create a new variable.
    ///
    /// # Arguments
    ///
    /// * `name` - The raw variable name as it appears in the file, e.g. "SpeciesConc_O3".
    /// * `dims` - Dimension names, outermost first. Must have one name per array axis.
    /// * `data` - The variable's values. Fill values should already be replaced with NaN.
    ///
    pub fn new<S, D>(name: S, dims: D, data: ArrayD<f64>) -> Result<Self>
    where
        S: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        let name = name.into();
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();
        if dims.len() != data.ndim() {
            return Err(Error::Dimensions {
                variable: name,
                ndim: data.ndim(),
                dims: dims.len(),
            });
        }

        Ok(Self {
            name,
            dims,
            data,
            attrs: BTreeMap::new(),
        })
    }

    pub fn with_attr<S: Into<String>, V: Into<AttrValue>>(mut self, name: S, value: V) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn data(&self) -> ArrayViewD<'_, f64> {
        self.data.view()
    }

    /// Index of the axis carrying the named dimension, if the variable has it.
    ///
    pub fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|name| name == dim)
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn attrs(&self) -> &BTreeMap<String, AttrValue> {
        &self.attrs
    }

    pub fn units(&self) -> Option<String> {
        self.attr("units").map(ToString::to_string)
    }

    pub fn long_name(&self) -> Option<String> {
        self.attr("long_name").map(ToString::to_string)
    }
}

/// The naming convention a dataset follows for its species variables.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Diagnostic output, species named `SpeciesConc_<NAME>`
    Output,

    /// Model checkpoint, species named `SPC_<NAME>`
    Restart,

    /// Neither convention detected
    Unknown,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileKind::Output => "output",
            FileKind::Restart => "restart",
            FileKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Determine which species naming convention a dataset follows.
///
/// The presence of any variable whose name contains `SPC_` marks a restart file. Failing that, any
/// variable starting with `SpeciesConc_` marks an output file. Anything else is `Unknown`.
///
pub fn classify(dataset: &Dataset) -> FileKind {
    classify_names(dataset.variable_names())
}

/// `classify` for a file whose variable names are known but whose variables aren't loaded.
///
pub fn classify_names<'a, I>(names: I) -> FileKind
where
    I: IntoIterator<Item = &'a str>,
    I::IntoIter: Clone,
{
    let names = names.into_iter();
    if names.clone().any(|name| name.contains(RESTART_MARKER)) {
        FileKind::Restart
    } else if names.clone().any(|name| name.starts_with(OUTPUT_PREFIX)) {
        FileKind::Output
    } else {
        FileKind::Unknown
    }
}

/// An immutable, named collection of variables loaded from one file.
///
#[derive(Clone, Debug)]
pub struct Dataset {
    name: String,
    variables: BTreeMap<String, Variable>,
    attrs: BTreeMap<String, AttrValue>,
}

impl Dataset {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            variables: BTreeMap::new(),
            attrs: BTreeMap::new(),
        }
    }

    /// Add a variable, replacing any existing variable with the same name.
    ///
    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.insert(variable.name.clone(), variable);
        self
    }

    pub fn with_attr<S: Into<String>, V: Into<AttrValue>>(mut self, name: S, value: V) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// The file identifier this dataset was loaded under
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> + Clone {
        self.variables.keys().map(String::as_str)
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn attrs(&self) -> &BTreeMap<String, AttrValue> {
        &self.attrs
    }

    pub fn kind(&self) -> FileKind {
        classify(self)
    }

    /// Sizes of every dimension used by any variable in the dataset.
    ///
    pub fn dimensions(&self) -> BTreeMap<String, usize> {
        let mut dimensions = BTreeMap::new();
        for variable in self.variables.values() {
            for (name, &len) in variable.dims.iter().zip(variable.shape()) {
                dimensions.entry(name.clone()).or_insert(len);
            }
        }

        dimensions
    }
}
