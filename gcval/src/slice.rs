use std::fmt;

use ndarray::{ArrayViewD, Axis};
use serde::{Deserialize, Serialize};

use crate::dataset::Variable;
use crate::errors::{Error, Result};

/// Name of the time dimension
pub const TIME_DIM: &str = "time";

/// Which time instant to compare.
///
/// On the command line and in configuration files this is an integer: `-1` for the most recent
/// instant, otherwise a zero based index.
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TimeStep {
    #[default]
    Last,
    Index(usize),
}

impl TimeStep {
    /// Concrete index into a time dimension of length `len`, or `None` if out of range.
    ///
    pub fn resolve(&self, len: usize) -> Option<usize> {
        match *self {
            TimeStep::Last => len.checked_sub(1),
            TimeStep::Index(index) if index < len => Some(index),
            TimeStep::Index(_) => None,
        }
    }
}

impl TryFrom<i64> for TimeStep {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            -1 => Ok(TimeStep::Last),
            n if n >= 0 => Ok(TimeStep::Index(n as usize)),
            n => Err(Error::InvalidTimeStep(n)),
        }
    }
}

impl From<TimeStep> for i64 {
    fn from(step: TimeStep) -> Self {
        match step {
            TimeStep::Last => -1,
            TimeStep::Index(index) => index as i64,
        }
    }
}

impl fmt::Display for TimeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeStep::Last => write!(f, "-1 (last)"),
            TimeStep::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A variable's values at a single time instant.
///
/// Borrows the variable's buffer, so extracting slices never copies data.
///
#[derive(Clone, Debug)]
pub struct Slice<'a> {
    variable: &'a Variable,
    time_index: Option<usize>,
    dims: Vec<&'a str>,
    data: ArrayViewD<'a, f64>,
}

impl<'a> Slice<'a> {
    pub fn variable(&self) -> &'a Variable {
        self.variable
    }

    /// The time index that was selected, or `None` if the variable has no time dimension.
    pub fn time_index(&self) -> Option<usize> {
        self.time_index
    }

    /// Remaining dimension names
    pub fn dims(&self) -> &[&'a str] {
        &self.dims
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn view(&self) -> ArrayViewD<'a, f64> {
        self.data.clone()
    }
}

/// Select a single time instant from `variable`, removing the time dimension.
///
/// Variables without a time dimension are returned whole.
///
pub fn extract(variable: &Variable, step: TimeStep) -> Result<Slice<'_>> {
    let data = variable.data();
    let dims = variable.dims().iter().map(String::as_str);

    match variable.axis_of(TIME_DIM) {
        None => Ok(Slice {
            variable,
            time_index: None,
            dims: dims.collect(),
            data,
        }),
        Some(axis) => {
            let len = data.len_of(Axis(axis));
            let index = step.resolve(len).ok_or_else(|| Error::TimeIndexOutOfRange {
                variable: variable.name().to_string(),
                index: match step {
                    TimeStep::Last => 0,
                    TimeStep::Index(index) => index,
                },
                len,
            })?;

            Ok(Slice {
                variable,
                time_index: Some(index),
                dims: dims.filter(|&dim| dim != TIME_DIM).collect(),
                data: data.index_axis_move(Axis(axis), index),
            })
        }
    }
}
