use std::io;
use std::path::PathBuf;
use std::result;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    /// A file in a recognized format could not be parsed
    #[error("unable to read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("directory not found: {path}")]
    MissingDirectory { path: PathBuf },

    /// Nothing loadable was found for one side of a comparison
    #[error("no datasets could be loaded from {path}")]
    NoDatasets { path: PathBuf },

    #[error("variable {variable} has {ndim} dimensions but {dims} dimension names were given")]
    Dimensions {
        variable: String,
        ndim: usize,
        dims: usize,
    },

    #[error("time index {index} out of range for {variable} (time dimension has length {len})")]
    TimeIndexOutOfRange {
        variable: String,
        index: usize,
        len: usize,
    },

    #[error("invalid time step {0}: expected -1 (last) or a non-negative index")]
    InvalidTimeStep(i64),

    #[error("invalid threshold {0}: expected a finite, positive number")]
    InvalidThreshold(f64),

    #[error("unable to render plot: {0}")]
    Plot(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

pub type Result<T> = result::Result<T, Error>;
