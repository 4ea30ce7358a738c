use std::{
    collections::HashMap,
    fs,
    io::{self, Write},
    path::Path,
};

use ndarray::{ArrayD, IxDyn};
use parking_lot::Mutex;

use crate::{
    dataset::{Dataset, Variable},
    errors::{Error, Result},
    loader::DatasetReader,
    sink::{ArtifactSink, StoreWrite},
    species::{OUTPUT_PREFIX, RESTART_PREFIX},
};

/// Make a variable whose values are a function of the flat (row major) index.
///
pub(crate) fn variable<F>(name: &str, dims: &[&str], shape: &[usize], f: F) -> Result<Variable>
where
    F: Fn(usize) -> f64,
{
    let len = shape.iter().product();
    let data = ArrayD::from_shape_vec(IxDyn(shape), (0..len).map(f).collect())?;

    Variable::new(name, dims.iter().copied(), data)
}

fn species_dataset(name: &str, prefix: &str, species: &[(&str, Vec<f64>)]) -> Result<Dataset> {
    let mut dataset = Dataset::new(name);
    for (key, values) in species {
        let data = ArrayD::from_shape_vec(IxDyn(&[values.len()]), values.clone())?;
        let variable = Variable::new(format!("{prefix}{key}"), ["lat"], data)?
            .with_attr("units", "mol mol-1 dry");
        dataset = dataset.with_variable(variable);
    }

    Ok(dataset)
}

/// An output file with one `SpeciesConc_` variable, along a single "lat" dimension, per species
pub(crate) fn output_dataset(name: &str, species: &[(&str, Vec<f64>)]) -> Result<Dataset> {
    species_dataset(name, OUTPUT_PREFIX, species)
}

/// A restart file with one `SPC_` variable, along a single "lat" dimension, per species
pub(crate) fn restart_dataset(name: &str, species: &[(&str, Vec<f64>)]) -> Result<Dataset> {
    species_dataset(name, RESTART_PREFIX, species)
}

/// A test implementation of DatasetReader that serves prepared datasets.
///
/// Reading a file looks up a dataset by the file's stem. Files whose stem isn't known, or whose
/// contents are "corrupt", fail to read.
///
pub(crate) struct StubReader {
    datasets: HashMap<String, Dataset>,
}

impl StubReader {
    pub(crate) fn new(datasets: Vec<Dataset>) -> Self {
        let datasets = datasets
            .into_iter()
            .map(|dataset| (dataset.name().to_string(), dataset))
            .collect();

        Self { datasets }
    }
}

impl DatasetReader for StubReader {
    fn extensions(&self) -> &[&str] {
        &["nc", "nc4"]
    }

    fn read(&self, path: &Path) -> Result<Dataset> {
        let read_error = |reason: &str| Error::Read {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        if fs::read_to_string(path)? == "corrupt" {
            return Err(read_error("not a NetCDF file"));
        }

        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| read_error("bad file name"))?;

        self.datasets
            .get(stem)
            .cloned()
            .ok_or_else(|| read_error("unknown dataset"))
    }
}

/// Create an empty file for each name under `dir`.
///
pub(crate) fn touch(dir: &Path, names: &[&str]) -> io::Result<()> {
    for name in names {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, "")?;
    }

    Ok(())
}

/// A test implementation of ArtifactSink that stores objects in RAM
///
pub(crate) struct MemorySink {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySink {
    pub(crate) fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(name).cloned()
    }

    pub(crate) fn get_string(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.lock().keys().cloned().collect();
        names.sort();

        names
    }
}

impl ArtifactSink for MemorySink {
    fn store(&self, name: &str) -> Result<Box<dyn StoreWrite + '_>> {
        Ok(Box::new(MemorySinkStoreWrite {
            sink: self,
            name: name.to_string(),
            buffer: Vec::new(),
        }))
    }
}

struct MemorySinkStoreWrite<'a> {
    sink: &'a MemorySink,
    name: String,
    buffer: Vec<u8>,
}

impl<'a> Write for MemorySinkStoreWrite<'a> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> StoreWrite for MemorySinkStoreWrite<'a> {
    fn finish(self: Box<Self>) -> Result<String> {
        let location = format!("memory://{}", self.name);
        self.sink.objects.lock().insert(self.name, self.buffer);

        Ok(location)
    }
}
