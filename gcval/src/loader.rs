//! Discovery and loading of every dataset in a simulation run directory.
//!
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::dataset::{Dataset, Run};
use crate::errors::{Error, Result};
use crate::species::Species;

/// Conventional subdirectory of a run directory that holds model output
pub const OUTPUT_SUBDIR: &str = "OutputDir";

/// A trait for loading datasets from files in some self-describing scientific format.
///
pub trait DatasetReader {
    /// File extensions, without the leading dot, recognized as this reader's format.
    ///
    fn extensions(&self) -> &[&str];

    /// Load the file at `path` into a `Dataset`.
    ///
    /// The dataset's name should be the file stem, which serves as the file identifier when
    /// matching files between runs.
    ///
    fn read(&self, path: &Path) -> Result<Dataset>;

    fn recognizes(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| self.extensions().contains(&ext))
    }
}

/// The reader for the file format this build supports.
///
/// If `species` is given, only the variables holding those species are loaded. Otherwise every
/// variable is.
///
/// NetCDF support links against the system NetCDF library through the default `netcdf` feature.
/// A build without it has nothing to read run directories with.
///
pub fn default_reader(species: Option<&[Species]>) -> Result<Box<dyn DatasetReader>> {
    #[cfg(feature = "netcdf")]
    {
        use crate::ncfile::NetcdfReader;

        Ok(Box::new(match species {
            Some(species) => NetcdfReader::for_species(species),
            None => NetcdfReader::new(),
        }))
    }

    #[cfg(not(feature = "netcdf"))]
    {
        let _ = species;
        Err(Error::Unsupported(String::from(
            "reading NetCDF files requires building with the `netcdf` feature",
        )))
    }
}

/// Find the files in a run directory that `reader` can load.
///
/// If `dir` has an `OutputDir` subdirectory, that is searched instead. Files directly in the
/// searched directory are preferred. Only if there are none is it searched recursively. Paths are
/// returned sorted.
///
pub fn discover_files(dir: &Path, reader: &dyn DatasetReader) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::MissingDirectory {
            path: dir.to_path_buf(),
        });
    }

    let output_dir = dir.join(OUTPUT_SUBDIR);
    let root = if output_dir.is_dir() {
        output_dir.as_path()
    } else {
        dir
    };

    let mut files = search(root, Some(1), reader);
    if files.is_empty() {
        files = search(root, None, reader);
    }
    files.sort();

    Ok(files)
}

fn search(root: &Path, max_depth: Option<usize>, reader: &dyn DatasetReader) -> Vec<PathBuf> {
    let mut walk = WalkDir::new(root).follow_links(true);
    if let Some(depth) = max_depth {
        walk = walk.max_depth(depth);
    }

    let mut files = vec![];
    for entry in walk {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && reader.recognizes(entry.path()) {
                    files.push(entry.into_path());
                }
            }
            Err(err) => {
                warn!("Directory traversal error: {err}");
            }
        }
    }

    files
}

/// Load every dataset in a run directory, keyed by file stem.
///
/// Files that fail to load are logged and skipped. If nothing at all could be loaded, that's an
/// error, since there would be nothing to validate.
///
pub fn load_run(dir: &Path, reader: &dyn DatasetReader) -> Result<Run> {
    let files = discover_files(dir, reader)?;
    let mut run = Run::new();

    for path in files {
        let stem = match path.file_stem().and_then(|stem| stem.to_str()) {
            Some(stem) => stem.to_string(),
            None => {
                warn!(path = %path.display(), "Skipping file with unusable name");
                continue;
            }
        };
        if run.contains_key(&stem) {
            warn!(path = %path.display(), "Skipping duplicate file identifier {stem}");
            continue;
        }

        info!("Loading {}", path.display());
        match reader.read(&path) {
            Ok(dataset) => {
                run.insert(stem, dataset);
            }
            Err(err) => {
                error!("Error loading {}: {err}", path.display());
            }
        }
    }

    if run.is_empty() {
        error!("No datasets loaded from {}", dir.display());
        return Err(Error::NoDatasets {
            path: dir.to_path_buf(),
        });
    }

    Ok(run)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::testing::{self, StubReader};

    fn reader() -> Result<StubReader> {
        Ok(StubReader::new(vec![
            testing::output_dataset("GEOSChem.SpeciesConc.20190701_0000z", &[("O3", vec![1.0])])?,
            testing::restart_dataset("GEOSChem.Restart.20190801_0000z", &[("O3", vec![1.0])])?,
        ]))
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_recognizes() -> Result<()> {
        let reader = reader()?;
        assert!(reader.recognizes(Path::new("a/b.nc")));
        assert!(reader.recognizes(Path::new("b.nc4")));
        assert!(!reader.recognizes(Path::new("b.nc.gz")));
        assert!(!reader.recognizes(Path::new("HEMCO.log")));
        assert!(!reader.recognizes(Path::new("nc")));

        Ok(())
    }

    #[test]
    fn test_default_reader() {
        let species = [Species::new("O3")];
        for reader in [default_reader(None), default_reader(Some(&species))] {
            if cfg!(feature = "netcdf") {
                assert!(reader.unwrap().recognizes(Path::new("a.nc4")));
            } else {
                assert!(matches!(reader, Err(Error::Unsupported(_))));
            }
        }
    }

    #[cfg(feature = "netcdf")]
    #[test]
    fn test_load_run_netcdf() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join(OUTPUT_SUBDIR))?;
        let path = dir
            .path()
            .join(OUTPUT_SUBDIR)
            .join("GEOSChem.SpeciesConc.20190701_0000z.nc4");
        {
            let mut file = netcdf::create(&path).unwrap();
            file.add_dimension("lat", 2).unwrap();
            for name in ["SpeciesConc_O3", "SpeciesConc_CO"] {
                let mut var = file.add_variable::<f32>(name, &["lat"]).unwrap();
                var.put_values(&[1.0f32, 2.0], ..).unwrap();
            }
        }

        let species = [Species::new("O3")];
        let reader = default_reader(Some(&species))?;
        let run = load_run(dir.path(), reader.as_ref())?;

        let dataset = &run["GEOSChem.SpeciesConc.20190701_0000z"];
        assert!(dataset.get_variable("SpeciesConc_O3").is_some());
        assert!(dataset.get_variable("SpeciesConc_CO").is_none());

        Ok(())
    }

    #[test]
    fn test_discover_prefers_output_dir() -> Result<()> {
        let dir = tempfile::tempdir()?;
        testing::touch(
            dir.path(),
            &["stray.nc", "OutputDir/b.nc", "OutputDir/a.nc4", "OutputDir/notes.txt"],
        )?;

        let files = discover_files(dir.path(), &reader()?)?;
        assert_eq!(names(&files), vec!["a.nc4", "b.nc"]);

        Ok(())
    }

    #[test]
    fn test_discover_top_level_only() -> Result<()> {
        let dir = tempfile::tempdir()?;
        testing::touch(dir.path(), &["a.nc", "Restarts/r.nc"])?;

        let files = discover_files(dir.path(), &reader()?)?;
        assert_eq!(names(&files), vec!["a.nc"]);

        Ok(())
    }

    #[test]
    fn test_discover_recursive_fallback() -> Result<()> {
        let dir = tempfile::tempdir()?;
        testing::touch(dir.path(), &["Restarts/r.nc", "deep/er/x.nc", "run.log"])?;

        let files = discover_files(dir.path(), &reader()?)?;
        assert_eq!(names(&files), vec!["r.nc", "x.nc"]);

        Ok(())
    }

    #[test]
    fn test_discover_missing_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("nope");
        assert!(matches!(
            discover_files(&missing, &reader()?),
            Err(Error::MissingDirectory { .. })
        ));

        Ok(())
    }

    #[test]
    fn test_load_run_skips_bad_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        testing::touch(
            dir.path(),
            &[
                "OutputDir/GEOSChem.SpeciesConc.20190701_0000z.nc4",
                "OutputDir/GEOSChem.Restart.20190801_0000z.nc4",
                "OutputDir/unknown.nc",
            ],
        )?;
        fs::write(dir.path().join("OutputDir/broken.nc"), "corrupt")?;

        let run = load_run(dir.path(), &reader()?)?;
        let keys: Vec<&str> = run.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "GEOSChem.Restart.20190801_0000z",
                "GEOSChem.SpeciesConc.20190701_0000z",
            ]
        );

        Ok(())
    }

    #[test]
    fn test_load_run_duplicate_stem() -> Result<()> {
        let dir = tempfile::tempdir()?;
        testing::touch(
            dir.path(),
            &[
                "GEOSChem.Restart.20190801_0000z.nc",
                "GEOSChem.Restart.20190801_0000z.nc4",
            ],
        )?;

        let run = load_run(dir.path(), &reader()?)?;
        assert_eq!(run.len(), 1);

        Ok(())
    }

    #[test]
    fn test_load_run_nothing_loadable() -> Result<()> {
        let dir = tempfile::tempdir()?;
        testing::touch(dir.path(), &["unknown.nc"])?;
        assert!(matches!(
            load_run(dir.path(), &reader()?),
            Err(Error::NoDatasets { .. })
        ));

        let empty = tempfile::tempdir()?;
        assert!(matches!(
            load_run(empty.path(), &reader()?),
            Err(Error::NoDatasets { .. })
        ));

        Ok(())
    }
}
