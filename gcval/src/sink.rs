use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::errors::Result;

/// A trait for publishing report artifacts to some store.
///
/// Artifact names are relative, '/' separated paths such as "plots/O3_x_comparison.svg".
///
pub trait ArtifactSink {
    /// Obtain an output stream for writing an artifact to the store.
    ///
    /// The artifact's location can be obtained from the `finish` method of the returned
    /// `StoreWrite` object.
    ///
    fn store(&self, name: &str) -> Result<Box<dyn StoreWrite + '_>>;
}

pub trait StoreWrite: Write {
    /// Close the output stream and return the location of the newly written artifact.
    ///
    fn finish(self: Box<Self>) -> Result<String>;
}

/// Write a complete artifact in one go.
///
pub fn put(sink: &dyn ArtifactSink, name: &str, bytes: &[u8]) -> Result<String> {
    let mut stream = sink.store(name)?;
    stream.write_all(bytes)?;

    stream.finish()
}

/// An `ArtifactSink` that writes artifacts as files under a local directory.
///
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    /// Create the sink, creating `root` if it doesn't exist.
    ///
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactSink for DirectorySink {
    fn store(&self, name: &str) -> Result<Box<dyn StoreWrite + '_>> {
        let path = name
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = BufWriter::new(File::create(&path)?);

        Ok(Box::new(FileStoreWrite { path, file }))
    }
}

struct FileStoreWrite {
    path: PathBuf,
    file: BufWriter<File>,
}

impl Write for FileStoreWrite {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl StoreWrite for FileStoreWrite {
    fn finish(mut self: Box<Self>) -> Result<String> {
        self.file.flush()?;

        Ok(self.path.display().to_string())
    }
}
