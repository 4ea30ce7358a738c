mod compare;
mod dataset;
mod errors;
mod inspect;
mod loader;
#[cfg(feature = "netcdf")]
mod ncfile;
mod plot;
mod report;
mod sink;
mod slice;
mod species;
mod tolerance;
mod validator;

#[cfg(test)]
mod testing;

pub use compare::compare;
pub use compare::pearson;
pub use compare::ComparisonRecord;
pub use compare::Normalized;
pub use compare::Pairs;
pub use compare::Skip;
pub use compare::Statistics;

pub use dataset::classify;
pub use dataset::classify_names;
pub use dataset::AttrValue;
pub use dataset::Dataset;
pub use dataset::FileKind;
pub use dataset::Run;
pub use dataset::Variable;

pub use errors::Error;
pub use errors::Result;

pub use inspect::catalog;
pub use inspect::species_of;
pub use inspect::DatasetCatalog;
pub use inspect::VariableCategory;
pub use inspect::VariableInfo;

pub use loader::default_reader;
pub use loader::discover_files;
pub use loader::load_run;
pub use loader::DatasetReader;
pub use loader::OUTPUT_SUBDIR;

#[cfg(feature = "netcdf")]
pub use ncfile::NetcdfReader;

pub use plot::Diagnostics;
pub use plot::Histogram;

pub use report::Published;
pub use report::Report;
pub use report::Settings;
pub use report::Summary;
pub use report::SummaryRow;

pub use sink::put;
pub use sink::ArtifactSink;
pub use sink::DirectorySink;
pub use sink::StoreWrite;

pub use slice::extract;
pub use slice::Slice;
pub use slice::TimeStep;
pub use slice::TIME_DIM;

pub use species::default_species;
pub use species::resolve;
pub use species::select_variables;
pub use species::Species;
pub use species::DEFAULT_SPECIES;

pub use tolerance::Thresholds;
pub use tolerance::REL_DIFF_FLOOR;
pub use tolerance::ZERO_MEAN_ABS_TOLERANCE;

pub use validator::validate;
pub use validator::Comparison;
pub use validator::Outcome;
pub use validator::ValidationOptions;
pub use validator::Warning;
