use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("No configuration section found for group '{0}'")]
    MissingGroup(String),
    #[error("Group '{0}' does not define any channels")]
    NoChannels(String),
    #[error("Could not determine the IFO prefix; pass --ifo or set the IFO environment variable")]
    NoIfo,
}

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("Segment file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Segment source failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Could not parse line {line} of {path:?}: {text}")]
    BadLine {
        path: PathBuf,
        line: usize,
        text: String,
    },
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive scan failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Channel name '{0}' is not of the form IFO:NAME and no IFO was given")]
    BadChannel(String),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Failed to run scheduler query '{0}': {1}")]
    SpawnError(String, std::io::Error),
    #[error("Scheduler query '{0}' exited with {1}: {2}")]
    QueryFailed(String, std::process::ExitStatus, String),
    #[error("Failed to parse scheduler output: {0}")]
    ParsingError(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum LatencyArchiveError {
    #[error("LatencyArchive failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("LatencyArchive found a malformed history array: {0}")]
    ShapeError(#[from] ndarray::ShapeError),
}

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Status document failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Status document failed to serialize JSON: {0}")]
    ParsingError(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("Plot failed due to image error: {0}")]
    ImageError(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum HtmlError {
    #[error("HTML page failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("HTML page failed to format: {0}")]
    FormatError(#[from] std::fmt::Error),
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Merge requires at least one input file")]
    NoInputs,
    #[error("Input file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Strict merge requires T050017 file names; could not parse {0:?}")]
    UnnamedInput(PathBuf),
    #[error("Strict merge failed: inputs are not contiguous between {0} and {1}")]
    NotContiguous(f64, f64),
    #[error("Strict merge failed: inputs overlap between {0} and {1}")]
    Overlapping(f64, f64),
    #[error("Dataset '{0}' in {1:?} does not match the shape of the first input")]
    ShapeMismatch(String, PathBuf),
    #[error("Dataset '{0}' in {1:?} does not match the type of the first input")]
    TypeMismatch(String, PathBuf),
    #[error("Member '{0}' in {2:?} has type {1} which cannot be merged")]
    UnsupportedType(String, String, PathBuf),
    #[error("Member '{0}' in {1:?} is neither a group nor a dataset")]
    UnsupportedMember(String, PathBuf),
    #[error("Member '{0}' is a group in one input but a dataset in {1:?}")]
    MemberConflict(String, PathBuf),
    #[error("Failed to run merge command '{0}': {1}")]
    SpawnError(String, std::io::Error),
    #[error("Merge command '{0}' exited with {1}")]
    CommandFailed(String, std::process::ExitStatus),
    #[error("Merge failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("Merge failed to concatenate arrays: {0}")]
    ShapeError(#[from] ndarray::ShapeError),
    #[error("Merge failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Report failed due to Segment error: {0}")]
    SegmentError(#[from] SegmentError),
    #[error("Report failed due to Archive error: {0}")]
    ArchiveError(#[from] ArchiveError),
    #[error("Report failed due to Scheduler error: {0}")]
    SchedulerError(#[from] SchedulerError),
    #[error("Report failed due to LatencyArchive error: {0}")]
    LatencyArchiveError(#[from] LatencyArchiveError),
    #[error("Report failed due to Status error: {0}")]
    StatusError(#[from] StatusError),
    #[error("Report failed due to Plot error: {0}")]
    PlotError(#[from] PlotError),
    #[error("Report failed due to HTML error: {0}")]
    HtmlError(#[from] HtmlError),
    #[error("Report failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
