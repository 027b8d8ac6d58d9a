//! Error types for impress-resolve

use thiserror::Error;

/// Result type alias for resolution operations
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Main error type for resolution operations
///
/// Only configuration and input-source problems surface here. Record-level
/// and pair-level faults are absorbed by the pipeline and reported through
/// [`crate::report::ResolutionStats`].
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Input source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Report output errors
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Threshold values are invalid relative to each other
    #[error("Invalid thresholds: {0}")]
    InvalidThresholds(String),

    /// Value is out of valid range
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    /// Config file could not be read
    #[error("Cannot read config {path}: {message}")]
    Unreadable { path: String, message: String },

    /// Config text could not be parsed
    #[error("Config parse error: {0}")]
    Parse(String),
}

/// Input source errors. These abort the run before any processing starts.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Input file does not exist
    #[error("Input not found: {0}")]
    NotFound(String),

    /// Input file exists but cannot be read
    #[error("Cannot read input {path}: {message}")]
    Unreadable { path: String, message: String },

    /// Delimited text could not be parsed at all
    #[error("Invalid input format: {0}")]
    InvalidFormat(String),
}

/// Report output errors
#[derive(Error, Debug)]
pub enum ReportError {
    /// CSV writer failure
    #[error("CSV error: {0}")]
    Csv(String),

    /// JSON serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

/// Failure while scoring a single pair. Never aborts a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoreError {
    /// One side has an empty comparison key
    #[error("empty comparison key")]
    EmptyKey,

    /// Comparison key exceeds the configured length bound
    #[error("comparison key has {len} chars, limit is {max}")]
    KeyTooLong { len: usize, max: usize },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<csv::Error> for ReportError {
    fn from(err: csv::Error) -> Self {
        ReportError::Csv(err.to_string())
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for ReportError {
    fn from(err: std::io::Error) -> Self {
        ReportError::Io(err.to_string())
    }
}

impl From<csv::Error> for SourceError {
    fn from(err: csv::Error) -> Self {
        SourceError::InvalidFormat(err.to_string())
    }
}
