// crates/obsprofile-core/src/error.rs

use obsprofile_parser::ParserError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("structural parse error: {0}")]
    Parse(#[from] ParserError),

    #[error("invalid altitude {altitude} at record {record_index}: {reason}")]
    InvalidAltitude {
        record_index: usize,
        altitude: f64,
        reason: String,
    },

    #[error("unrecognized unit '{declared}' for canonical unit '{canonical}'")]
    UnrecognizedUnit { declared: String, canonical: String },

    #[error("data loss: {total} input records but {accounted} accounted for ({detail})")]
    DataLoss {
        total: usize,
        accounted: usize,
        detail: String,
    },

    #[error("variable column '{variable}' not present in schema {available:?}")]
    MissingVariableColumn {
        variable: String,
        available: Vec<String>,
    },

    #[error("statistic table has {found} rows but the grid has {expected} levels")]
    GridMismatch { expected: usize, found: usize },

    #[error("output '{identity}' from {path} already claimed by {claimed_by}")]
    OutputCollision {
        identity: String,
        path: String,
        claimed_by: String,
    },

    #[error("invalid importer configuration: {0}")]
    Config(String),

    #[error("TOML configuration error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ZIP operation failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("invalid input glob: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Dataset sink failed: {0}")]
    Sink(#[from] anyhow::Error),
}

impl ProfileError {
    /// Skippable errors abandon the current (file, variable) unit without
    /// being treated as a failure of that file.
    pub fn is_skippable(&self) -> bool {
        matches!(self, ProfileError::UnrecognizedUnit { .. })
    }
}

pub type Result<T> = std::result::Result<T, ProfileError>;
