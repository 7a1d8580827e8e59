use std::path::PathBuf;
use thiserror::Error;

/// File- and schema-level failures. Data-quality issues (unparseable cells,
/// implausible ratios, unrecoverable gaps) are never raised through this type;
/// they are counted in `LoadReport`, `CalibrationTable` and `Diagnostics`.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Input file '{path}' could not be opened")]
    MissingInputFile {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Required column '{column}' not found in {source_name} table")]
    MissingRequiredColumn { source_name: String, column: String },

    #[error("CSV processing failed")]
    Csv(#[from] csv::Error),

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode JSON summary")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse configuration")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
