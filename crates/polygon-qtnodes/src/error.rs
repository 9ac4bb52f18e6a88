use polygon_qtnodes_lib::CoverageError;
use std::path::PathBuf;

/// Error types for the command-line front end
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Coverage(#[from] CoverageError),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("GeoJSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid GeoJSON: {0}")]
    InvalidGeoJson(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
