//! Error type shared by the loading, aggregation and rendering code.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("trajectory references object {id} which has no metadata row")]
    UnknownObject { id: i64 },

    #[error("{} is missing required column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("malformed CSV in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("count and nested group collide at '{path}'")]
    ShapeMismatch { path: String },

    #[error("failed to decode image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("rendering failed: {0}")]
    Render(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("map '{0}' is not configured")]
    UnknownMap(String),
}

impl AnalysisError {
    /// Maps an I/O error on `path` to [`AnalysisError::NotFound`] when the
    /// file is absent, or [`AnalysisError::Io`] otherwise.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            AnalysisError::NotFound { path }
        } else {
            AnalysisError::Io { path, source }
        }
    }

    /// Wraps a CSV error, surfacing the underlying I/O failure when there is one.
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        let path = path.into();
        if let csv::ErrorKind::Io(err) = source.kind() {
            let err = std::io::Error::new(err.kind(), err.to_string());
            return AnalysisError::io(path, err);
        }
        AnalysisError::Csv { path, source }
    }
}
