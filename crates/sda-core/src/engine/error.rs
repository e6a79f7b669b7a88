use std::path::PathBuf;
use thiserror::Error;

use super::config::ConfigError;

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to process '{path}': {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: BoxedError,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Found {found} connected states but {expected} clusters were requested")]
    DisconnectedStates { found: usize, expected: usize },

    #[error("Linear algebra failure: {0}")]
    LinearAlgebra(String),

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Wraps a format or figure error together with the file it concerns.
    pub fn format<E>(path: impl Into<PathBuf>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        EngineError::Format {
            path: path.into(),
            source: Box::new(source),
        }
    }
}
