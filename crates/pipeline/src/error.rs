//! Pipeline error type.

use circ2d_core::error::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Missing input file, short read, or byte-size mismatch.
    #[error("field file error: {0}")]
    FieldFile(String),

    #[error("output error: {0}")]
    Output(String),

    #[error("thread pool error: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}
