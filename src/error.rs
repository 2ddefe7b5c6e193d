//! Error types for loading inputs and resolving requests

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading the dataset, knowledge file or configuration.
///
/// Analytics over an already loaded dataset never fail; they degrade to
/// empty results instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not read dataset frame: {0}")]
    Frame(#[from] polars::error::PolarsError),

    #[error("could not read `{path}`: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse knowledge file `{path}`: {source}")]
    Knowledge {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("could not parse config file `{path}`: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid strategy playbook: {0}")]
    Playbook(#[from] toml::de::Error),

    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },

    #[error("configuration validation failed: {0}")]
    Validation(String),

    #[error("invalid customer profile: {0}")]
    InvalidProfile(String),

    #[error("segment `{0}` not found")]
    UnknownSegment(String),

    #[error("could not render chart: {0}")]
    Render(String),
}

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;
