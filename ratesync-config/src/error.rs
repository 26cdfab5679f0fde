use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config from {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {origin}")]
    Toml {
        origin: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config {origin}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(
        "failed to parse config {origin}: toml error: {toml}; json error: {json}"
    )]
    Unrecognized {
        origin: String,
        toml: String,
        json: String,
    },
    #[error("invalid config value: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigLoadError>;
