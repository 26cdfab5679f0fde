use ratesync_model::Settings;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::error::{ConfigLoadError, Result};

pub const CONFIG_PATH_ENV: &str = "RATESYNC_CONFIG_PATH";
pub const CONFIG_JSON_ENV: &str = "RATESYNC_CONFIG_JSON";

const CANDIDATES: &[&str] = &[
    "ratesync.toml",
    "ratesync.json",
    "config/ratesync.toml",
    "config/ratesync.json",
];

/// Source that produced the runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Host tuning plus the settings written into an empty store.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Buffered store changes per listener. A listener that falls further
    /// behind reloads the state instead of replaying changes.
    pub store_channel_capacity: usize,
    /// Messages queued per context before further deliveries to it fail.
    pub context_mailbox_capacity: usize,
    /// Requests queued at the broker before callers wait.
    pub broker_queue_capacity: usize,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Settings record written on first run.
    pub settings: Settings,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            store_channel_capacity: 256,
            context_mailbox_capacity: 64,
            broker_queue_capacity: 128,
            log_filter: "info".to_string(),
            settings: Settings::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration using environment variables.
    /// Evaluation order:
    /// 1) `$RATESYNC_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$RATESYNC_CONFIG_JSON` (inline JSON),
    /// 3) the first of `ratesync.toml`, `ratesync.json`,
    ///    `config/ratesync.toml`, `config/ratesync.json` that exists,
    /// 4) defaults.
    pub fn load_from_env() -> Result<(Self, ConfigSource)> {
        Self::load_with(|key| env::var(key).ok(), Path::new("."))
    }

    /// [`Self::load_from_env`] with an explicit variable lookup and
    /// directory for the candidate files.
    pub fn load_with<F>(lookup: F, root: &Path) -> Result<(Self, ConfigSource)>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path_str) = lookup(CONFIG_PATH_ENV)
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let config = Self::load_from_file(&path)?;
            return Ok((config, ConfigSource::EnvPath(path)));
        }

        if let Some(raw) = lookup(CONFIG_JSON_ENV)
            && !raw.trim().is_empty()
        {
            let config = Self::parse_json(&raw)?;
            return Ok((config, ConfigSource::EnvInline));
        }

        if let Some(path) = Self::find_default_file(root) {
            let config = Self::load_from_file(&path)?;
            return Ok((config, ConfigSource::File(path)));
        }

        debug!("No ratesync config found, using defaults");
        Ok((Self::default(), ConfigSource::Default))
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let origin = path.display().to_string();

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents).map_err(
                |source| ConfigLoadError::Json { origin, source },
            )?,
            Some("toml") | Some("tml") => toml::from_str(&contents)
                .map_err(|source| ConfigLoadError::Toml { origin, source })?,
            _ => Self::parse_from_str(&contents, &origin)?,
        };
        Ok(config)
    }

    /// Parse text of unknown format, trying TOML first, then JSON.
    pub fn parse_from_str(contents: &str, origin: &str) -> Result<Self> {
        toml::from_str(contents).or_else(|toml_err| {
            serde_json::from_str(contents).map_err(|json_err| {
                ConfigLoadError::Unrecognized {
                    origin: origin.to_string(),
                    toml: toml_err.to_string(),
                    json: json_err.to_string(),
                }
            })
        })
    }

    pub fn parse_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|source| ConfigLoadError::Json {
            origin: CONFIG_JSON_ENV.to_string(),
            source,
        })
    }

    /// Reject zero capacities and a seed the settings editor would refuse.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("store_channel_capacity", self.store_channel_capacity),
            ("context_mailbox_capacity", self.context_mailbox_capacity),
            ("broker_queue_capacity", self.broker_queue_capacity),
        ] {
            if value == 0 {
                return Err(ConfigLoadError::Invalid(format!(
                    "{name} must be at least 1"
                )));
            }
        }

        self.settings
            .validate()
            .map_err(|err| ConfigLoadError::Invalid(err.to_string()))
    }

    fn find_default_file(root: &Path) -> Option<PathBuf> {
        CANDIDATES
            .iter()
            .map(|candidate| root.join(candidate))
            .find(|path| path.exists())
    }
}
