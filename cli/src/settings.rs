//! Settings file support for the `testomat` binary.
//!
//! A TOML file provides the lowest layer of configuration. Environment
//! variables and flags are applied on top of it by the caller.

use reporter::{ReporterConfig, ReporterError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings file {path}: {source}")]
    Settings {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid result file {path}: {source}")]
    ResultFile {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Reporting failed: {0}")]
    Reporting(String),

    #[error(transparent)]
    Client(#[from] ReporterError),
}

/// Contents of a `testomat.toml` file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub title: Option<String>,
    pub group_title: Option<String>,
    pub env: Option<String>,
    pub parallel: Option<bool>,
    pub proceed: Option<bool>,
    pub colored_output: Option<bool>,
    pub timeout_secs: Option<u64>,
}

impl FileSettings {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| CliError::Settings {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Copies every key present in the file onto `config`.
    pub fn apply(self, mut config: ReporterConfig) -> ReporterConfig {
        if let Some(url) = self.url {
            config = config.with_base_url(url);
        }
        if let Some(api_key) = self.api_key {
            config = config.with_api_key(api_key);
        }
        if let Some(title) = self.title {
            config = config.with_title(title);
        }
        if let Some(group_title) = self.group_title {
            config = config.with_group_title(group_title);
        }
        if let Some(env) = self.env {
            config = config.with_env(env);
        }
        if let Some(parallel) = self.parallel {
            config = config.with_parallel(parallel);
        }
        if let Some(proceed) = self.proceed {
            config = config.with_proceed(proceed);
        }
        if let Some(colored) = self.colored_output {
            config = config.with_colored_output(colored);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }
}
