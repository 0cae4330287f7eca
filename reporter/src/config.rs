use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://app.testomat.io";

pub const ENV_URL: &str = "TESTOMATIO_URL";
pub const ENV_API_KEY: &str = "TESTOMATIO";
pub const ENV_TITLE: &str = "TESTOMATIO_TITLE";
pub const ENV_GROUP_TITLE: &str = "TESTOMATIO_RUNGROUP_TITLE";
pub const ENV_ENVIRONMENT: &str = "TESTOMATIO_ENV";
pub const ENV_RUN: &str = "TESTOMATIO_RUN";
pub const ENV_SHARED_RUN: &str = "TESTOMATIO_SHARED_RUN";
pub const ENV_PROCEED: &str = "TESTOMATIO_PROCEED";

/// Settings resolved once before a [`crate::TestomatClient`] is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReporterConfig {
    pub base_url: String,
    pub api_key: String,
    pub title: Option<String>,
    pub group_title: Option<String>,
    pub env: Option<String>,
    /// Id of a run created by another process; resumed instead of created.
    pub run_id: Option<String>,
    pub parallel: bool,
    /// Keep the run open when the status update would normally finish it.
    pub proceed: bool,
    pub colored_output: bool,
    pub timeout: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            title: None,
            group_title: None,
            env: None,
            run_id: None,
            parallel: false,
            proceed: false,
            colored_output: true,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ReporterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the `TESTOMATIO*` environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(url) = env_value(ENV_URL) {
            config.base_url = url;
        }
        if let Some(api_key) = env_value(ENV_API_KEY) {
            config.api_key = api_key;
        }
        config.title = env_value(ENV_TITLE);
        config.group_title = env_value(ENV_GROUP_TITLE);
        config.env = env_value(ENV_ENVIRONMENT);
        config.run_id = env_value(ENV_RUN);
        config.parallel = env_flag(ENV_SHARED_RUN);
        config.proceed = env_flag(ENV_PROCEED);

        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_group_title(mut self, group_title: impl Into<String>) -> Self {
        self.group_title = Some(group_title.into());
        self
    }

    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_proceed(mut self, proceed: bool) -> Self {
        self.proceed = proceed;
        self
    }

    pub fn with_colored_output(mut self, colored_output: bool) -> Self {
        self.colored_output = colored_output;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL without a trailing slash, ready for path concatenation.
    pub fn api_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Syntax check of the reporting endpoint only.
    pub fn validate_url(&self) -> Result<url::Url, String> {
        if self.base_url.is_empty() {
            return Err("Base URL cannot be empty".to_string());
        }

        let parsed = url::Url::parse(&self.base_url)
            .map_err(|e| format!("Base URL '{}' is not a valid URL: {}", self.base_url, e))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err("Base URL must start with http:// or https://".to_string());
        }

        if parsed.host_str().is_none() {
            return Err("Base URL must contain a host".to_string());
        }

        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.validate_url()?;

        if self.api_key.trim().is_empty() {
            return Err("API key cannot be empty".to_string());
        }

        if self.timeout.is_zero() {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_flag(name: &str) -> bool {
    env_value(name)
        .map(|value| !matches!(value.to_ascii_lowercase().as_str(), "0" | "false" | "no"))
        .unwrap_or(false)
}
