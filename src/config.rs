//! Configuration for the e2e suite
//!
//! Values are layered, later layers winning:
//! defaults < config file < `HYPERFLEET_*` env vars < CLI flags.
//!
//! # Example
//!
//! ```
//! use hyperfleet_e2e::config::Config;
//! use std::time::Duration;
//!
//! let config = Config::new("http://localhost:8000")
//!     .poll_interval(Duration::from_secs(2))
//!     .cluster_ready_timeout(Duration::from_secs(600))
//!     .cluster_adapters(["clusters-namespace", "clusters-job"]);
//!
//! assert!(config.validate().is_ok());
//! ```
//!
//! A config file looks like:
//!
//! ```yaml
//! api:
//!   url: http://localhost:8000
//! timeouts:
//!   cluster:
//!     ready: 30m
//!   adapter:
//!     processing: 5m
//! polling:
//!   interval: 10s
//! log:
//!   level: debug
//!   format: json
//! adapters:
//!   cluster: [clusters-namespace, clusters-job, clusters-deployment]
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use clap::ValueEnum;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "HYPERFLEET";

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "HYPERFLEET_CONFIG";

/// Config file used when neither the flag nor the env var names one
pub const DEFAULT_CONFIG_PATH: &str = "configs/config.yaml";

const REDACTED: &str = "**REDACTED**";

/// Config path → environment variable
const ENV_BINDINGS: &[(&str, &str)] = &[
    ("api.url", "HYPERFLEET_API_URL"),
    ("timeouts.cluster.ready", "HYPERFLEET_TIMEOUTS_CLUSTER_READY"),
    ("timeouts.nodepool.ready", "HYPERFLEET_TIMEOUTS_NODEPOOL_READY"),
    ("timeouts.adapter.processing", "HYPERFLEET_TIMEOUTS_ADAPTER_PROCESSING"),
    ("polling.interval", "HYPERFLEET_POLLING_INTERVAL"),
    ("log.level", "HYPERFLEET_LOG_LEVEL"),
    ("log.format", "HYPERFLEET_LOG_FORMAT"),
    ("log.output", "HYPERFLEET_LOG_OUTPUT"),
    ("adapters.cluster", "HYPERFLEET_ADAPTERS_CLUSTER"),
    ("adapters.nodepool", "HYPERFLEET_ADAPTERS_NODEPOOL"),
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value '{value}' for {var}: {reason}")]
    InvalidEnv {
        var: String,
        value: String,
        reason: String,
    },

    #[error("api.url is required (set it in the config file, via HYPERFLEET_API_URL, or with --api-url)")]
    MissingApiUrl,

    #[error("api.url '{url}' is not a valid URL: {reason}")]
    InvalidApiUrl { url: String, reason: String },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("no config key '{0}' can be set from the environment")]
    UnknownKey(String),

    #[error("suite configuration has not been set")]
    SuiteUnset,
}

/// Complete suite configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub api: ApiConfig,
    pub timeouts: TimeoutsConfig,
    pub polling: PollingConfig,
    pub log: LogConfig,
    pub adapters: AdaptersConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutsConfig {
    pub cluster: ReadyTimeout,
    pub nodepool: ReadyTimeout,
    pub adapter: AdapterTimeout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadyTimeout {
    #[serde(with = "humantime_serde")]
    pub ready: Duration,
}

impl Default for ReadyTimeout {
    fn default() -> Self {
        Self {
            ready: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdapterTimeout {
    #[serde(with = "humantime_serde")]
    pub processing: Duration,
}

impl Default for AdapterTimeout {
    fn default() -> Self {
        Self {
            processing: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollingConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdaptersConfig {
    pub cluster: Vec<String>,
    pub nodepool: Vec<String>,
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            cluster: vec![
                "clusters-namespace".to_string(),
                "clusters-job".to_string(),
                "clusters-deployment".to_string(),
            ],
            nodepool: vec!["nodepools-configmap".to_string()],
        }
    }
}

/// Values given on the command line; `None` leaves the lower layers alone
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub api_url: Option<String>,
    pub log_level: Option<LogLevel>,
    pub log_format: Option<LogFormat>,
    pub log_output: Option<LogOutput>,
}

impl Config {
    /// Defaults with the given API URL
    pub fn new(api_url: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.api.url = api_url.into();
        config
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.polling.interval = interval;
        self
    }

    pub fn cluster_ready_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.cluster.ready = timeout;
        self
    }

    pub fn nodepool_ready_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.nodepool.ready = timeout;
        self
    }

    pub fn adapter_processing_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.adapter.processing = timeout;
        self
    }

    /// Adapters every cluster must be reconciled by
    pub fn cluster_adapters<I, S>(mut self, adapters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.adapters.cluster = adapters.into_iter().map(Into::into).collect();
        self
    }

    /// Adapters every nodepool must be reconciled by
    pub fn nodepool_adapters<I, S>(mut self, adapters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.adapters.nodepool = adapters.into_iter().map(Into::into).collect();
        self
    }

    pub fn log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Parse YAML; missing keys keep their defaults
    pub fn from_yaml_str(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            source: e,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml_str(&content, path)
    }

    /// Apply `HYPERFLEET_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|var| std::env::var(var).ok())
    }

    /// Apply overrides using `lookup` to resolve variable names
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (path, var) in ENV_BINDINGS {
            if let Some(value) = lookup(var) {
                self.set_path(path, var, value.trim())?;
            }
        }
        Ok(())
    }

    fn set_path(&mut self, path: &str, var: &str, raw: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidEnv {
            var: var.to_string(),
            value: raw.to_string(),
            reason,
        };
        let duration = || humantime::parse_duration(raw).map_err(|e| invalid(e.to_string()));
        let list = || -> Vec<String> {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };

        match path {
            "api.url" => self.api.url = raw.to_string(),
            "timeouts.cluster.ready" => self.timeouts.cluster.ready = duration()?,
            "timeouts.nodepool.ready" => self.timeouts.nodepool.ready = duration()?,
            "timeouts.adapter.processing" => self.timeouts.adapter.processing = duration()?,
            "polling.interval" => self.polling.interval = duration()?,
            "log.level" => self.log.level = LogLevel::from_str(raw, true).map_err(&invalid)?,
            "log.format" => self.log.format = LogFormat::from_str(raw, true).map_err(&invalid)?,
            "log.output" => self.log.output = LogOutput::from_str(raw, true).map_err(&invalid)?,
            "adapters.cluster" => self.adapters.cluster = list(),
            "adapters.nodepool" => self.adapters.nodepool = list(),
            _ => return Err(ConfigError::UnknownKey(path.to_string())),
        }
        Ok(())
    }

    /// Apply command-line values on top of everything else
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(url) = &overrides.api_url {
            self.api.url = url.clone();
        }
        if let Some(level) = overrides.log_level {
            self.log.level = level;
        }
        if let Some(format) = overrides.log_format {
            self.log.format = format;
        }
        if let Some(output) = overrides.log_output {
            self.log.output = output;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.url.trim().is_empty() {
            return Err(ConfigError::MissingApiUrl);
        }
        Url::parse(&self.api.url).map_err(|e| ConfigError::InvalidApiUrl {
            url: redact_url(&self.api.url),
            reason: e.to_string(),
        })?;

        let durations = [
            ("timeouts.cluster.ready", self.timeouts.cluster.ready),
            ("timeouts.nodepool.ready", self.timeouts.nodepool.ready),
            ("timeouts.adapter.processing", self.timeouts.adapter.processing),
            ("polling.interval", self.polling.interval),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
        }
        Ok(())
    }

    /// Log the effective configuration with credentials redacted
    pub fn display(&self) {
        info!(
            api_url = %redact_url(&self.api.url),
            cluster_ready_timeout = ?self.timeouts.cluster.ready,
            nodepool_ready_timeout = ?self.timeouts.nodepool.ready,
            adapter_processing_timeout = ?self.timeouts.adapter.processing,
            poll_interval = ?self.polling.interval,
            log_level = self.log.level.as_filter(),
            log_format = ?self.log.format,
            log_output = ?self.log.output,
            cluster_adapters = %self.adapters.cluster.join(","),
            nodepool_adapters = %self.adapters.nodepool.join(","),
            "Loaded configuration"
        );
    }
}

/// Choose the config file: flag, then `HYPERFLEET_CONFIG`, then the default path if present
pub fn resolve_config_path<F>(flag: Option<&Path>, lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = flag {
        return Some(path.to_path_buf());
    }
    if let Some(path) = lookup(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
    default.exists().then_some(default)
}

/// Build the effective configuration from every layer and validate it
pub fn load(overrides: &Overrides) -> Result<Config, ConfigError> {
    load_with(overrides, |var| std::env::var(var).ok())
}

/// `load` with an explicit environment lookup
pub fn load_with<F>(overrides: &Overrides, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match resolve_config_path(overrides.config_file.as_deref(), &lookup) {
        Some(path) => Config::from_file(&path)?,
        None => Config::default(),
    };
    config.apply_env_with(&lookup)?;
    config.apply_overrides(overrides);
    config.validate()?;
    Ok(config)
}

/// Replace any userinfo in `url` with a placeholder
///
/// Unparseable input is returned unchanged; an empty string renders as
/// `<not set>`.
pub fn redact_url(url: &str) -> String {
    if url.is_empty() {
        return "<not set>".to_string();
    }
    match Url::parse(url) {
        Ok(mut parsed) if !parsed.username().is_empty() || parsed.password().is_some() => {
            if parsed.set_password(None).is_err() || parsed.set_username(REDACTED).is_err() {
                return REDACTED.to_string();
            }
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}

static SUITE_CONFIG: RwLock<Option<Arc<Config>>> = RwLock::new(None);

/// Publish the configuration for the running suite
pub fn set_suite_config(config: Config) {
    let mut slot = SUITE_CONFIG.write().unwrap_or_else(PoisonError::into_inner);
    *slot = Some(Arc::new(config));
}

/// Configuration of the running suite, if one was set
pub fn suite_config() -> Option<Arc<Config>> {
    SUITE_CONFIG
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

pub fn clear_suite_config() {
    let mut slot = SUITE_CONFIG.write().unwrap_or_else(PoisonError::into_inner);
    *slot = None;
}
