//! Logging configuration
//!
//! Plain tracing-based logging; the suite is a test client, not a service,
//! so there is no OTEL export.
//!
//! # Example
//!
//! ```no_run
//! use hyperfleet_e2e::config::LogConfig;
//! use hyperfleet_e2e::telemetry::init_logging;
//!
//! init_logging(&LogConfig::default());
//! ```

use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, LogFormat, LogOutput};

/// Initialize logging with tracing-subscriber
///
/// `RUST_LOG` wins over the configured level when set. Safe to call more
/// than once; only the first call installs a subscriber.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter()));
    let registry = tracing_subscriber::registry().with(filter);

    let _ = match (config.format, config.output) {
        (LogFormat::Text, LogOutput::Stdout) => registry
            .with(fmt::layer().with_writer(std::io::stdout))
            .try_init(),
        (LogFormat::Text, LogOutput::Stderr) => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        (LogFormat::Json, LogOutput::Stdout) => registry
            .with(fmt::layer().json().with_writer(std::io::stdout))
            .try_init(),
        (LogFormat::Json, LogOutput::Stderr) => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
}
