//! Command line interface
//!
//! ```text
//! hyperfleet-e2e [--config FILE] [--api-url URL] [--log-level LEVEL] test \
//!     [--label-filter EXPR] [--focus TEXT] [--skip TEXT] [--suite-timeout 2h] \
//!     [--junit-report FILE]
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::config::{
    self, clear_suite_config, set_suite_config, Config, LogFormat, LogLevel, LogOutput, Overrides,
};
use crate::error::E2eError;
use crate::helper::Helper;
use crate::labels::{LabelError, LabelFilter};
use crate::report::write_junit_report;
use crate::runner::{run_suite, select, RunOptions};
use crate::suite::registry;
use crate::telemetry::init_logging;

/// HyperFleet end-to-end test suite
#[derive(Debug, Parser)]
#[command(name = "hyperfleet-e2e", version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: $HYPERFLEET_CONFIG, then ./configs/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// HyperFleet API URL
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    #[arg(long, global = true, value_enum)]
    pub log_output: Option<LogOutput>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the end-to-end scenarios
    Test(TestArgs),
}

#[derive(Debug, Args)]
pub struct TestArgs {
    /// Label expression: `,` is OR, `&&` is AND, `!` negates
    #[arg(long, env = "HYPERFLEET_LABEL_FILTER", default_value = "")]
    pub label_filter: String,

    /// Only run scenarios whose name contains this text
    #[arg(long, env = "HYPERFLEET_FOCUS")]
    pub focus: Option<String>,

    /// Skip scenarios whose name contains this text
    #[arg(long, env = "HYPERFLEET_SKIP")]
    pub skip: Option<String>,

    /// Cancel the whole run after this long
    #[arg(
        long,
        env = "HYPERFLEET_SUITE_TIMEOUT",
        default_value = "2h",
        value_parser = humantime::parse_duration
    )]
    pub suite_timeout: Duration,

    /// Write a JUnit XML report of the run to this path
    #[arg(long, env = "JUNIT_REPORT_PATH")]
    pub junit_report: Option<PathBuf>,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            config_file: self.config.clone(),
            api_url: self.api_url.clone(),
            log_level: self.log_level,
            log_format: self.log_format,
            log_output: self.log_output,
        }
    }
}

impl TestArgs {
    pub fn run_options(&self) -> Result<RunOptions, LabelError> {
        Ok(RunOptions {
            label_filter: LabelFilter::parse(&self.label_filter)?,
            focus: self.focus.clone(),
            skip: self.skip.clone(),
            suite_timeout: self.suite_timeout,
        })
    }
}

/// Load configuration, set up logging and dispatch the subcommand
pub async fn run(cli: Cli) -> Result<ExitCode, E2eError> {
    let config = config::load(&cli.overrides())?;
    init_logging(&config.log);
    config.display();

    match &cli.command {
        Command::Test(args) => run_tests(config, args).await,
    }
}

async fn run_tests(config: Config, args: &TestArgs) -> Result<ExitCode, E2eError> {
    let options = args.run_options()?;
    let specs = select(&registry(), &options);
    if specs.is_empty() {
        warn!(
            label_filter = %args.label_filter,
            focus = ?options.focus,
            skip = ?options.skip,
            "No scenarios selected"
        );
    }

    set_suite_config(config);
    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling the suite");
                cancel.cancel();
            }
        }
    });

    let summary = match Helper::connect_suite().await {
        Ok(helper) => {
            let helper = helper.with_cancellation(cancel);
            Ok(run_suite(&helper, &specs, options.suite_timeout).await)
        }
        Err(e) => Err(e),
    };
    interrupt.abort();
    clear_suite_config();

    let summary = summary?;
    println!("{summary}");
    if let Some(path) = &args.junit_report {
        if let Err(e) = write_junit_report(&summary, path) {
            error!(path = %path.display(), error = %e, "Failed to write JUnit report");
        }
    }
    Ok(if summary.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
