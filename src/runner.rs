//! Scenario runner
//!
//! Selects registered scenarios and runs them one after another:
//! - Filter by labels, then by focus/skip substrings of the name
//! - Share one cancellation token (Ctrl-C or the suite timeout cancel it)
//! - Turn panics into failures and collect a summary

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tracing::{error, info, warn};

use crate::helper::Helper;
use crate::labels::LabelFilter;
use crate::suite::ScenarioSpec;

/// Default limit for a whole suite run
pub const DEFAULT_SUITE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

/// Which scenarios to run and for how long
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub label_filter: LabelFilter,
    pub focus: Option<String>,
    pub skip: Option<String>,
    pub suite_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            label_filter: LabelFilter::default(),
            focus: None,
            skip: None,
            suite_timeout: DEFAULT_SUITE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(String),
    /// Not started because the suite was already cancelled
    Skipped,
}

#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub name: &'static str,
    pub outcome: Outcome,
    pub duration: Duration,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }
}

/// Results of a suite run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub results: Vec<ScenarioResult>,
    pub duration: Duration,
}

impl RunSummary {
    /// True when no scenario failed or was skipped
    pub fn passed(&self) -> bool {
        self.results.iter().all(ScenarioResult::passed)
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Ran {} scenario(s) in {:.1?}: {} passed, {} failed, {} skipped",
            self.results.len(),
            self.duration,
            self.count(|o| *o == Outcome::Passed),
            self.count(|o| matches!(o, Outcome::Failed(_))),
            self.count(|o| *o == Outcome::Skipped),
        )?;
        for result in &self.results {
            match &result.outcome {
                Outcome::Passed => {
                    writeln!(f, "  ✅ {} ({:.1?})", result.name, result.duration)?;
                }
                Outcome::Failed(reason) => {
                    writeln!(f, "  ❌ {} ({:.1?})", result.name, result.duration)?;
                    for line in reason.lines() {
                        writeln!(f, "       {line}")?;
                    }
                }
                Outcome::Skipped => writeln!(f, "  ⏭  {} (skipped)", result.name)?,
            }
        }
        Ok(())
    }
}

/// Scenarios matching the label filter and focus/skip patterns, in registry order
pub fn select(specs: &[ScenarioSpec], options: &RunOptions) -> Vec<ScenarioSpec> {
    let focus = options.focus.as_deref().filter(|s| !s.is_empty());
    let skip = options.skip.as_deref().filter(|s| !s.is_empty());

    specs
        .iter()
        .filter(|s| options.label_filter.matches(s.labels))
        .filter(|s| focus.map_or(true, |f| s.name.contains(f)))
        .filter(|s| skip.map_or(true, |k| !s.name.contains(k)))
        .copied()
        .collect()
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "scenario panicked".to_string()
    }
}

/// Run `specs` sequentially with `helper`
///
/// Once the helper's token is cancelled, either externally or by the suite
/// timeout, the running scenario aborts at its next wait and the remaining
/// ones are reported as skipped.
pub async fn run_suite(
    helper: &Helper,
    specs: &[ScenarioSpec],
    suite_timeout: Duration,
) -> RunSummary {
    let start = Instant::now();
    let cancel = helper.cancellation().clone();

    let watchdog = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(suite_timeout) => {
                    warn!(timeout = ?suite_timeout, "Suite timeout reached, cancelling");
                    cancel.cancel();
                }
            }
        }
    });

    let mut results = Vec::with_capacity(specs.len());
    for spec in specs {
        if cancel.is_cancelled() {
            results.push(ScenarioResult {
                name: spec.name,
                outcome: Outcome::Skipped,
                duration: Duration::ZERO,
            });
            continue;
        }

        info!(scenario = %spec.name, labels = ?spec.labels, "Running scenario");
        let scenario_start = Instant::now();
        let run = (spec.run)(helper.clone());
        let outcome = match AssertUnwindSafe(run).catch_unwind().await {
            Ok(Ok(())) => Outcome::Passed,
            Ok(Err(e)) => Outcome::Failed(e.to_string()),
            Err(panic) => Outcome::Failed(format!("panicked: {}", panic_message(&*panic))),
        };
        let duration = scenario_start.elapsed();

        match &outcome {
            Outcome::Passed => info!(scenario = %spec.name, duration = ?duration, "Scenario passed"),
            Outcome::Failed(reason) => {
                error!(scenario = %spec.name, duration = ?duration, error = %reason, "Scenario failed");
            }
            Outcome::Skipped => {}
        }
        results.push(ScenarioResult {
            name: spec.name,
            outcome,
            duration,
        });
    }

    watchdog.abort();
    RunSummary {
        results,
        duration: start.elapsed(),
    }
}
