//! JUnit XML reports for CI
//!
//! One `<testsuite>` per run, one `<testcase>` per scenario. Failures carry
//! the first line of the error as the message and the full text as the body.

use std::path::{Path, PathBuf};

use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use tracing::info;

use crate::runner::{Outcome, RunSummary};

const REPORT_NAME: &str = "hyperfleet-e2e";
const SUITE_NAME: &str = "HyperFleet E2E";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to create report directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write JUnit report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize JUnit report: {0}")]
    Serialize(#[from] quick_junit::SerializeError),
}

/// Build the JUnit document for a finished run
pub fn junit_report(summary: &RunSummary) -> Report {
    let mut suite = TestSuite::new(SUITE_NAME);
    suite.set_time(summary.duration);

    for result in &summary.results {
        let status = match &result.outcome {
            Outcome::Passed => TestCaseStatus::success(),
            Outcome::Failed(reason) => {
                let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
                status.set_message(reason.lines().next().unwrap_or_default());
                status.set_description(reason.as_str());
                status
            }
            Outcome::Skipped => {
                let mut status = TestCaseStatus::skipped();
                status.set_message("suite cancelled before the scenario started");
                status
            }
        };
        let mut case = TestCase::new(result.name, status);
        case.set_classname(SUITE_NAME);
        case.set_time(result.duration);
        suite.add_test_case(case);
    }

    let mut report = Report::new(REPORT_NAME);
    report.set_time(summary.duration);
    report.add_test_suite(suite);
    report
}

/// Write the run as JUnit XML to `path`, creating parent directories
pub fn write_junit_report(summary: &RunSummary, path: &Path) -> Result<(), ReportError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| ReportError::CreateDir {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }

    let xml = junit_report(summary).to_string()?;
    std::fs::write(path, xml).map_err(|e| ReportError::Write {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!(path = %path.display(), scenarios = summary.results.len(), "JUnit report written");
    Ok(())
}
