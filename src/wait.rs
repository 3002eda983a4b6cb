//! Rich wait errors with debugging context
//!
//! A `WaitError` carries everything an operator needs when a wait gives up:
//! what was being waited on, the last state actually observed, how many
//! polls were made, and the last transport error if the final poll failed.
//!
//! # Example
//!
//! ```ignore
//! match helper.wait_for_condition(&target, "Ready", ConditionStatus::True, timeout).await {
//!     Err(E2eError::Timeout(err)) => {
//!         println!("Resource: {}", err.resource);
//!         println!("Last state: {}", err.last_state);
//!         println!("Attempts: {}", err.attempts);
//!     }
//!     _ => {}
//! }
//! ```

use std::fmt;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Namespace;

/// Rich error context for wait operations
#[derive(Debug, Clone, PartialEq)]
pub struct WaitError {
    /// What was being waited on (e.g. "cluster/2abc Ready=True")
    pub resource: String,
    /// Description of the last successfully observed state
    pub last_state: String,
    /// How long we waited before giving up
    pub elapsed: Duration,
    /// The timeout that was configured
    pub timeout: Duration,
    /// Number of polls made
    pub attempts: u32,
    /// Error from the final poll, if it failed
    pub last_error: Option<String>,
}

impl WaitError {
    pub fn new(resource: impl Into<String>, timeout: Duration, elapsed: Duration) -> Self {
        Self {
            resource: resource.into(),
            last_state: "never observed".to_string(),
            elapsed,
            timeout,
            attempts: 0,
            last_error: None,
        }
    }

    /// Set the last observed state
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.last_state = state.into();
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Record the error returned by the final poll
    pub fn with_last_error(mut self, error: impl Into<String>) -> Self {
        self.last_error = Some(error.into());
        self
    }
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        match &self.last_error {
            Some(_) => writeln!(f, "Wait failed for {} (final poll errored)", self.resource)?,
            None => writeln!(f, "Wait timeout for {}", self.resource)?,
        }
        writeln!(f, "├─ Last state: {}", self.last_state)?;
        if let Some(err) = &self.last_error {
            writeln!(f, "├─ Last error: {err}")?;
        }
        writeln!(f, "├─ Attempts: {}", self.attempts)?;
        writeln!(f, "├─ Elapsed: {:?}", self.elapsed)?;
        write!(f, "└─ Timeout: {:?}", self.timeout)
    }
}

impl std::error::Error for WaitError {}

/// Human-readable description of an observed snapshot
///
/// The poll engine records this for the last snapshot it saw so timeouts
/// explain where convergence stalled.
pub trait ResourceState {
    fn state_description(&self) -> String;
}

impl ResourceState for () {
    fn state_description(&self) -> String {
        "observed".to_string()
    }
}

impl ResourceState for Namespace {
    fn state_description(&self) -> String {
        let phase = self
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or("Unknown");
        format!("phase={phase}")
    }
}

impl ResourceState for Job {
    fn state_description(&self) -> String {
        let status = self.status.as_ref();
        let active = status.and_then(|s| s.active).unwrap_or(0);
        let succeeded = status.and_then(|s| s.succeeded).unwrap_or(0);
        let failed = status.and_then(|s| s.failed).unwrap_or(0);
        let conditions: Vec<String> = status
            .and_then(|s| s.conditions.as_ref())
            .map(|cs| {
                cs.iter()
                    .map(|c| format!("{}={}", c.type_, c.status))
                    .collect()
            })
            .unwrap_or_default();

        if conditions.is_empty() {
            format!("active={active}, succeeded={succeeded}, failed={failed}")
        } else {
            format!(
                "active={}, succeeded={}, failed={}, conditions: {}",
                active,
                succeeded,
                failed,
                conditions.join(" ")
            )
        }
    }
}

impl ResourceState for Deployment {
    fn state_description(&self) -> String {
        let spec_replicas = self.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        let ready = self
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0);
        let available = self
            .status
            .as_ref()
            .and_then(|s| s.available_replicas)
            .unwrap_or(0);
        let unavailable = self
            .status
            .as_ref()
            .and_then(|s| s.unavailable_replicas)
            .unwrap_or(0);

        if unavailable > 0 {
            format!(
                "{}/{} ready, {} unavailable",
                ready, spec_replicas, unavailable
            )
        } else {
            format!(
                "{}/{} ready, {}/{} available",
                ready, spec_replicas, available, spec_replicas
            )
        }
    }
}
