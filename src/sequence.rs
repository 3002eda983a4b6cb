//! Dependency-sequence verification
//!
//! Watches two adapters, a dependency A and a dependent B, and checks that
//! B holds back until A is Available:
//!
//! ```text
//! WAITING ──(A.Available=True)──> PROCEEDING ──(B.Available=True)──> SUCCEEDED
//!    │                                │
//!    └──────────(deadline)────────────┴──> TIMED_OUT
//! ```
//!
//! While WAITING, B must not report Applied=True and its Available
//! condition must be Unknown or absent. Once A has been seen Available the
//! dependency is treated as satisfied for the rest of the run, even if A
//! later flips back.

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::ApiError;
use crate::condition::{describe_conditions, has_condition, APPLIED, AVAILABLE};
use crate::model::{AdapterStatus, AdapterStatusList, Condition, ConditionStatus};
use crate::poll::{poll_until, PollError, Retryable};
use crate::wait::ResourceState;

/// Polling interval used for ordering checks
///
/// Kept short so a brief early-success window on the dependent is caught.
pub const DEPENDENCY_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencePhase {
    Waiting,
    Proceeding,
    Succeeded,
}

impl fmt::Display for SequencePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequencePhase::Waiting => f.write_str("WAITING"),
            SequencePhase::Proceeding => f.write_str("PROCEEDING"),
            SequencePhase::Succeeded => f.write_str("SUCCEEDED"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error(
        "ordering violated at poll {poll}: {dependent} reported {condition}={status} \
         before {dependency} was Available (snapshot: {snapshot})"
    )]
    OrderingViolation {
        poll: u32,
        dependency: String,
        dependent: String,
        condition: String,
        status: ConditionStatus,
        snapshot: String,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Retryable for SequenceError {
    fn is_retryable(&self) -> bool {
        match self {
            SequenceError::OrderingViolation { .. } => false,
            SequenceError::Api(e) => e.is_retryable(),
        }
    }
}

/// State carried between polls of one dependency check
#[derive(Debug, Clone)]
pub struct SequenceTracker {
    dependency: String,
    dependent: String,
    polls: u32,
    dependency_ready_at: Option<u32>,
}

impl SequenceTracker {
    pub fn new(dependency: impl Into<String>, dependent: impl Into<String>) -> Self {
        Self {
            dependency: dependency.into(),
            dependent: dependent.into(),
            polls: 0,
            dependency_ready_at: None,
        }
    }

    /// Polls observed so far
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Poll at which the dependency was first seen Available, if ever
    pub fn dependency_ready_at(&self) -> Option<u32> {
        self.dependency_ready_at
    }

    /// Apply one snapshot and return the resulting phase
    pub fn observe(&mut self, statuses: &[AdapterStatus]) -> Result<SequencePhase, SequenceError> {
        self.polls += 1;
        let dependency = conditions_of(statuses, &self.dependency);
        let dependent = conditions_of(statuses, &self.dependent);

        let dependency_available = has_condition(dependency, AVAILABLE, ConditionStatus::True);
        match self.dependency_ready_at {
            None if dependency_available => {
                self.dependency_ready_at = Some(self.polls);
                info!(
                    dependency = %self.dependency,
                    dependent = %self.dependent,
                    poll = self.polls,
                    "Dependency available, dependent may proceed"
                );
            }
            Some(_) if !dependency_available => {
                debug!(
                    dependency = %self.dependency,
                    poll = self.polls,
                    "Dependency no longer reports Available=True, keeping PROCEEDING"
                );
            }
            _ => {}
        }

        if self.dependency_ready_at.is_none() {
            if let Some(condition) = premature_condition(dependent) {
                return Err(SequenceError::OrderingViolation {
                    poll: self.polls,
                    dependency: self.dependency.clone(),
                    dependent: self.dependent.clone(),
                    condition: condition.type_.clone(),
                    status: condition.status,
                    snapshot: describe_pair(
                        &self.dependency,
                        dependency,
                        &self.dependent,
                        dependent,
                    ),
                });
            }
            return Ok(SequencePhase::Waiting);
        }

        if has_condition(dependent, AVAILABLE, ConditionStatus::True) {
            Ok(SequencePhase::Succeeded)
        } else {
            Ok(SequencePhase::Proceeding)
        }
    }
}

/// A condition on the dependent that must not appear before the dependency is ready
///
/// Every entry is checked, including repeated types.
fn premature_condition(dependent: &[Condition]) -> Option<&Condition> {
    dependent
        .iter()
        .find(|c| c.type_ == APPLIED && c.status == ConditionStatus::True)
        .or_else(|| {
            dependent
                .iter()
                .find(|c| c.type_ == AVAILABLE && c.status != ConditionStatus::Unknown)
        })
}

fn conditions_of<'a>(statuses: &'a [AdapterStatus], adapter: &str) -> &'a [Condition] {
    statuses
        .iter()
        .find(|s| s.adapter == adapter)
        .map_or(&[], |s| s.conditions.as_slice())
}

fn describe_pair(a: &str, a_conds: &[Condition], b: &str, b_conds: &[Condition]) -> String {
    format!(
        "{a}[{}] {b}[{}]",
        describe_conditions(a_conds),
        describe_conditions(b_conds)
    )
}

/// Phase plus the pair of reports it was derived from
#[derive(Debug, Clone)]
pub struct SequenceProbe {
    pub phase: SequencePhase,
    pub snapshot: String,
}

impl ResourceState for SequenceProbe {
    fn state_description(&self) -> String {
        format!("{}: {}", self.phase, self.snapshot)
    }
}

/// Outcome of a successful dependency check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceReport {
    pub polls: u32,
    pub dependency_ready_at: u32,
}

/// Poll adapter statuses until the dependent succeeds after its dependency
///
/// Fails with `PollError::Fatal(OrderingViolation)` as soon as the dependent
/// gets ahead of the dependency, and with `PollError::Timeout` if the
/// sequence has not reached SUCCEEDED by the deadline.
pub async fn verify_dependency_sequence<F, Fut>(
    resource: impl Into<String>,
    mut fetch: F,
    dependency: &str,
    dependent: &str,
    interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<SequenceReport, PollError<SequenceError>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<AdapterStatusList, ApiError>>,
{
    let tracker = Mutex::new(SequenceTracker::new(dependency, dependent));
    let tracker_ref = &tracker;

    poll_until(
        resource,
        || {
            let statuses = fetch();
            async move {
                let list = statuses.await?;
                let mut tracker = tracker_ref.lock().unwrap_or_else(PoisonError::into_inner);
                let phase = tracker.observe(&list.items)?;
                Ok::<_, SequenceError>(SequenceProbe {
                    phase,
                    snapshot: describe_pair(
                        &tracker.dependency,
                        conditions_of(&list.items, &tracker.dependency),
                        &tracker.dependent,
                        conditions_of(&list.items, &tracker.dependent),
                    ),
                })
            }
        },
        |probe: &SequenceProbe| probe.phase == SequencePhase::Succeeded,
    )
    .interval(interval)
    .timeout(timeout)
    .cancel_on(cancel.clone())
    .await_converged()
    .await?;

    let tracker = tracker.into_inner().unwrap_or_else(PoisonError::into_inner);
    Ok(SequenceReport {
        polls: tracker.polls,
        dependency_ready_at: tracker.dependency_ready_at.unwrap_or(tracker.polls),
    })
}
