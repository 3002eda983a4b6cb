//! Poll-until-converged engine
//!
//! Repeatedly fetches a snapshot, tests it, and sleeps until the predicate
//! holds, the deadline passes, or the caller cancels. Every wait in the
//! crate goes through here.
//!
//! # Example
//!
//! ```ignore
//! use hyperfleet_e2e::poll::poll_until;
//! use std::time::Duration;
//!
//! let cluster = poll_until("cluster/abc Ready=True", || api.get_cluster("abc"), |c| is_ready(c))
//!     .timeout(Duration::from_secs(1800))
//!     .interval(Duration::from_secs(10))
//!     .cancel_on(token.clone())
//!     .await_converged()
//!     .await?;
//! ```
//!
//! Guarantees:
//! - the predicate is evaluated at least once, even with a zero timeout
//! - no poll starts after the deadline has passed
//! - a poll in flight when the deadline passes is allowed to finish
//! - cancellation interrupts both in-flight fetches and sleeps

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::wait::{ResourceState, WaitError};

/// Classifies fetch errors as transient (retry) or fatal (abort the wait)
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Why a poll loop ended without converging
#[derive(Debug, thiserror::Error)]
pub enum PollError<E>
where
    E: std::error::Error + 'static,
{
    /// Every poll succeeded but none satisfied the predicate
    #[error("{0}")]
    Timeout(WaitError),

    /// The deadline passed and the final poll failed with a transport error
    #[error("{0}")]
    Unreachable(WaitError),

    #[error("cancelled while waiting for {resource} after {elapsed:?}")]
    Cancelled { resource: String, elapsed: Duration },

    /// A fetch error that retrying cannot fix
    #[error(transparent)]
    Fatal(E),
}

impl<E> PollError<E>
where
    E: std::error::Error + 'static,
{
    /// The wait record for timeouts and transport failures
    pub fn wait_error(&self) -> Option<&WaitError> {
        match self {
            PollError::Timeout(w) | PollError::Unreachable(w) => Some(w),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PollError::Cancelled { .. })
    }
}

/// Builder for a poll loop
pub struct Poll<F, P> {
    resource: String,
    fetch: F,
    is_satisfied: P,
    timeout: Duration,
    interval: Duration,
    cancel: CancellationToken,
}

/// Create a poll loop that fetches until `is_satisfied` holds
///
/// Default timeout: 30 seconds
/// Default interval: 250ms
pub fn poll_until<F, P>(resource: impl Into<String>, fetch: F, is_satisfied: P) -> Poll<F, P> {
    Poll {
        resource: resource.into(),
        fetch,
        is_satisfied,
        timeout: Duration::from_secs(30),
        interval: Duration::from_millis(250),
        cancel: CancellationToken::new(),
    }
}

/// Poll `fetch` every `interval` until `is_satisfied` holds or `timeout` passes
///
/// Returns the first snapshot satisfying the predicate.
pub async fn wait_for_condition<T, E, F, Fut, P>(
    fetch: F,
    is_satisfied: P,
    interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
    T: ResourceState,
    E: Retryable + std::error::Error + 'static,
{
    poll_until("resource", fetch, is_satisfied)
        .interval(interval)
        .timeout(timeout)
        .cancel_on(cancel.clone())
        .await_converged()
        .await
}

impl<F, P> Poll<F, P> {
    /// Set the timeout duration
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the polling interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Abort the wait when `token` is cancelled
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the loop until convergence, timeout, fatal error, or cancellation
    pub async fn await_converged<T, E, Fut>(self) -> Result<T, PollError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&T) -> bool,
        T: ResourceState,
        E: Retryable + std::error::Error + 'static,
    {
        let Poll {
            resource,
            mut fetch,
            is_satisfied,
            timeout,
            interval,
            cancel,
        } = self;

        let start = Instant::now();
        let mut attempts = 0u32;
        let mut last_state: Option<String> = None;
        let mut last_error: Option<String>;

        debug!(resource = %resource, timeout = ?timeout, interval = ?interval, "Starting poll");

        loop {
            attempts += 1;

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(PollError::Cancelled { resource, elapsed: start.elapsed() });
                }
                outcome = fetch() => outcome,
            };

            match outcome {
                Ok(snapshot) => {
                    if is_satisfied(&snapshot) {
                        info!(
                            resource = %resource,
                            attempts = attempts,
                            elapsed = ?start.elapsed(),
                            "Converged"
                        );
                        return Ok(snapshot);
                    }
                    let state = snapshot.state_description();
                    debug!(
                        resource = %resource,
                        attempt = attempts,
                        elapsed = ?start.elapsed(),
                        state = %state,
                        "Not converged yet, waiting..."
                    );
                    last_state = Some(state);
                    last_error = None;
                }
                Err(e) if !e.is_retryable() => {
                    debug!(resource = %resource, error = %e, "Fatal error while polling");
                    return Err(PollError::Fatal(e));
                }
                Err(e) => {
                    debug!(
                        resource = %resource,
                        attempt = attempts,
                        elapsed = ?start.elapsed(),
                        error = %e,
                        "Poll failed, retrying..."
                    );
                    last_error = Some(e.to_string());
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(give_up(resource, timeout, elapsed, attempts, last_state, last_error));
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(PollError::Cancelled { resource, elapsed: start.elapsed() });
                }
                () = sleep(interval.min(timeout - elapsed)) => {}
            }

            let elapsed = start.elapsed();
            if elapsed > timeout {
                return Err(give_up(resource, timeout, elapsed, attempts, last_state, last_error));
            }
        }
    }
}

fn give_up<E>(
    resource: String,
    timeout: Duration,
    elapsed: Duration,
    attempts: u32,
    last_state: Option<String>,
    last_error: Option<String>,
) -> PollError<E>
where
    E: std::error::Error + 'static,
{
    let mut err = WaitError::new(resource, timeout, elapsed).with_attempts(attempts);
    if let Some(state) = last_state {
        err = err.with_state(state);
    }
    match last_error {
        Some(e) => PollError::Unreachable(err.with_last_error(e)),
        None => PollError::Timeout(err),
    }
}
