//! Suite-level error
//!
//! Every module keeps its own error enum; scenarios see them through
//! `E2eError`.

use std::time::Duration;

use crate::adapters::AdapterError;
use crate::client::ApiError;
use crate::config::ConfigError;
use crate::labels::LabelError;
use crate::payload::PayloadError;
use crate::poll::PollError;
use crate::resources::ResourceError;
use crate::sequence::SequenceError;
use crate::wait::WaitError;

#[derive(Debug, thiserror::Error)]
pub enum E2eError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Label(#[from] LabelError),

    #[error("failed to create Kubernetes client: {0}")]
    Kube(#[from] kube::Error),

    #[error("{0}")]
    Timeout(WaitError),

    #[error("{0}")]
    Unreachable(WaitError),

    #[error("cancelled while waiting for {resource} after {elapsed:?}")]
    Cancelled { resource: String, elapsed: Duration },

    #[error("assertion failed: {0}")]
    Assertion(String),
}

impl E2eError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, E2eError::Cancelled { .. })
    }

    /// The wait record for timeouts and transport failures
    pub fn wait_error(&self) -> Option<&WaitError> {
        match self {
            E2eError::Timeout(w) | E2eError::Unreachable(w) => Some(w),
            _ => None,
        }
    }
}

impl<E> From<PollError<E>> for E2eError
where
    E: std::error::Error + Into<E2eError> + 'static,
{
    fn from(err: PollError<E>) -> Self {
        match err {
            PollError::Timeout(w) => E2eError::Timeout(w),
            PollError::Unreachable(w) => E2eError::Unreachable(w),
            PollError::Cancelled { resource, elapsed } => E2eError::Cancelled { resource, elapsed },
            PollError::Fatal(e) => e.into(),
        }
    }
}

/// Fail with `E2eError::Assertion` unless `condition` holds
pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), E2eError> {
    if condition {
        Ok(())
    } else {
        Err(E2eError::Assertion(message()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ObjectKind;

    #[test]
    fn test_poll_error_conversion() {
        let timeout: PollError<ApiError> = PollError::Timeout(
            WaitError::new("cluster/a", Duration::from_secs(1), Duration::from_secs(1))
                .with_state("phase=NotReady"),
        );
        let err: E2eError = timeout.into();
        assert_eq!(err.wait_error().unwrap().last_state, "phase=NotReady");

        let fatal: PollError<ResourceError> = PollError::Fatal(ResourceError::Ambiguous {
            kind: ObjectKind::Job,
            namespace: Some("ns".to_string()),
            selector: "a=1".to_string(),
            names: vec!["j1".to_string(), "j2".to_string()],
        });
        let err: E2eError = fatal.into();
        assert!(matches!(err, E2eError::Resource(ResourceError::Ambiguous { .. })));

        let cancelled: PollError<SequenceError> = PollError::Cancelled {
            resource: "x".to_string(),
            elapsed: Duration::from_secs(2),
        };
        assert!(E2eError::from(cancelled).is_cancelled());
    }

    #[test]
    fn test_ensure() {
        assert!(ensure(true, || "unused".to_string()).is_ok());
        let err = ensure(false, || "cluster ID should be generated".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "assertion failed: cluster ID should be generated");
    }
}
