//! Kubernetes resource-state verification
//!
//! Confirms that the objects an adapter is supposed to create actually
//! exist in the cluster, are ready, and carry the expected annotations.
//! Objects are located by exact label selector and exactly one match is
//! required.
//!
//! # Example
//!
//! ```ignore
//! let expect = Expectation::new()
//!     .label("hyperfleet.io/cluster-id", &cluster_id)
//!     .annotation("hyperfleet.io/generation", "1");
//!
//! let ns = verify_namespace_active(&lister, &expect).await?;
//! ```

mod lister;
mod selector;

pub use lister::{KubeLister, ObjectLister};
pub use selector::{build_label_selector, validate_label_selector, validate_namespace_name};

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Namespace;
use kube::ResourceExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::poll::{poll_until, PollError, Retryable};
use crate::wait::ResourceState;

const DELETE_INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const DELETE_MAX_BACKOFF: Duration = Duration::from_secs(10);
const DELETE_BACKOFF_FACTOR: f64 = 1.5;
const DELETE_MAX_CHECKS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Namespace,
    Job,
    Deployment,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Namespace => f.write_str("namespace"),
            ObjectKind::Job => f.write_str("job"),
            ObjectKind::Deployment => f.write_str("deployment"),
        }
    }
}

/// An annotation whose value differs from what was expected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationMismatch {
    pub key: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("no {kind} matches selector '{selector}'{}", scope(.namespace))]
    NotFound {
        kind: ObjectKind,
        namespace: Option<String>,
        selector: String,
    },

    #[error(
        "expected exactly one {kind} matching '{selector}'{}, found {}: {}",
        scope(.namespace), .names.len(), .names.join(", ")
    )]
    Ambiguous {
        kind: ObjectKind,
        namespace: Option<String>,
        selector: String,
        names: Vec<String>,
    },

    #[error("{kind}/{name} is not ready: {detail}")]
    NotReady {
        kind: ObjectKind,
        name: String,
        detail: String,
    },

    #[error("{kind}/{name} annotations do not match: {}", describe_mismatch(.missing, .mismatched))]
    MetadataMismatch {
        kind: ObjectKind,
        name: String,
        missing: Vec<String>,
        mismatched: Vec<AnnotationMismatch>,
    },

    #[error("invalid namespace name '{value}': {reason}")]
    InvalidName { value: String, reason: String },

    #[error("invalid label selector '{value}': {reason}")]
    InvalidSelector { value: String, reason: String },

    #[error("failed to query {kind}s: {source}")]
    Kube {
        kind: ObjectKind,
        #[source]
        source: kube::Error,
    },

    #[error("namespace {name} still exists after {checks} checks")]
    NotDeleted { name: String, checks: u32 },

    #[error("cancelled while deleting namespace {0}")]
    DeleteCancelled(String),
}

impl Retryable for ResourceError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResourceError::NotFound { .. }
                | ResourceError::NotReady { .. }
                | ResourceError::Kube { .. }
        )
    }
}

fn scope(namespace: &Option<String>) -> String {
    namespace
        .as_deref()
        .map(|ns| format!(" in namespace {ns}"))
        .unwrap_or_default()
}

fn describe_mismatch(missing: &[String], mismatched: &[AnnotationMismatch]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing annotations: {}", missing.join(", ")));
    }
    if !mismatched.is_empty() {
        let details: Vec<String> = mismatched
            .iter()
            .map(|m| format!("{} (expected: {}, actual: {})", m.key, m.expected, m.actual))
            .collect();
        parts.push(format!("mismatched annotations: {}", details.join(", ")));
    }
    parts.join("; ")
}

/// Labels that locate an object and annotations it must carry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expectation {
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

impl Expectation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Require an annotation with an exact value
    pub fn annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn selector(&self) -> String {
        build_label_selector(&self.labels)
    }
}

fn single<K: kube::Resource>(
    mut items: Vec<K>,
    kind: ObjectKind,
    namespace: Option<&str>,
    selector: &str,
) -> Result<K, ResourceError> {
    if items.len() > 1 {
        let mut names: Vec<String> = items.iter().map(ResourceExt::name_any).collect();
        names.sort();
        return Err(ResourceError::Ambiguous {
            kind,
            namespace: namespace.map(str::to_string),
            selector: selector.to_string(),
            names,
        });
    }
    items.pop().ok_or_else(|| ResourceError::NotFound {
        kind,
        namespace: namespace.map(str::to_string),
        selector: selector.to_string(),
    })
}

/// Every expected annotation must be present with exactly the expected value
pub fn verify_annotations(
    kind: ObjectKind,
    name: &str,
    actual: Option<&BTreeMap<String, String>>,
    expected: &BTreeMap<String, String>,
) -> Result<(), ResourceError> {
    let mut missing = Vec::new();
    let mut mismatched = Vec::new();

    for (key, want) in expected {
        match actual.and_then(|a| a.get(key)) {
            None => missing.push(key.clone()),
            Some(got) if got != want => mismatched.push(AnnotationMismatch {
                key: key.clone(),
                expected: want.clone(),
                actual: got.clone(),
            }),
            Some(_) => {}
        }
    }

    if missing.is_empty() && mismatched.is_empty() {
        Ok(())
    } else {
        Err(ResourceError::MetadataMismatch {
            kind,
            name: name.to_string(),
            missing,
            mismatched,
        })
    }
}

/// Select the single matching namespace and require phase Active
pub fn check_namespace(
    items: Vec<Namespace>,
    expect: &Expectation,
) -> Result<Namespace, ResourceError> {
    let ns = single(items, ObjectKind::Namespace, None, &expect.selector())?;
    let name = ns.name_any();

    let phase = ns.status.as_ref().and_then(|s| s.phase.as_deref());
    if phase != Some("Active") {
        return Err(ResourceError::NotReady {
            kind: ObjectKind::Namespace,
            name,
            detail: ns.state_description(),
        });
    }

    verify_annotations(
        ObjectKind::Namespace,
        &name,
        ns.metadata.annotations.as_ref(),
        &expect.annotations,
    )?;
    Ok(ns)
}

/// Select the single matching job and require Complete=True
pub fn check_job(
    items: Vec<Job>,
    namespace: &str,
    expect: &Expectation,
) -> Result<Job, ResourceError> {
    let job = single(items, ObjectKind::Job, Some(namespace), &expect.selector())?;
    let name = job.name_any();

    let complete = job
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|cs| cs.iter().any(|c| c.type_ == "Complete" && c.status == "True"));
    if !complete {
        return Err(ResourceError::NotReady {
            kind: ObjectKind::Job,
            name,
            detail: job.state_description(),
        });
    }

    verify_annotations(
        ObjectKind::Job,
        &name,
        job.metadata.annotations.as_ref(),
        &expect.annotations,
    )?;
    Ok(job)
}

/// Select the single matching deployment and require Available=True
pub fn check_deployment(
    items: Vec<Deployment>,
    namespace: &str,
    expect: &Expectation,
) -> Result<Deployment, ResourceError> {
    let deployment = single(items, ObjectKind::Deployment, Some(namespace), &expect.selector())?;
    let name = deployment.name_any();

    let available = deployment
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|cs| cs.iter().any(|c| c.type_ == "Available" && c.status == "True"));
    if !available {
        return Err(ResourceError::NotReady {
            kind: ObjectKind::Deployment,
            name,
            detail: deployment.state_description(),
        });
    }

    verify_annotations(
        ObjectKind::Deployment,
        &name,
        deployment.metadata.annotations.as_ref(),
        &expect.annotations,
    )?;
    Ok(deployment)
}

fn kube_error(kind: ObjectKind) -> impl FnOnce(kube::Error) -> ResourceError {
    move |source| ResourceError::Kube { kind, source }
}

/// Find the namespace matching `expect` and verify it is Active and annotated
pub async fn verify_namespace_active<L>(
    lister: &L,
    expect: &Expectation,
) -> Result<Namespace, ResourceError>
where
    L: ObjectLister + ?Sized,
{
    let selector = expect.selector();
    validate_label_selector(&selector)?;
    let items = lister
        .list_namespaces(&selector)
        .await
        .map_err(kube_error(ObjectKind::Namespace))?;
    check_namespace(items, expect)
}

/// Find the job matching `expect` in `namespace` and verify it completed
pub async fn verify_job_complete<L>(
    lister: &L,
    namespace: &str,
    expect: &Expectation,
) -> Result<Job, ResourceError>
where
    L: ObjectLister + ?Sized,
{
    validate_namespace_name(namespace)?;
    let selector = expect.selector();
    validate_label_selector(&selector)?;
    let items = lister
        .list_jobs(namespace, &selector)
        .await
        .map_err(kube_error(ObjectKind::Job))?;
    check_job(items, namespace, expect)
}

/// Find the deployment matching `expect` in `namespace` and verify it is available
pub async fn verify_deployment_available<L>(
    lister: &L,
    namespace: &str,
    expect: &Expectation,
) -> Result<Deployment, ResourceError>
where
    L: ObjectLister + ?Sized,
{
    validate_namespace_name(namespace)?;
    let selector = expect.selector();
    validate_label_selector(&selector)?;
    let items = lister
        .list_deployments(namespace, &selector)
        .await
        .map_err(kube_error(ObjectKind::Deployment))?;
    check_deployment(items, namespace, expect)
}

/// Result of one verification attempt inside a wait
#[derive(Debug)]
pub enum Probe<K> {
    Ready(K),
    /// Not found or not ready yet; worth polling again
    Pending(ResourceError),
}

impl<K> Probe<K> {
    fn classify(result: Result<K, ResourceError>) -> Result<Self, ResourceError> {
        match result {
            Ok(obj) => Ok(Probe::Ready(obj)),
            Err(e @ (ResourceError::NotFound { .. } | ResourceError::NotReady { .. })) => {
                Ok(Probe::Pending(e))
            }
            Err(e) => Err(e),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Probe::Ready(_))
    }
}

impl<K: ResourceState> ResourceState for Probe<K> {
    fn state_description(&self) -> String {
        match self {
            Probe::Ready(obj) => obj.state_description(),
            Probe::Pending(e) => e.to_string(),
        }
    }
}

/// Repeat `verify` until it yields a ready object
///
/// NotFound and NotReady are retried until `timeout`; Ambiguous,
/// MetadataMismatch and invalid input abort the wait.
pub async fn wait_until_ready<K, F, Fut>(
    resource: impl Into<String>,
    mut verify: F,
    interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<K, PollError<ResourceError>>
where
    K: ResourceState,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<K, ResourceError>>,
{
    let probe = poll_until(
        resource,
        || {
            let attempt = verify();
            async move { Probe::classify(attempt.await) }
        },
        Probe::is_ready,
    )
    .interval(interval)
    .timeout(timeout)
    .cancel_on(cancel.clone())
    .await_converged()
    .await?;

    match probe {
        Probe::Ready(obj) => Ok(obj),
        Probe::Pending(e) => Err(PollError::Fatal(e)),
    }
}

/// Delete a namespace and wait until the API no longer returns it
///
/// Existence is re-checked with backoff starting at 500ms, growing by 1.5x
/// up to 10s, for at most 20 checks. A namespace that is already gone
/// counts as success.
pub async fn delete_namespace_and_wait<L>(
    lister: &L,
    name: &str,
    cancel: &CancellationToken,
) -> Result<(), ResourceError>
where
    L: ObjectLister + ?Sized,
{
    validate_namespace_name(name)?;

    let existed = lister
        .delete_namespace(name)
        .await
        .map_err(kube_error(ObjectKind::Namespace))?;
    if !existed {
        debug!(namespace = %name, "Namespace already deleted");
        return Ok(());
    }

    let mut backoff = DELETE_INITIAL_BACKOFF;
    for check in 1..=DELETE_MAX_CHECKS {
        let exists = lister
            .namespace_exists(name)
            .await
            .map_err(kube_error(ObjectKind::Namespace))?;
        if !exists {
            info!(namespace = %name, checks = check, "Namespace deleted");
            return Ok(());
        }

        debug!(
            namespace = %name,
            check = check,
            backoff = ?backoff,
            "Namespace still terminating, waiting..."
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ResourceError::DeleteCancelled(name.to_string())),
            () = tokio::time::sleep(backoff) => {}
        }
        backoff = backoff.mul_f64(DELETE_BACKOFF_FACTOR).min(DELETE_MAX_BACKOFF);
    }

    Err(ResourceError::NotDeleted {
        name: name.to_string(),
        checks: DELETE_MAX_CHECKS,
    })
}
