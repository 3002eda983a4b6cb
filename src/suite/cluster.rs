//! Cluster scenarios

use k8s_openapi::api::core::v1::Namespace;
use kube::ResourceExt;
use tracing::info;

use super::{step, CLUSTER_PAYLOAD};
use crate::condition::{describe_conditions, find_condition, has_condition, AVAILABLE, READY};
use crate::error::{ensure, E2eError};
use crate::helper::{cluster_id, Helper};
use crate::model::{Cluster, ConditionStatus, ResourceRef};
use crate::resources::Expectation;

/// Label adapters put on every Kubernetes object they create for a cluster
pub const CLUSTER_ID_LABEL: &str = "hyperfleet.io/cluster-id";

/// Annotation carrying the resource generation an object was applied for
pub const GENERATION_ANNOTATION: &str = "hyperfleet.io/generation";

/// Adapter whose job must finish before the deployment adapter proceeds
pub const ORDERING_DEPENDENCY: &str = "clusters-job";
pub const ORDERING_DEPENDENT: &str = "clusters-deployment";

/// Create a cluster and follow it to Ready with every adapter healthy
pub async fn creation(h: Helper) -> Result<(), E2eError> {
    step("submitting cluster creation request via POST /api/hyperfleet/v1/clusters");
    let cluster = h.create_cluster_from_payload(CLUSTER_PAYLOAD).await?;
    let id = cluster_id(&cluster)?;

    let result = verify_creation(&h, &cluster, &id).await;

    step(&format!("cleaning up cluster {id}"));
    h.cleanup_quietly(&id).await;
    result
}

async fn verify_creation(h: &Helper, cluster: &Cluster, id: &str) -> Result<(), E2eError> {
    let config = h.config();
    let target = ResourceRef::cluster(id);

    step("verifying the initial cluster status");
    let conditions = cluster
        .status
        .as_ref()
        .map(|s| s.conditions.as_slice())
        .unwrap_or_default();
    ensure(
        has_condition(conditions, READY, ConditionStatus::False)
            && has_condition(conditions, AVAILABLE, ConditionStatus::False),
        || {
            format!(
                "new cluster should start with Ready=False and Available=False, got [{}]",
                describe_conditions(conditions)
            )
        },
    )?;

    step("waiting for the cluster to become Ready");
    h.wait_for_condition(
        &target,
        READY,
        ConditionStatus::True,
        config.timeouts.cluster.ready,
    )
    .await?;

    step("verifying all adapter conditions via /clusters/{id}/statuses");
    h.wait_for_required_adapters(
        &target,
        &config.adapters.cluster,
        cluster.generation,
        config.timeouts.adapter.processing,
    )
    .await?;

    step("verifying final cluster state");
    let snapshot = h
        .verify_parent_reflects_adapters(&target, &config.adapters.cluster)
        .await?;
    ensure(
        has_condition(snapshot.conditions(), READY, ConditionStatus::True)
            && has_condition(snapshot.conditions(), AVAILABLE, ConditionStatus::True),
        || {
            format!(
                "cluster should end with Ready=True and Available=True, got [{}]",
                describe_conditions(snapshot.conditions())
            )
        },
    )?;
    for type_ in [READY, AVAILABLE] {
        let observed = find_condition(snapshot.conditions(), type_).map(|c| c.observed_generation);
        ensure(observed == Some(cluster.generation), || {
            format!(
                "cluster {type_} condition observedGeneration is {observed:?}, expected {}",
                cluster.generation
            )
        })?;
    }
    ensure(
        snapshot.status.observed_generation == Some(cluster.generation),
        || {
            format!(
                "cluster observedGeneration is {:?}, expected {}",
                snapshot.status.observed_generation, cluster.generation
            )
        },
    )?;

    verify_kubernetes_resources(h, id, cluster.generation).await
}

/// Cross-check the namespace, job and deployment the adapters created
async fn verify_kubernetes_resources(
    h: &Helper,
    id: &str,
    generation: i64,
) -> Result<(), E2eError> {
    let timeout = h.config().timeouts.adapter.processing;
    let expect = Expectation::new()
        .label(CLUSTER_ID_LABEL, id)
        .annotation(GENERATION_ANNOTATION, generation.to_string());

    step("verifying the cluster namespace is Active");
    let ns: Namespace = h.wait_for_namespace_active(&expect, timeout).await?;
    let namespace = ns.name_any();

    step("verifying the cluster job completed");
    h.wait_for_job_complete(&namespace, &expect, timeout).await?;

    step("verifying the cluster deployment is available");
    h.wait_for_deployment_available(&namespace, &expect, timeout)
        .await?;

    info!(cluster_id = %id, namespace = %namespace, "Kubernetes resources verified");
    Ok(())
}

/// Create a cluster and check the deployment adapter waits for the job adapter
pub async fn adapter_ordering(h: Helper) -> Result<(), E2eError> {
    step("submitting cluster creation request via POST /api/hyperfleet/v1/clusters");
    let id = h.get_test_cluster(CLUSTER_PAYLOAD).await?;
    let target = ResourceRef::cluster(&id);

    step(&format!(
        "verifying {ORDERING_DEPENDENT} only progresses after {ORDERING_DEPENDENCY} is Available"
    ));
    let result = h
        .verify_adapter_sequence(
            &target,
            ORDERING_DEPENDENCY,
            ORDERING_DEPENDENT,
            h.config().timeouts.adapter.processing,
        )
        .await
        .map(|_| ());

    step(&format!("cleaning up cluster {id}"));
    h.cleanup_quietly(&id).await;
    result
}
