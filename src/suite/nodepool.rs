//! Nodepool scenarios

use super::{step, CLUSTER_PAYLOAD, NODEPOOL_PAYLOAD};
use crate::condition::{describe_conditions, has_condition, READY};
use crate::error::{ensure, E2eError};
use crate::helper::{nodepool_id, Helper};
use crate::model::{ConditionStatus, ResourcePhase, ResourceRef};

/// Create a nodepool on a fresh cluster and follow it to Ready
pub async fn creation(h: Helper) -> Result<(), E2eError> {
    step("getting test cluster for nodepool creation");
    let cluster_id = h.get_test_cluster(CLUSTER_PAYLOAD).await?;

    let result = create_and_verify(&h, &cluster_id).await;

    // Deleting the cluster cascades to its nodepools
    step(&format!("cleaning up test cluster {cluster_id}"));
    h.cleanup_quietly(&cluster_id).await;
    result
}

async fn create_and_verify(h: &Helper, cluster_id: &str) -> Result<(), E2eError> {
    let config = h.config();

    step("waiting for cluster to become Ready");
    h.wait_for_condition(
        &ResourceRef::cluster(cluster_id),
        READY,
        ConditionStatus::True,
        config.timeouts.cluster.ready,
    )
    .await?;

    step("submitting nodepool creation request via POST /api/hyperfleet/v1/clusters/{id}/nodepools");
    let nodepool = h
        .create_nodepool_from_payload(cluster_id, NODEPOOL_PAYLOAD)
        .await?;
    let nodepool_id = nodepool_id(&nodepool)?;
    let target = ResourceRef::nodepool(cluster_id, &nodepool_id);

    let phase = nodepool.status.as_ref().and_then(|s| s.phase);
    ensure(phase == Some(ResourcePhase::NotReady), || {
        format!("nodepool should be in NotReady phase initially, got {phase:?}")
    })?;

    step("monitoring nodepool status - waiting for phase transition to Ready");
    h.wait_for_phase(&target, ResourcePhase::Ready, config.timeouts.nodepool.ready)
        .await?;

    step("verifying all nodepool adapter conditions");
    h.wait_for_required_adapters(
        &target,
        &config.adapters.nodepool,
        nodepool.generation,
        config.timeouts.adapter.processing,
    )
    .await?;

    step("verifying final nodepool state");
    let snapshot = h.api().resource_status(&target).await?;
    ensure(snapshot.phase() == Some(ResourcePhase::Ready), || {
        format!("nodepool phase should be Ready, got {:?}", snapshot.phase())
    })?;
    ensure(
        has_condition(snapshot.conditions(), READY, ConditionStatus::True),
        || {
            format!(
                "nodepool should be Ready=True, got [{}]",
                describe_conditions(snapshot.conditions())
            )
        },
    )?;
    Ok(())
}
