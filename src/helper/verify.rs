//! Adapter ordering and Kubernetes cross-checks

use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Namespace;
use tracing::info;

use super::Helper;
use crate::adapters::verify_parent_reflects_adapters;
use crate::error::E2eError;
use crate::model::{ResourceRef, StatusSnapshot};
use crate::resources::{
    delete_namespace_and_wait, verify_deployment_available, verify_job_complete,
    verify_namespace_active, wait_until_ready, Expectation,
};
use crate::sequence::{verify_dependency_sequence, SequenceReport, DEPENDENCY_POLL_INTERVAL};

impl Helper {
    /// Verify `dependent` only makes progress after `dependency` is Available
    pub async fn verify_adapter_sequence(
        &self,
        target: &ResourceRef,
        dependency: &str,
        dependent: &str,
        timeout: Duration,
    ) -> Result<SequenceReport, E2eError> {
        let api = self.api();
        let report = verify_dependency_sequence(
            format!("{target} {dependency} -> {dependent}"),
            || api.adapter_statuses(target),
            dependency,
            dependent,
            DEPENDENCY_POLL_INTERVAL,
            timeout,
            self.cancellation(),
        )
        .await?;
        info!(
            resource = %target,
            dependency = %dependency,
            dependent = %dependent,
            polls = report.polls,
            dependency_ready_at = report.dependency_ready_at,
            "Adapter ordering verified"
        );
        Ok(report)
    }

    /// Check the parent carries `<Adapter>Successful=True` for every adapter
    pub async fn verify_parent_reflects_adapters(
        &self,
        target: &ResourceRef,
        adapters: &[String],
    ) -> Result<StatusSnapshot, E2eError> {
        let snapshot = self.api().resource_status(target).await?;
        verify_parent_reflects_adapters(snapshot.conditions(), adapters)?;
        Ok(snapshot)
    }

    /// Wait for the one namespace matching `expect` to be Active
    pub async fn wait_for_namespace_active(
        &self,
        expect: &Expectation,
        timeout: Duration,
    ) -> Result<Namespace, E2eError> {
        let k8s = self.k8s();
        let ns = wait_until_ready(
            format!("namespace {}", expect.selector()),
            || verify_namespace_active(k8s, expect),
            self.config().polling.interval,
            timeout,
            self.cancellation(),
        )
        .await?;
        Ok(ns)
    }

    /// Wait for the one job matching `expect` in `namespace` to complete
    pub async fn wait_for_job_complete(
        &self,
        namespace: &str,
        expect: &Expectation,
        timeout: Duration,
    ) -> Result<Job, E2eError> {
        let k8s = self.k8s();
        let job = wait_until_ready(
            format!("job {} in {namespace}", expect.selector()),
            || verify_job_complete(k8s, namespace, expect),
            self.config().polling.interval,
            timeout,
            self.cancellation(),
        )
        .await?;
        Ok(job)
    }

    /// Wait for the one deployment matching `expect` in `namespace` to be available
    pub async fn wait_for_deployment_available(
        &self,
        namespace: &str,
        expect: &Expectation,
        timeout: Duration,
    ) -> Result<Deployment, E2eError> {
        let k8s = self.k8s();
        let deployment = wait_until_ready(
            format!("deployment {} in {namespace}", expect.selector()),
            || verify_deployment_available(k8s, namespace, expect),
            self.config().polling.interval,
            timeout,
            self.cancellation(),
        )
        .await?;
        Ok(deployment)
    }

    pub async fn delete_namespace(&self, name: &str) -> Result<(), E2eError> {
        delete_namespace_and_wait(self.k8s(), name, self.cancellation()).await?;
        Ok(())
    }
}
