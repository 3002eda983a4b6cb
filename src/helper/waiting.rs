//! Condition waits against the HyperFleet API

use std::time::Duration;

use tracing::{debug, info};

use super::Helper;
use crate::adapters::verify_required_adapters;
use crate::condition::{find_condition, has_condition};
use crate::error::E2eError;
use crate::model::{AdapterStatusList, ConditionStatus, ResourcePhase, ResourceRef, StatusSnapshot};
use crate::poll::poll_until;

impl Helper {
    async fn poll_status<P>(
        &self,
        what: String,
        target: &ResourceRef,
        timeout: Duration,
        is_satisfied: P,
    ) -> Result<StatusSnapshot, E2eError>
    where
        P: Fn(&StatusSnapshot) -> bool,
    {
        let api = self.api();
        debug!(resource = %what, timeout = ?timeout, "Waiting");
        let snapshot = poll_until(what, || api.resource_status(target), is_satisfied)
            .interval(self.config().polling.interval)
            .timeout(timeout)
            .cancel_on(self.cancellation().clone())
            .await_converged()
            .await?;
        Ok(snapshot)
    }

    async fn poll_adapters<P>(
        &self,
        what: String,
        target: &ResourceRef,
        timeout: Duration,
        is_satisfied: P,
    ) -> Result<AdapterStatusList, E2eError>
    where
        P: Fn(&AdapterStatusList) -> bool,
    {
        let api = self.api();
        debug!(resource = %what, timeout = ?timeout, "Waiting");
        let list = poll_until(what, || api.adapter_statuses(target), is_satisfied)
            .interval(self.config().polling.interval)
            .timeout(timeout)
            .cancel_on(self.cancellation().clone())
            .await_converged()
            .await?;
        Ok(list)
    }

    /// Wait until the resource's `type_` condition has `status`
    pub async fn wait_for_condition(
        &self,
        target: &ResourceRef,
        type_: &str,
        status: ConditionStatus,
        timeout: Duration,
    ) -> Result<StatusSnapshot, E2eError> {
        let snapshot = self
            .poll_status(
                format!("{target} {type_}={status}"),
                target,
                timeout,
                |s: &StatusSnapshot| has_condition(s.conditions(), type_, status),
            )
            .await?;
        info!(resource = %target, condition = %type_, status = %status, "Condition reached");
        Ok(snapshot)
    }

    /// Wait until the resource reports `phase`
    pub async fn wait_for_phase(
        &self,
        target: &ResourceRef,
        phase: ResourcePhase,
        timeout: Duration,
    ) -> Result<StatusSnapshot, E2eError> {
        self.poll_status(
            format!("{target} phase={phase}"),
            target,
            timeout,
            |s: &StatusSnapshot| s.phase() == Some(phase),
        )
        .await
    }

    /// Wait until one adapter's `type_` condition has `status`
    pub async fn wait_for_adapter_condition(
        &self,
        target: &ResourceRef,
        adapter: &str,
        type_: &str,
        status: ConditionStatus,
        timeout: Duration,
    ) -> Result<AdapterStatusList, E2eError> {
        self.poll_adapters(
            format!("{target} adapter {adapter} {type_}={status}"),
            target,
            timeout,
            |list: &AdapterStatusList| {
                list.items
                    .iter()
                    .find(|s| s.adapter == adapter)
                    .is_some_and(|s| has_condition(&s.conditions, type_, status))
            },
        )
        .await
    }

    /// Wait until every reporting adapter has `type_` at `status`
    ///
    /// An empty adapter list never satisfies the wait.
    pub async fn wait_for_all_adapter_conditions(
        &self,
        target: &ResourceRef,
        type_: &str,
        status: ConditionStatus,
        timeout: Duration,
    ) -> Result<AdapterStatusList, E2eError> {
        self.poll_adapters(
            format!("{target} all adapters {type_}={status}"),
            target,
            timeout,
            |list: &AdapterStatusList| {
                !list.items.is_empty()
                    && list
                        .items
                        .iter()
                        .all(|s| has_condition(&s.conditions, type_, status))
            },
        )
        .await
    }

    /// Wait until every adapter in `required` reports a complete status at `generation`
    ///
    /// Once converged the list is checked again so a failure names the
    /// offending adapters instead of only timing out.
    pub async fn wait_for_required_adapters(
        &self,
        target: &ResourceRef,
        required: &[String],
        generation: i64,
        timeout: Duration,
    ) -> Result<AdapterStatusList, E2eError> {
        let list = self
            .poll_adapters(
                format!("{target} required adapters at generation {generation}"),
                target,
                timeout,
                |list: &AdapterStatusList| {
                    verify_required_adapters(&list.items, required, generation).is_ok()
                },
            )
            .await?;
        verify_required_adapters(&list.items, required, generation)?;
        info!(resource = %target, adapters = ?required, generation, "Required adapters complete");
        Ok(list)
    }

    /// Current value of one condition, if reported
    pub async fn condition_status(
        &self,
        target: &ResourceRef,
        type_: &str,
    ) -> Result<Option<ConditionStatus>, E2eError> {
        let snapshot = self.api().resource_status(target).await?;
        Ok(find_condition(snapshot.conditions(), type_).map(|c| c.status))
    }
}
