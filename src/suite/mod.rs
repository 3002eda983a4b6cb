//! Registered end-to-end scenarios
//!
//! Each scenario is plain data: a name, its labels and an async entry point
//! taking a `Helper`. The runner selects from `registry()` by label filter
//! and name.

pub mod cluster;
pub mod nodepool;

use std::future::Future;
use std::pin::Pin;

use tracing::info;

use crate::error::E2eError;
use crate::helper::Helper;
use crate::labels::{HAPPY_PATH, INFORMING, LIFECYCLE, STABLE, TIER0, TIER1};

/// Payload template for test clusters, relative to the working directory
pub const CLUSTER_PAYLOAD: &str = "testdata/payloads/clusters/gcp.json";

/// Payload template for test nodepools, relative to the working directory
pub const NODEPOOL_PAYLOAD: &str = "testdata/payloads/nodepools/gcp.json";

pub type ScenarioFuture = Pin<Box<dyn Future<Output = Result<(), E2eError>> + Send>>;

/// A runnable scenario and its labels
#[derive(Clone, Copy)]
pub struct ScenarioSpec {
    pub name: &'static str,
    pub labels: &'static [&'static str],
    pub run: fn(Helper) -> ScenarioFuture,
}

impl std::fmt::Debug for ScenarioSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioSpec")
            .field("name", &self.name)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

/// Every scenario the binary knows about, in run order
pub fn registry() -> Vec<ScenarioSpec> {
    vec![
        ScenarioSpec {
            name: "[Suite: cluster] Full Cluster Creation Flow on GCP",
            labels: &[TIER0, STABLE, HAPPY_PATH, LIFECYCLE],
            run: |h| Box::pin(cluster::creation(h)),
        },
        ScenarioSpec {
            name: "[Suite: cluster] Adapter dependency ordering",
            labels: &[TIER1, INFORMING, HAPPY_PATH],
            run: |h| Box::pin(cluster::adapter_ordering(h)),
        },
        ScenarioSpec {
            name: "[Suite: nodepool] Full NodePool Creation Flow",
            labels: &[TIER0, STABLE, HAPPY_PATH, LIFECYCLE],
            run: |h| Box::pin(nodepool::creation(h)),
        },
    ]
}

/// Log a scenario step
pub(crate) fn step(description: &str) {
    info!(step = %description, "STEP");
}
