//! Scenario helper
//!
//! Bundles the API client, the Kubernetes lister, the suite configuration
//! and a cancellation token, so scenarios only deal with resource IDs.
//!
//! # Example
//!
//! ```ignore
//! let h = Helper::connect(config).await?;
//! let cluster_id = h.get_test_cluster("testdata/payloads/clusters/gcp.json").await?;
//!
//! h.wait_for_condition(&ResourceRef::cluster(&cluster_id), READY, ConditionStatus::True,
//!     h.config().timeouts.cluster.ready).await?;
//!
//! h.cleanup_test_cluster(&cluster_id).await?;
//! ```

mod verify;
mod waiting;

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::{ApiError, FleetApi, HyperFleetClient};
use crate::config::{suite_config, Config, ConfigError};
use crate::error::E2eError;
use crate::model::{Cluster, NodePool};
use crate::resources::{KubeLister, ObjectLister};

/// Shared handle for scenarios
///
/// Cheap to clone; clones share the API client and lister.
#[derive(Clone)]
pub struct Helper {
    config: Arc<Config>,
    api: Arc<dyn FleetApi>,
    k8s: Arc<dyn ObjectLister>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Helper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Helper")
            .field("api_url", &crate::config::redact_url(&self.config.api.url))
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Helper {
    pub fn new(config: Arc<Config>, api: Arc<dyn FleetApi>, k8s: Arc<dyn ObjectLister>) -> Self {
        Self {
            config,
            api,
            k8s,
            cancel: CancellationToken::new(),
        }
    }

    /// Build a helper talking to the configured API and the ambient cluster
    pub async fn connect(config: Arc<Config>) -> Result<Self, E2eError> {
        let api = HyperFleetClient::new(&config.api.url)?;
        let k8s = KubeLister::connect().await?;
        Ok(Self::new(config, Arc::new(api), Arc::new(k8s)))
    }

    /// Connect with the configuration published by `set_suite_config`
    pub async fn connect_suite() -> Result<Self, E2eError> {
        let config = suite_config().ok_or(ConfigError::SuiteUnset)?;
        Self::connect(config).await
    }

    /// Use `token` to abort every wait started through this helper
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn api(&self) -> &dyn FleetApi {
        self.api.as_ref()
    }

    pub fn k8s(&self) -> &dyn ObjectLister {
        self.k8s.as_ref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Create a cluster from a payload template
    pub async fn create_cluster_from_payload(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Cluster, E2eError> {
        let cluster = self.api.create_cluster_from_payload(path.as_ref()).await?;
        info!(
            cluster_id = cluster.id.as_deref().unwrap_or("<none>"),
            name = %cluster.name,
            "Created cluster"
        );
        Ok(cluster)
    }

    /// Create a cluster for a test and return its ID
    pub async fn get_test_cluster(&self, path: impl AsRef<Path>) -> Result<String, E2eError> {
        let cluster = self.create_cluster_from_payload(path).await?;
        cluster_id(&cluster)
    }

    /// Best-effort cluster deletion
    pub async fn cleanup_test_cluster(&self, cluster_id: &str) -> Result<(), E2eError> {
        self.api.delete_cluster(cluster_id).await?;
        Ok(())
    }

    /// Create a nodepool under `cluster_id` from a payload template
    pub async fn create_nodepool_from_payload(
        &self,
        cluster_id: &str,
        path: impl AsRef<Path>,
    ) -> Result<NodePool, E2eError> {
        let nodepool = self
            .api
            .create_nodepool_from_payload(cluster_id, path.as_ref())
            .await?;
        info!(
            cluster_id = %cluster_id,
            nodepool_id = nodepool.id.as_deref().unwrap_or("<none>"),
            name = %nodepool.name,
            "Created nodepool"
        );
        Ok(nodepool)
    }

    pub async fn cleanup_test_nodepool(
        &self,
        cluster_id: &str,
        nodepool_id: &str,
    ) -> Result<(), E2eError> {
        self.api.delete_nodepool(cluster_id, nodepool_id).await?;
        Ok(())
    }

    /// Run cleanup, logging instead of failing
    ///
    /// Used at the end of scenarios so a cleanup error never hides the
    /// scenario's own result.
    pub async fn cleanup_quietly(&self, cluster_id: &str) {
        if let Err(e) = self.cleanup_test_cluster(cluster_id).await {
            warn!(cluster_id = %cluster_id, error = %e, "Cluster cleanup failed");
        }
    }
}

/// Server-assigned ID of a created cluster
pub fn cluster_id(cluster: &Cluster) -> Result<String, E2eError> {
    cluster.id.clone().ok_or_else(|| {
        ApiError::MissingId {
            resource: format!("cluster '{}'", cluster.name),
        }
        .into()
    })
}

/// Server-assigned ID of a created nodepool
pub fn nodepool_id(nodepool: &NodePool) -> Result<String, E2eError> {
    nodepool.id.clone().ok_or_else(|| {
        ApiError::MissingId {
            resource: format!("nodepool '{}'", nodepool.name),
        }
        .into()
    })
}
