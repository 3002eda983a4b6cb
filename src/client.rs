//! HyperFleet REST API client
//!
//! `FleetApi` is the seam the waiters and scenarios poll through.
//! `HyperFleetClient` implements it over HTTP; tests substitute in-memory
//! fakes.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::model::{
    AdapterStatusList, Cluster, ClusterCreateRequest, NodePool, NodePoolCreateRequest, ResourceRef,
    StatusSnapshot,
};
use crate::payload::{load_payload, PayloadError};
use crate::poll::Retryable;

/// Path prefix for every HyperFleet endpoint
pub const API_PREFIX: &str = "/api/hyperfleet/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "hyperfleet-e2e-tests";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to {action}: {source}")]
    Request {
        action: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status code {status} when trying to {action}: {body}")]
    UnexpectedStatus {
        action: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode response for {action}: {source}")]
    Decode {
        action: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{resource} has no id in the API response")]
    MissingId { resource: String },

    #[error(transparent)]
    Payload(#[from] PayloadError),
}

impl Retryable for ApiError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Request { .. } | ApiError::UnexpectedStatus { .. } | ApiError::Decode { .. }
        )
    }
}

/// Operations the harness needs from the HyperFleet API
#[async_trait]
pub trait FleetApi: Send + Sync {
    async fn create_cluster(&self, request: &ClusterCreateRequest) -> Result<Cluster, ApiError>;

    async fn get_cluster(&self, cluster_id: &str) -> Result<Cluster, ApiError>;

    async fn list_clusters(&self) -> Result<Vec<Cluster>, ApiError>;

    async fn get_cluster_statuses(&self, cluster_id: &str) -> Result<AdapterStatusList, ApiError>;

    /// Deletion is not exposed by the API yet; implementations may no-op
    async fn delete_cluster(&self, cluster_id: &str) -> Result<(), ApiError>;

    async fn create_nodepool(
        &self,
        cluster_id: &str,
        request: &NodePoolCreateRequest,
    ) -> Result<NodePool, ApiError>;

    async fn get_nodepool(&self, cluster_id: &str, nodepool_id: &str)
        -> Result<NodePool, ApiError>;

    async fn list_nodepools(&self, cluster_id: &str) -> Result<Vec<NodePool>, ApiError>;

    async fn get_nodepool_statuses(
        &self,
        cluster_id: &str,
        nodepool_id: &str,
    ) -> Result<AdapterStatusList, ApiError>;

    async fn delete_nodepool(&self, cluster_id: &str, nodepool_id: &str) -> Result<(), ApiError>;

    /// Render a payload template and create the cluster it describes
    async fn create_cluster_from_payload(&self, path: &Path) -> Result<Cluster, ApiError> {
        let request: ClusterCreateRequest = load_payload(path)?;
        self.create_cluster(&request).await
    }

    async fn create_nodepool_from_payload(
        &self,
        cluster_id: &str,
        path: &Path,
    ) -> Result<NodePool, ApiError> {
        let request: NodePoolCreateRequest = load_payload(path)?;
        self.create_nodepool(cluster_id, &request).await
    }

    /// Generation and aggregated status of a cluster or nodepool
    async fn resource_status(&self, target: &ResourceRef) -> Result<StatusSnapshot, ApiError> {
        match target {
            ResourceRef::Cluster(id) => {
                let cluster = self.get_cluster(id).await?;
                Ok(StatusSnapshot {
                    target: target.clone(),
                    generation: cluster.generation,
                    status: cluster.status.unwrap_or_default(),
                })
            }
            ResourceRef::NodePool {
                cluster_id,
                nodepool_id,
            } => {
                let nodepool = self.get_nodepool(cluster_id, nodepool_id).await?;
                Ok(StatusSnapshot {
                    target: target.clone(),
                    generation: nodepool.generation,
                    status: nodepool.status.unwrap_or_default(),
                })
            }
        }
    }

    /// Adapter status reports for a cluster or nodepool
    async fn adapter_statuses(&self, target: &ResourceRef) -> Result<AdapterStatusList, ApiError> {
        match target {
            ResourceRef::Cluster(id) => self.get_cluster_statuses(id).await,
            ResourceRef::NodePool {
                cluster_id,
                nodepool_id,
            } => self.get_nodepool_statuses(cluster_id, nodepool_id).await,
        }
    }
}

/// HTTP client for the HyperFleet API
#[derive(Debug, Clone)]
pub struct HyperFleetClient {
    http: reqwest::Client,
    base_url: String,
}

impl HyperFleetClient {
    /// Create a client for the API rooted at `base_url`
    ///
    /// `base_url` is the server root; the `/api/hyperfleet/v1` prefix is
    /// appended to every request.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let trimmed = base_url.trim_end_matches('/');
        Url::parse(trimmed).map_err(|e| ApiError::InvalidUrl {
            url: crate::config::redact_url(base_url),
            reason: e.to_string(),
        })?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::Request {
                action: "build HTTP client".to_string(),
                source: e,
            })?;

        Ok(Self {
            http,
            base_url: trimmed.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        expected: StatusCode,
        action: &str,
    ) -> Result<T, ApiError> {
        let response = request.send().await.map_err(|e| ApiError::Request {
            action: action.to_string(),
            source: e,
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ApiError::Request {
            action: action.to_string(),
            source: e,
        })?;

        if status != expected {
            return Err(ApiError::UnexpectedStatus {
                action: action.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            action: action.to_string(),
            source: e,
        })
    }
}

#[async_trait]
impl FleetApi for HyperFleetClient {
    async fn create_cluster(&self, request: &ClusterCreateRequest) -> Result<Cluster, ApiError> {
        let req = self.http.post(self.url("/clusters")).json(request);
        self.send(req, StatusCode::CREATED, "create cluster").await
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<Cluster, ApiError> {
        let req = self.http.get(self.url(&format!("/clusters/{cluster_id}")));
        self.send(req, StatusCode::OK, "get cluster").await
    }

    async fn list_clusters(&self) -> Result<Vec<Cluster>, ApiError> {
        let req = self.http.get(self.url("/clusters"));
        let list: crate::model::ResourceList<Cluster> =
            self.send(req, StatusCode::OK, "list clusters").await?;
        Ok(list.items)
    }

    async fn get_cluster_statuses(&self, cluster_id: &str) -> Result<AdapterStatusList, ApiError> {
        let req = self
            .http
            .get(self.url(&format!("/clusters/{cluster_id}/statuses")));
        self.send(req, StatusCode::OK, "get cluster statuses").await
    }

    async fn delete_cluster(&self, cluster_id: &str) -> Result<(), ApiError> {
        debug!(cluster_id = %cluster_id, "Cluster deletion not supported by the API, skipping");
        Ok(())
    }

    async fn create_nodepool(
        &self,
        cluster_id: &str,
        request: &NodePoolCreateRequest,
    ) -> Result<NodePool, ApiError> {
        let req = self
            .http
            .post(self.url(&format!("/clusters/{cluster_id}/nodepools")))
            .json(request);
        self.send(req, StatusCode::CREATED, "create nodepool").await
    }

    async fn get_nodepool(
        &self,
        cluster_id: &str,
        nodepool_id: &str,
    ) -> Result<NodePool, ApiError> {
        let req = self.http.get(self.url(&format!(
            "/clusters/{cluster_id}/nodepools/{nodepool_id}"
        )));
        self.send(req, StatusCode::OK, "get nodepool").await
    }

    async fn list_nodepools(&self, cluster_id: &str) -> Result<Vec<NodePool>, ApiError> {
        let req = self
            .http
            .get(self.url(&format!("/clusters/{cluster_id}/nodepools")));
        let list: crate::model::ResourceList<NodePool> =
            self.send(req, StatusCode::OK, "list nodepools").await?;
        Ok(list.items)
    }

    async fn get_nodepool_statuses(
        &self,
        cluster_id: &str,
        nodepool_id: &str,
    ) -> Result<AdapterStatusList, ApiError> {
        let req = self.http.get(self.url(&format!(
            "/clusters/{cluster_id}/nodepools/{nodepool_id}/statuses"
        )));
        self.send(req, StatusCode::OK, "get nodepool statuses").await
    }

    async fn delete_nodepool(&self, cluster_id: &str, nodepool_id: &str) -> Result<(), ApiError> {
        debug!(
            cluster_id = %cluster_id,
            nodepool_id = %nodepool_id,
            "Nodepool deletion not supported by the API, skipping"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_prefixed_urls() {
        let client = HyperFleetClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(
            client.url("/clusters/abc"),
            "http://localhost:8000/api/hyperfleet/v1/clusters/abc"
        );
    }

    #[test]
    fn test_invalid_url_is_rejected_and_redacted() {
        let err = HyperFleetClient::new("not a url").unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl { .. }));
    }

    #[test]
    fn test_retry_classification() {
        let status = ApiError::UnexpectedStatus {
            action: "get cluster".to_string(),
            status: 503,
            body: "unavailable".to_string(),
        };
        assert!(status.is_retryable());
        assert!(status.to_string().contains("503"));
        assert!(status.to_string().contains("unavailable"));

        let missing = ApiError::MissingId {
            resource: "cluster".to_string(),
        };
        assert!(!missing.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_payload_is_not_retryable() {
        let client = HyperFleetClient::new("http://localhost:8000").unwrap();
        let err = client
            .create_cluster_from_payload(Path::new("does/not/exist.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Payload(PayloadError::Read { .. })));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_delete_is_a_no_op() {
        let client = HyperFleetClient::new("http://localhost:8000").unwrap();
        client.delete_cluster("abc").await.unwrap();
        client.delete_nodepool("abc", "np").await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires a running HyperFleet API
    async fn test_list_clusters_live() {
        let url = std::env::var("HYPERFLEET_API_URL").unwrap();
        let client = HyperFleetClient::new(&url).unwrap();
        client.list_clusters().await.unwrap();
    }
}
