//! HyperFleet API resource model
//!
//! Wire types returned by the HyperFleet REST API: clusters, nodepools,
//! their aggregated status, and the per-adapter status reports.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::condition::describe_conditions;
use crate::wait::ResourceState;

/// Tri-state status of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Coarse lifecycle phase reported on clusters and nodepools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourcePhase {
    NotReady,
    Ready,
}

impl fmt::Display for ResourcePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourcePhase::NotReady => f.write_str("NotReady"),
            ResourcePhase::Ready => f.write_str("Ready"),
        }
    }
}

/// A typed observation about a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub observed_generation: i64,
}

impl Condition {
    /// Create a condition with only type and status set
    pub fn new(type_: impl Into<String>, status: ConditionStatus) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: None,
            message: None,
            last_transition_time: None,
            observed_generation: 0,
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn transitioned_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_transition_time = Some(at);
        self
    }

    pub fn observed_generation(mut self, generation: i64) -> Self {
        self.observed_generation = generation;
        self
    }
}

/// Aggregated status of a cluster or nodepool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<ResourcePhase>,
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated_time: Option<DateTime<Utc>>,
}

impl ResourceState for ResourceStatus {
    fn state_description(&self) -> String {
        let phase = self
            .phase
            .map_or_else(|| "unset".to_string(), |p| p.to_string());
        format!(
            "phase={}, conditions=[{}]",
            phase,
            describe_conditions(&self.conditions)
        )
    }
}

/// One adapter's status report for a given parent resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterStatus {
    pub adapter: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_report_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl AdapterStatus {
    /// Create an empty report for `adapter`
    pub fn new(adapter: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            conditions: Vec::new(),
            created_time: None,
            last_report_time: None,
            observed_generation: 0,
            metadata: None,
        }
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn reported_at(mut self, created: DateTime<Utc>, last_report: DateTime<Utc>) -> Self {
        self.created_time = Some(created);
        self.last_report_time = Some(last_report);
        self
    }

    pub fn observed_generation(mut self, generation: i64) -> Self {
        self.observed_generation = generation;
        self
    }
}

/// Paged list envelope used by every list endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceList<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub page: i32,
    #[serde(default)]
    pub size: i32,
    #[serde(default)]
    pub total: i32,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> ResourceList<T> {
    pub fn from_items(items: Vec<T>) -> Self {
        let len = i32::try_from(items.len()).unwrap_or(i32::MAX);
        Self {
            kind: None,
            page: 1,
            size: len,
            total: len,
            items,
        }
    }
}

impl<T> Default for ResourceList<T> {
    fn default() -> Self {
        Self::from_items(Vec::new())
    }
}

pub type AdapterStatusList = ResourceList<AdapterStatus>;

impl ResourceState for AdapterStatusList {
    fn state_description(&self) -> String {
        if self.items.is_empty() {
            return "no adapter statuses reported".to_string();
        }
        self.items
            .iter()
            .map(|s| {
                format!(
                    "{}[gen={}; {}]",
                    s.adapter,
                    s.observed_generation,
                    describe_conditions(&s.conditions)
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A managed cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default)]
    pub generation: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub spec: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResourceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

/// A managed nodepool, owned by a cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default)]
    pub generation: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub spec: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResourceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_references: Option<ObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_time: Option<DateTime<Utc>>,
}

/// Reference from a nodepool to its owning cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectReference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// Body of `POST /clusters`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCreateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub spec: serde_json::Value,
}

/// Body of `POST /clusters/{id}/nodepools`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePoolCreateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub spec: serde_json::Value,
}

/// Snapshot of a parent resource's generation and aggregated status
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub target: ResourceRef,
    pub generation: i64,
    pub status: ResourceStatus,
}

impl StatusSnapshot {
    pub fn conditions(&self) -> &[Condition] {
        &self.status.conditions
    }

    pub fn phase(&self) -> Option<ResourcePhase> {
        self.status.phase
    }
}

impl From<&Cluster> for StatusSnapshot {
    fn from(cluster: &Cluster) -> Self {
        Self {
            target: ResourceRef::cluster(cluster.id.clone().unwrap_or_default()),
            generation: cluster.generation,
            status: cluster.status.clone().unwrap_or_default(),
        }
    }
}

impl ResourceState for StatusSnapshot {
    fn state_description(&self) -> String {
        format!(
            "generation={}, {}",
            self.generation,
            self.status.state_description()
        )
    }
}

impl ResourceState for Cluster {
    fn state_description(&self) -> String {
        StatusSnapshot::from(self).state_description()
    }
}

/// Addresses a parent resource whose status and adapter reports can be polled
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    Cluster(String),
    NodePool {
        cluster_id: String,
        nodepool_id: String,
    },
}

impl ResourceRef {
    pub fn cluster(id: impl Into<String>) -> Self {
        ResourceRef::Cluster(id.into())
    }

    pub fn nodepool(cluster_id: impl Into<String>, nodepool_id: impl Into<String>) -> Self {
        ResourceRef::NodePool {
            cluster_id: cluster_id.into(),
            nodepool_id: nodepool_id.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Cluster(id) => write!(f, "cluster/{id}"),
            ResourceRef::NodePool {
                cluster_id,
                nodepool_id,
            } => write!(f, "nodepool/{cluster_id}/{nodepool_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_deserializes_from_api_json() {
        let body = r#"{
            "id": "2abc",
            "kind": "Cluster",
            "name": "hp-cluster-1",
            "generation": 1,
            "spec": {"platform": {"type": "gcp"}},
            "status": {
                "phase": "NotReady",
                "conditions": [
                    {"type": "Ready", "status": "False", "reason": "Pending",
                     "message": "adapters reporting", "observedGeneration": 1,
                     "lastTransitionTime": "2025-01-01T00:00:00Z"}
                ]
            }
        }"#;

        let cluster: Cluster = serde_json::from_str(body).unwrap();
        assert_eq!(cluster.id.as_deref(), Some("2abc"));
        let status = cluster.status.unwrap();
        assert_eq!(status.phase, Some(ResourcePhase::NotReady));
        assert_eq!(status.conditions[0].type_, "Ready");
        assert_eq!(status.conditions[0].status, ConditionStatus::False);
        assert_eq!(status.conditions[0].observed_generation, 1);
    }

    #[test]
    fn test_adapter_status_list_tolerates_missing_fields() {
        let body = r#"{"items": [{"adapter": "clusters-job"}]}"#;
        let list: AdapterStatusList = serde_json::from_str(body).unwrap();
        assert_eq!(list.items.len(), 1);
        assert!(list.items[0].conditions.is_empty());
        assert!(list.items[0].created_time.is_none());
    }

    #[test]
    fn test_resource_ref_display() {
        assert_eq!(ResourceRef::cluster("c1").to_string(), "cluster/c1");
        assert_eq!(
            ResourceRef::nodepool("c1", "np1").to_string(),
            "nodepool/c1/np1"
        );
    }

    #[test]
    fn test_adapter_list_state_description() {
        let list = AdapterStatusList::from_items(vec![AdapterStatus::new("clusters-job")
            .observed_generation(2)
            .condition(Condition::new("Applied", ConditionStatus::True))]);
        let state = list.state_description();
        assert!(state.contains("clusters-job"));
        assert!(state.contains("gen=2"));
        assert!(state.contains("Applied=True"));
    }
}
