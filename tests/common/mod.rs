//! In-memory fakes for driving scenarios without a live API or cluster
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentCondition, DeploymentStatus};
use k8s_openapi::api::batch::v1::{Job, JobCondition, JobStatus};
use k8s_openapi::api::core::v1::{Namespace, NamespaceStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use hyperfleet_e2e::client::{ApiError, FleetApi};
use hyperfleet_e2e::config::Config;
use hyperfleet_e2e::helper::Helper;
use hyperfleet_e2e::model::{
    AdapterStatus, AdapterStatusList, Cluster, ClusterCreateRequest, Condition, ConditionStatus,
    NodePool, NodePoolCreateRequest, ResourcePhase, ResourceRef, ResourceStatus,
};
use hyperfleet_e2e::resources::ObjectLister;

pub const CLUSTER_ID_LABEL: &str = "hyperfleet.io/cluster-id";
pub const GENERATION_ANNOTATION: &str = "hyperfleet.io/generation";

pub fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
}

/// Every fake resource is created at this generation
pub const GENERATION: i64 = 1;

/// Condition observed at the current resource generation
pub fn cond(type_: &str, status: ConditionStatus) -> Condition {
    cond_at(type_, status, GENERATION)
}

pub fn cond_at(type_: &str, status: ConditionStatus, generation: i64) -> Condition {
    Condition::new(type_, status)
        .reason("Reconciled")
        .message(format!("{type_} is {status}"))
        .transitioned_at(ts())
        .observed_generation(generation)
}

pub fn status(phase: ResourcePhase, conditions: Vec<Condition>) -> ResourceStatus {
    ResourceStatus {
        phase: Some(phase),
        conditions,
        observed_generation: Some(GENERATION),
        ..ResourceStatus::default()
    }
}

/// Adapter report with Applied/Available/Health all at `s`
pub fn adapter(name: &str, s: ConditionStatus) -> AdapterStatus {
    AdapterStatus::new(name)
        .condition(cond("Applied", s))
        .condition(cond("Available", s))
        .condition(cond("Health", s))
        .reported_at(ts(), ts())
        .observed_generation(GENERATION)
}

pub fn adapter_with(name: &str, conditions: Vec<Condition>) -> AdapterStatus {
    let mut report = AdapterStatus::new(name)
        .reported_at(ts(), ts())
        .observed_generation(GENERATION);
    report.conditions = conditions;
    report
}

/// Config with short timeouts suitable for paused-clock tests
pub fn test_config() -> Config {
    Config::new("http://hyperfleet.test")
        .poll_interval(Duration::from_secs(1))
        .cluster_ready_timeout(Duration::from_secs(60))
        .nodepool_ready_timeout(Duration::from_secs(60))
        .adapter_processing_timeout(Duration::from_secs(30))
}

pub fn helper(api: &Arc<FakeApi>, k8s: &Arc<FakeLister>) -> Helper {
    Helper::new(
        Arc::new(test_config()),
        Arc::clone(api) as Arc<dyn FleetApi>,
        Arc::clone(k8s) as Arc<dyn ObjectLister>,
    )
}

/// Replays scripted frames; the last frame repeats forever
#[derive(Debug, Default)]
struct Timeline<T> {
    frames: Vec<T>,
    calls: usize,
    served: usize,
    failures: usize,
}

impl<T: Clone> Timeline<T> {
    fn next(&mut self, action: &str) -> Result<T, ApiError> {
        self.calls += 1;
        if self.failures > 0 {
            self.failures -= 1;
            return Err(ApiError::UnexpectedStatus {
                action: action.to_string(),
                status: 503,
                body: "upstream unavailable".to_string(),
            });
        }
        if self.frames.is_empty() {
            return Err(ApiError::UnexpectedStatus {
                action: action.to_string(),
                status: 404,
                body: "not found".to_string(),
            });
        }
        let index = self.served.min(self.frames.len() - 1);
        self.served += 1;
        Ok(self.frames[index].clone())
    }
}

#[derive(Default)]
struct ApiState {
    cluster_seq: u32,
    nodepool_seq: u32,
    initial_cluster_status: ResourceStatus,
    initial_nodepool_status: ResourceStatus,
    statuses: HashMap<ResourceRef, Timeline<ResourceStatus>>,
    adapters: HashMap<ResourceRef, Timeline<Vec<AdapterStatus>>>,
    deleted_clusters: Vec<String>,
    deleted_nodepools: Vec<(String, String)>,
}

/// Scripted `FleetApi`
///
/// Created clusters get IDs `cluster-1`, `cluster-2`, ... and nodepools
/// `nodepool-1`, ...; frames can be scripted before the IDs exist.
#[derive(Default)]
pub struct FakeApi {
    state: Mutex<ApiState>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        let api = Self::default();
        {
            let mut state = api.state.lock().unwrap();
            state.initial_cluster_status = status(
                ResourcePhase::NotReady,
                vec![
                    cond("Ready", ConditionStatus::False),
                    cond("Available", ConditionStatus::False),
                ],
            );
            state.initial_nodepool_status = status(ResourcePhase::NotReady, Vec::new());
        }
        Arc::new(api)
    }

    pub fn initial_cluster_status(&self, s: ResourceStatus) {
        self.state.lock().unwrap().initial_cluster_status = s;
    }

    pub fn script_status(&self, target: ResourceRef, frames: Vec<ResourceStatus>) {
        self.state.lock().unwrap().statuses.entry(target).or_default().frames = frames;
    }

    pub fn script_adapters(&self, target: ResourceRef, frames: Vec<Vec<AdapterStatus>>) {
        self.state.lock().unwrap().adapters.entry(target).or_default().frames = frames;
    }

    /// Answer the next `n` status fetches for `target` with a 503
    pub fn fail_status(&self, target: ResourceRef, n: usize) {
        self.state
            .lock()
            .unwrap()
            .statuses
            .entry(target)
            .or_default()
            .failures = n;
    }

    pub fn status_calls(&self, target: &ResourceRef) -> usize {
        self.state
            .lock()
            .unwrap()
            .statuses
            .get(target)
            .map_or(0, |t| t.calls)
    }

    pub fn adapter_calls(&self, target: &ResourceRef) -> usize {
        self.state
            .lock()
            .unwrap()
            .adapters
            .get(target)
            .map_or(0, |t| t.calls)
    }

    pub fn deleted_clusters(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_clusters.clone()
    }

    fn next_status(&self, target: &ResourceRef, action: &str) -> Result<ResourceStatus, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.statuses.entry(target.clone()).or_default().next(action)
    }
}

#[async_trait]
impl FleetApi for FakeApi {
    async fn create_cluster(&self, request: &ClusterCreateRequest) -> Result<Cluster, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.cluster_seq += 1;
        Ok(Cluster {
            id: Some(format!("cluster-{}", state.cluster_seq)),
            kind: Some("Cluster".to_string()),
            name: request.name.clone(),
            href: None,
            generation: GENERATION,
            labels: request.labels.clone(),
            spec: request.spec.clone(),
            status: Some(state.initial_cluster_status.clone()),
            created_time: Some(ts()),
            updated_time: Some(ts()),
            created_by: None,
            updated_by: None,
        })
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<Cluster, ApiError> {
        let status = self.next_status(&ResourceRef::cluster(cluster_id), "get cluster")?;
        Ok(Cluster {
            id: Some(cluster_id.to_string()),
            kind: Some("Cluster".to_string()),
            name: format!("{cluster_id}-name"),
            href: None,
            generation: GENERATION,
            labels: None,
            spec: serde_json::Value::Null,
            status: Some(status),
            created_time: Some(ts()),
            updated_time: Some(ts()),
            created_by: None,
            updated_by: None,
        })
    }

    async fn list_clusters(&self) -> Result<Vec<Cluster>, ApiError> {
        Ok(Vec::new())
    }

    async fn get_cluster_statuses(&self, cluster_id: &str) -> Result<AdapterStatusList, ApiError> {
        let mut state = self.state.lock().unwrap();
        let items = state
            .adapters
            .entry(ResourceRef::cluster(cluster_id))
            .or_default()
            .next("get cluster statuses")?;
        Ok(AdapterStatusList::from_items(items))
    }

    async fn delete_cluster(&self, cluster_id: &str) -> Result<(), ApiError> {
        self.state
            .lock()
            .unwrap()
            .deleted_clusters
            .push(cluster_id.to_string());
        Ok(())
    }

    async fn create_nodepool(
        &self,
        _cluster_id: &str,
        request: &NodePoolCreateRequest,
    ) -> Result<NodePool, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.nodepool_seq += 1;
        Ok(NodePool {
            id: Some(format!("nodepool-{}", state.nodepool_seq)),
            kind: Some("NodePool".to_string()),
            name: request.name.clone(),
            href: None,
            generation: GENERATION,
            labels: None,
            spec: serde_json::Value::Null,
            status: Some(state.initial_nodepool_status.clone()),
            owner_references: None,
            created_time: Some(ts()),
            updated_time: Some(ts()),
        })
    }

    async fn get_nodepool(&self, cluster_id: &str, nodepool_id: &str) -> Result<NodePool, ApiError> {
        let status = self.next_status(
            &ResourceRef::nodepool(cluster_id, nodepool_id),
            "get nodepool",
        )?;
        Ok(NodePool {
            id: Some(nodepool_id.to_string()),
            kind: Some("NodePool".to_string()),
            name: format!("{nodepool_id}-name"),
            href: None,
            generation: GENERATION,
            labels: None,
            spec: serde_json::Value::Null,
            status: Some(status),
            owner_references: None,
            created_time: Some(ts()),
            updated_time: Some(ts()),
        })
    }

    async fn list_nodepools(&self, _cluster_id: &str) -> Result<Vec<NodePool>, ApiError> {
        Ok(Vec::new())
    }

    async fn get_nodepool_statuses(
        &self,
        cluster_id: &str,
        nodepool_id: &str,
    ) -> Result<AdapterStatusList, ApiError> {
        let mut state = self.state.lock().unwrap();
        let items = state
            .adapters
            .entry(ResourceRef::nodepool(cluster_id, nodepool_id))
            .or_default()
            .next("get nodepool statuses")?;
        Ok(AdapterStatusList::from_items(items))
    }

    async fn delete_nodepool(&self, cluster_id: &str, nodepool_id: &str) -> Result<(), ApiError> {
        self.state
            .lock()
            .unwrap()
            .deleted_nodepools
            .push((cluster_id.to_string(), nodepool_id.to_string()));
        Ok(())
    }
}

fn meta(
    name: &str,
    namespace: Option<&str>,
    labels: &[(&str, &str)],
    annotations: &[(&str, &str)],
) -> ObjectMeta {
    let to_map = |pairs: &[(&str, &str)]| -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    };
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        labels: Some(to_map(labels)),
        annotations: Some(to_map(annotations)),
        ..ObjectMeta::default()
    }
}

pub fn namespace(
    name: &str,
    labels: &[(&str, &str)],
    annotations: &[(&str, &str)],
    phase: &str,
) -> Namespace {
    Namespace {
        metadata: meta(name, None, labels, annotations),
        status: Some(NamespaceStatus {
            phase: Some(phase.to_string()),
            ..NamespaceStatus::default()
        }),
        ..Namespace::default()
    }
}

pub fn job(
    namespace: &str,
    name: &str,
    labels: &[(&str, &str)],
    annotations: &[(&str, &str)],
    complete: &str,
) -> Job {
    Job {
        metadata: meta(name, Some(namespace), labels, annotations),
        status: Some(JobStatus {
            succeeded: Some(1),
            conditions: Some(vec![JobCondition {
                type_: "Complete".to_string(),
                status: complete.to_string(),
                ..JobCondition::default()
            }]),
            ..JobStatus::default()
        }),
        ..Job::default()
    }
}

pub fn deployment(
    namespace: &str,
    name: &str,
    labels: &[(&str, &str)],
    annotations: &[(&str, &str)],
    available: &str,
) -> Deployment {
    Deployment {
        metadata: meta(name, Some(namespace), labels, annotations),
        status: Some(DeploymentStatus {
            conditions: Some(vec![DeploymentCondition {
                type_: "Available".to_string(),
                status: available.to_string(),
                ..DeploymentCondition::default()
            }]),
            ..DeploymentStatus::default()
        }),
        ..Deployment::default()
    }
}

fn selector_matches(meta: &ObjectMeta, selector: &str) -> bool {
    let labels = meta.labels.clone().unwrap_or_default();
    selector.split(',').all(|term| match term.split_once('=') {
        Some((k, v)) => labels.get(k).map(String::as_str) == Some(v),
        None => false,
    })
}

#[derive(Default)]
struct ListerState {
    namespaces: Vec<Namespace>,
    jobs: Vec<Job>,
    deployments: Vec<Deployment>,
    /// Namespace lists return nothing until this many calls have been made
    hidden_namespace_lists: usize,
    namespace_lists: usize,
    /// `namespace_exists` keeps reporting a deleted namespace this many times
    terminating_checks: usize,
    terminating: Option<String>,
    exists_checks: usize,
}

/// `ObjectLister` over in-memory objects with server-side style selector filtering
#[derive(Default)]
pub struct FakeLister {
    state: Mutex<ListerState>,
}

impl FakeLister {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_namespace(&self, ns: Namespace) {
        self.state.lock().unwrap().namespaces.push(ns);
    }

    pub fn add_job(&self, job: Job) {
        self.state.lock().unwrap().jobs.push(job);
    }

    pub fn add_deployment(&self, deployment: Deployment) {
        self.state.lock().unwrap().deployments.push(deployment);
    }

    pub fn hide_namespaces_for(&self, lists: usize) {
        self.state.lock().unwrap().hidden_namespace_lists = lists;
    }

    pub fn namespace_lists(&self) -> usize {
        self.state.lock().unwrap().namespace_lists
    }

    pub fn terminate_for(&self, checks: usize) {
        self.state.lock().unwrap().terminating_checks = checks;
    }

    pub fn exists_checks(&self) -> usize {
        self.state.lock().unwrap().exists_checks
    }

    /// Objects for the standard cluster cross-check of `cluster_id`
    pub fn with_cluster_resources(&self, cluster_id: &str, generation: &str) {
        let labels = [(CLUSTER_ID_LABEL, cluster_id)];
        let annotations = [(GENERATION_ANNOTATION, generation)];
        self.add_namespace(namespace(cluster_id, &labels, &annotations, "Active"));
        self.add_job(job(
            cluster_id,
            &format!("{cluster_id}-validation"),
            &labels,
            &annotations,
            "True",
        ));
        self.add_deployment(deployment(
            cluster_id,
            &format!("{cluster_id}-controller"),
            &labels,
            &annotations,
            "True",
        ));
    }
}

#[async_trait]
impl ObjectLister for FakeLister {
    async fn list_namespaces(&self, selector: &str) -> Result<Vec<Namespace>, kube::Error> {
        let mut state = self.state.lock().unwrap();
        state.namespace_lists += 1;
        if state.namespace_lists <= state.hidden_namespace_lists {
            return Ok(Vec::new());
        }
        Ok(state
            .namespaces
            .iter()
            .filter(|ns| selector_matches(&ns.metadata, selector))
            .cloned()
            .collect())
    }

    async fn list_jobs(&self, namespace: &str, selector: &str) -> Result<Vec<Job>, kube::Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .jobs
            .iter()
            .filter(|j| j.metadata.namespace.as_deref() == Some(namespace))
            .filter(|j| selector_matches(&j.metadata, selector))
            .cloned()
            .collect())
    }

    async fn list_deployments(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<Deployment>, kube::Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .deployments
            .iter()
            .filter(|d| d.metadata.namespace.as_deref() == Some(namespace))
            .filter(|d| selector_matches(&d.metadata, selector))
            .cloned()
            .collect())
    }

    async fn delete_namespace(&self, name: &str) -> Result<bool, kube::Error> {
        let mut state = self.state.lock().unwrap();
        let before = state.namespaces.len();
        state
            .namespaces
            .retain(|ns| ns.metadata.name.as_deref() != Some(name));
        let existed = state.namespaces.len() != before;
        if existed {
            state.terminating = Some(name.to_string());
        }
        Ok(existed)
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool, kube::Error> {
        let mut state = self.state.lock().unwrap();
        state.exists_checks += 1;
        if state.terminating.as_deref() == Some(name) && state.terminating_checks > 0 {
            state.terminating_checks -= 1;
            return Ok(true);
        }
        Ok(state
            .namespaces
            .iter()
            .any(|ns| ns.metadata.name.as_deref() == Some(name)))
    }
}
