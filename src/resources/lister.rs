//! Cluster object access
//!
//! `ObjectLister` is the read/delete surface the resource verifier needs
//! from Kubernetes. `KubeLister` backs it with a live `kube::Client`.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DeleteParams, ListParams};
use kube::Client;
use tracing::debug;

/// Read and delete operations against the cluster
#[async_trait]
pub trait ObjectLister: Send + Sync {
    async fn list_namespaces(&self, selector: &str) -> Result<Vec<Namespace>, kube::Error>;

    async fn list_jobs(&self, namespace: &str, selector: &str) -> Result<Vec<Job>, kube::Error>;

    async fn list_deployments(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<Deployment>, kube::Error>;

    /// Returns false if the namespace was already gone
    async fn delete_namespace(&self, name: &str) -> Result<bool, kube::Error>;

    async fn namespace_exists(&self, name: &str) -> Result<bool, kube::Error>;
}

/// `ObjectLister` backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeLister {
    client: Client,
}

impl KubeLister {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the ambient kubeconfig or in-cluster service account
    pub async fn connect() -> Result<Self, kube::Error> {
        Ok(Self::new(Client::try_default().await?))
    }
}

#[async_trait]
impl ObjectLister for KubeLister {
    async fn list_namespaces(&self, selector: &str) -> Result<Vec<Namespace>, kube::Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default().labels(selector)).await?;
        debug!(selector = %selector, count = list.items.len(), "Listed namespaces");
        Ok(list.items)
    }

    async fn list_jobs(&self, namespace: &str, selector: &str) -> Result<Vec<Job>, kube::Error> {
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default().labels(selector)).await?;
        debug!(
            namespace = %namespace,
            selector = %selector,
            count = list.items.len(),
            "Listed jobs"
        );
        Ok(list.items)
    }

    async fn list_deployments(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<Deployment>, kube::Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default().labels(selector)).await?;
        debug!(
            namespace = %namespace,
            selector = %selector,
            count = list.items.len(),
            "Listed deployments"
        );
        Ok(list.items)
    }

    async fn delete_namespace(&self, name: &str) -> Result<bool, kube::Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool, kube::Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?.is_some())
    }
}
