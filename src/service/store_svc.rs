use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::PostParams;
use kube::core::ErrorResponse;
use kube::{Api, Client};
#[cfg(test)]
use mockall::automock;

use crate::model::spec::ClusterAutoscaler;

/// Primitive operations against the backing object store.
///
/// This trait abstracts the cluster API for testability; the reconciler only
/// ever creates, fetches or replaces whole objects through it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeStore: Send + Sync {
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, kube::Error>;

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, kube::Error>;

    async fn update_deployment(
        &self,
        namespace: &str,
        name: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, kube::Error>;

    async fn get_cluster_autoscaler(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ClusterAutoscaler, kube::Error>;
}

/// Store implementation backed by the cluster API server.
pub struct KubeObjectStore {
    client: Client,
}

impl KubeObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn autoscalers(&self, namespace: &str) -> Api<ClusterAutoscaler> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl KubeStore for KubeObjectStore {
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, kube::Error> {
        self.deployments(namespace)
            .create(&PostParams::default(), deployment)
            .await
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, kube::Error> {
        self.deployments(namespace).get(name).await
    }

    async fn update_deployment(
        &self,
        namespace: &str,
        name: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, kube::Error> {
        self.deployments(namespace)
            .replace(name, &PostParams::default(), deployment)
            .await
    }

    async fn get_cluster_autoscaler(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ClusterAutoscaler, kube::Error> {
        self.autoscalers(namespace).get(name).await
    }
}

pub fn is_already_exists(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ErrorResponse { reason, .. }) if reason == "AlreadyExists")
}

pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ErrorResponse { reason, .. }) if reason == "NotFound")
}
