use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to create autoscaler deployment: {0}")]
    DeploymentCreationFailed(#[source] kube::Error),
    #[error("Failed to get autoscaler deployment: {0}")]
    DeploymentLookupFailed(#[source] kube::Error),
    #[error("Failed to update autoscaler deployment: {0}")]
    DeploymentUpdateFailed(#[source] kube::Error),
    #[error("Failed to get ClusterAutoscaler resource: {0}")]
    AutoscalerLookupFailed(#[source] kube::Error),
    #[error("MissingObjectKey: {0}")]
    MissingObjectKey(&'static str),
}
