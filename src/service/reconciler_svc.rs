use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::context::ContextData;
use crate::model::error::Error;
use crate::model::event::{ResourceEvent, WatchedResource};
use crate::model::spec::ClusterAutoscaler;
use crate::service::deployment_svc;
use crate::service::store_svc::{is_already_exists, is_not_found};

pub struct AutoscalerReconciler {
    ctx: Arc<ContextData>,
}

impl AutoscalerReconciler {
    pub fn new(ctx: Arc<ContextData>) -> Self {
        Self { ctx }
    }

    /// Applies a change notification, creating or updating the managed deployment.
    pub async fn handle(&self, event: ResourceEvent) -> Result<(), Error> {
        if event.deleted {
            // Generated deployments carry owner references, the cluster
            // collects them together with their resource.
            return Ok(());
        }

        match &event.resource {
            WatchedResource::ClusterAutoscaler(autoscaler) => {
                self.ensure_deployment(autoscaler).await
            }
        }
    }

    async fn ensure_deployment(&self, autoscaler: &ClusterAutoscaler) -> Result<(), Error> {
        let desired = deployment_svc::autoscaler_deployment(autoscaler, &self.ctx.config)?;
        let namespace = desired
            .metadata
            .namespace
            .clone()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
        let name = desired
            .metadata
            .name
            .clone()
            .ok_or(Error::MissingObjectKey(".metadata.name"))?;

        match self.ctx.store.create_deployment(&namespace, &desired).await {
            Ok(_) => {
                log::info!("Created autoscaler deployment {name}");
                Ok(())
            }
            Err(err) if is_already_exists(&err) => {
                self.update_deployment(autoscaler, &namespace, &name).await
            }
            Err(err) => Err(Error::DeploymentCreationFailed(err)),
        }
    }

    async fn update_deployment(
        &self,
        autoscaler: &ClusterAutoscaler,
        namespace: &str,
        name: &str,
    ) -> Result<(), Error> {
        let mut existing = self
            .ctx
            .store
            .get_deployment(namespace, name)
            .await
            .map_err(Error::DeploymentLookupFailed)?;

        let desired_template = deployment_svc::autoscaler_pod_template(autoscaler, &self.ctx.config)?;

        let Some(existing_spec) = existing.spec.as_mut() else {
            return Err(Error::MissingObjectKey(".spec"));
        };

        if existing_spec.template == desired_template {
            log::debug!("Autoscaler deployment {name} is up to date");
            return Ok(());
        }

        existing_spec.template = desired_template;
        existing
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(
                String::from(deployment_svc::RELEASE_VERSION_ANNOTATION),
                self.ctx.config.release_version.clone(),
            );

        self.ctx
            .store
            .update_deployment(namespace, name, &existing)
            .await
            .map_err(Error::DeploymentUpdateFailed)?;

        log::info!("Updated autoscaler deployment {name}");
        Ok(())
    }

    /// Reports whether the managed deployment is running and carries the
    /// configured release version.
    ///
    /// Mismatches answer `false`; only transport failures surface as errors.
    pub async fn available_and_updated(&self) -> Result<bool, Error> {
        let config = &self.ctx.config;

        match self
            .ctx
            .store
            .get_cluster_autoscaler(&config.namespace, &config.name)
            .await
        {
            Ok(_) => {}
            // Nothing is managed, so nothing can be outdated.
            Err(err) if is_not_found(&err) => return Ok(true),
            Err(err) => return Err(Error::AutoscalerLookupFailed(err)),
        }

        let name = deployment_svc::deployment_name(&config.name);
        let deployment = match self.ctx.store.get_deployment(&config.namespace, &name).await {
            Ok(deployment) => deployment,
            Err(err) if is_not_found(&err) => return Ok(false),
            Err(err) => return Err(Error::DeploymentLookupFailed(err)),
        };

        let deployment_version = deployment
            .metadata
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(deployment_svc::RELEASE_VERSION_ANNOTATION))
            .map(String::as_str)
            .unwrap_or_default();
        if deployment_version != config.release_version {
            log::debug!(
                "Autoscaler deployment {name} carries version {deployment_version:?}, expected {:?}",
                config.release_version
            );
            return Ok(false);
        }

        let available_replicas = deployment
            .status
            .as_ref()
            .and_then(|status| status.available_replicas)
            .unwrap_or(0);

        Ok(available_replicas >= 1)
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
    use kube::core::ErrorResponse;

    use crate::core::config::OperatorConfig;
    use crate::core::metrics::OperatorMetrics;
    use crate::model::spec::ClusterAutoscalerSpec;
    use crate::service::store_svc::MockKubeStore;

    use super::*;

    const TEST_NAMESPACE: &str = "test";

    fn test_config(release_version: &str) -> OperatorConfig {
        OperatorConfig {
            namespace: String::from(TEST_NAMESPACE),
            name: String::from("test"),
            image: String::from("quay.io/bison/cluster-autoscaler:a554b4f5"),
            release_version: String::from(release_version),
            cloud_provider: String::from("testProvider"),
            address: SocketAddr::from(([0, 0, 0, 0], 9090)),
        }
    }

    fn new_cluster_autoscaler() -> ClusterAutoscaler {
        let mut autoscaler = ClusterAutoscaler::new(
            "test",
            ClusterAutoscalerSpec {
                pod_priority_threshold: Some(-10),
                max_pod_grace_period: Some(60),
                resource_limits: None,
                scale_down: None,
            },
        );
        autoscaler.metadata.namespace = Some(String::from(TEST_NAMESPACE));
        autoscaler.metadata.uid = Some(String::from("6b9b7d43-b73b-4a5c-9b26-4b5f0a0e2e35"));
        autoscaler
    }

    fn autoscaler_event(autoscaler: ClusterAutoscaler, deleted: bool) -> ResourceEvent {
        ResourceEvent {
            resource: WatchedResource::ClusterAutoscaler(Arc::new(autoscaler)),
            deleted,
        }
    }

    fn reconciler(store: MockKubeStore, config: OperatorConfig) -> AutoscalerReconciler {
        AutoscalerReconciler::new(Arc::new(ContextData {
            store: Arc::new(store),
            config,
            metrics: OperatorMetrics::register(),
        }))
    }

    fn deployment_fixture(version: &str, available_replicas: i32) -> Deployment {
        Deployment {
            metadata: kube::api::ObjectMeta {
                name: Some(String::from("cluster-autoscaler-test")),
                namespace: Some(String::from(TEST_NAMESPACE)),
                annotations: Some(
                    [(
                        String::from(deployment_svc::RELEASE_VERSION_ANNOTATION),
                        String::from(version),
                    )]
                    .into_iter()
                    .collect(),
                ),
                ..Default::default()
            },
            status: Some(DeploymentStatus {
                available_replicas: Some(available_replicas),
                replicas: Some(1),
                updated_replicas: Some(1),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn api_error(reason: &str, code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: String::from("Failure"),
            message: format!("{reason} error"),
            reason: String::from(reason),
            code,
        })
    }

    #[tokio::test]
    async fn test_reconcile_creates_missing_deployment() {
        let mut store = MockKubeStore::new();
        store
            .expect_create_deployment()
            .withf(|namespace, deployment| {
                namespace == TEST_NAMESPACE
                    && deployment.metadata.name.as_deref() == Some("cluster-autoscaler-test")
            })
            .times(1)
            .returning(|_, deployment| Ok(deployment.clone()));
        store.expect_get_deployment().times(0);
        store.expect_update_deployment().times(0);

        let reconciler = reconciler(store, test_config("test-1"));
        let out = reconciler.handle(autoscaler_event(new_cluster_autoscaler(), false)).await;

        assert!(out.is_ok());
    }

    #[tokio::test]
    async fn test_reconcile_twice_creates_once_and_never_updates() {
        let autoscaler = new_cluster_autoscaler();
        let config = test_config("test-1");
        let stored = deployment_svc::autoscaler_deployment(&autoscaler, &config)
            .expect("Cannot build deployment");

        let creations = AtomicUsize::new(0);
        let mut store = MockKubeStore::new();
        store
            .expect_create_deployment()
            .times(2)
            .returning(move |_, deployment| {
                if creations.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(deployment.clone())
                } else {
                    Err(api_error("AlreadyExists", 409))
                }
            });
        store
            .expect_get_deployment()
            .times(1)
            .returning(move |_, _| Ok(stored.clone()));
        store.expect_update_deployment().times(0);

        let reconciler = reconciler(store, config);
        let first = reconciler.handle(autoscaler_event(autoscaler.clone(), false)).await;
        let second = reconciler.handle(autoscaler_event(autoscaler, false)).await;

        assert!(first.is_ok());
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_reconcile_updates_deployment_on_version_change() {
        let autoscaler = new_cluster_autoscaler();
        let old_config = test_config("test-0");
        let new_config = test_config("test-1");

        let stored = deployment_svc::autoscaler_deployment(&autoscaler, &old_config)
            .expect("Cannot build deployment");
        let desired_template = deployment_svc::autoscaler_pod_template(&autoscaler, &new_config)
            .expect("Cannot build pod template");

        let mut store = MockKubeStore::new();
        store
            .expect_create_deployment()
            .times(1)
            .returning(|_, _| Err(api_error("AlreadyExists", 409)));
        store
            .expect_get_deployment()
            .times(1)
            .returning(move |_, _| Ok(stored.clone()));
        store
            .expect_update_deployment()
            .withf(move |namespace, name, deployment| {
                let annotations = deployment.metadata.annotations.as_ref();
                namespace == TEST_NAMESPACE
                    && name == "cluster-autoscaler-test"
                    && deployment.spec.as_ref().map(|spec| &spec.template) == Some(&desired_template)
                    && annotations
                        .and_then(|a| a.get(deployment_svc::RELEASE_VERSION_ANNOTATION))
                        .map(String::as_str)
                        == Some("test-1")
            })
            .times(1)
            .returning(|_, _, deployment| Ok(deployment.clone()));

        let reconciler = reconciler(store, new_config);
        let out = reconciler.handle(autoscaler_event(autoscaler, false)).await;

        assert!(out.is_ok());
    }

    #[tokio::test]
    async fn test_reconcile_skips_update_when_deployment_matches() {
        let autoscaler = new_cluster_autoscaler();
        let config = test_config("test-1");
        let stored = deployment_svc::autoscaler_deployment(&autoscaler, &config)
            .expect("Cannot build deployment");

        let mut store = MockKubeStore::new();
        store
            .expect_create_deployment()
            .times(1)
            .returning(|_, _| Err(api_error("AlreadyExists", 409)));
        store
            .expect_get_deployment()
            .times(1)
            .returning(move |_, _| Ok(stored.clone()));
        store.expect_update_deployment().times(0);

        let reconciler = reconciler(store, config);
        let out = reconciler.handle(autoscaler_event(autoscaler, false)).await;

        assert!(out.is_ok());
    }

    #[tokio::test]
    async fn test_reconcile_fails_fast_on_other_create_errors() {
        let mut store = MockKubeStore::new();
        store
            .expect_create_deployment()
            .times(1)
            .returning(|_, _| Err(api_error("Forbidden", 403)));
        store.expect_get_deployment().times(0);
        store.expect_update_deployment().times(0);

        let reconciler = reconciler(store, test_config("test-1"));
        let out = reconciler.handle(autoscaler_event(new_cluster_autoscaler(), false)).await;

        assert!(matches!(out, Err(Error::DeploymentCreationFailed(_))));
    }

    #[tokio::test]
    async fn test_reconcile_propagates_update_path_lookup_errors() {
        let mut store = MockKubeStore::new();
        store
            .expect_create_deployment()
            .times(1)
            .returning(|_, _| Err(api_error("AlreadyExists", 409)));
        store
            .expect_get_deployment()
            .times(1)
            .returning(|_, _| Err(api_error("InternalError", 500)));
        store.expect_update_deployment().times(0);

        let reconciler = reconciler(store, test_config("test-1"));
        let out = reconciler.handle(autoscaler_event(new_cluster_autoscaler(), false)).await;

        assert!(matches!(out, Err(Error::DeploymentLookupFailed(_))));
    }

    #[tokio::test]
    async fn test_reconcile_propagates_rejected_updates() {
        let autoscaler = new_cluster_autoscaler();
        let stored = deployment_svc::autoscaler_deployment(&autoscaler, &test_config("test-0"))
            .expect("Cannot build deployment");

        let mut store = MockKubeStore::new();
        store
            .expect_create_deployment()
            .times(1)
            .returning(|_, _| Err(api_error("AlreadyExists", 409)));
        store
            .expect_get_deployment()
            .times(1)
            .returning(move |_, _| Ok(stored.clone()));
        store
            .expect_update_deployment()
            .times(1)
            .returning(|_, _, _| Err(api_error("Conflict", 409)));

        let reconciler = reconciler(store, test_config("test-1"));
        let out = reconciler.handle(autoscaler_event(autoscaler, false)).await;

        assert!(matches!(out, Err(Error::DeploymentUpdateFailed(_))));
    }

    #[tokio::test]
    async fn test_deleted_event_is_ignored() {
        let store = MockKubeStore::new();

        let reconciler = reconciler(store, test_config("test-1"));
        let out = reconciler.handle(autoscaler_event(new_cluster_autoscaler(), true)).await;

        assert!(out.is_ok());
    }

    #[tokio::test]
    async fn test_available_when_deployment_current() {
        let autoscaler = new_cluster_autoscaler();
        let mut store = MockKubeStore::new();
        store
            .expect_get_cluster_autoscaler()
            .times(1)
            .returning(move |_, _| Ok(autoscaler.clone()));
        store
            .expect_get_deployment()
            .withf(|namespace, name| namespace == TEST_NAMESPACE && name == "cluster-autoscaler-test")
            .times(1)
            .returning(|_, _| Ok(deployment_fixture("test-1", 1)));

        let reconciler = reconciler(store, test_config("test-1"));

        assert!(matches!(reconciler.available_and_updated().await, Ok(true)));
    }

    #[tokio::test]
    async fn test_not_available_on_version_mismatch() {
        let autoscaler = new_cluster_autoscaler();
        let mut store = MockKubeStore::new();
        store
            .expect_get_cluster_autoscaler()
            .times(1)
            .returning(move |_, _| Ok(autoscaler.clone()));
        store
            .expect_get_deployment()
            .times(1)
            .returning(|_, _| Ok(deployment_fixture("test-2", 1)));

        let reconciler = reconciler(store, test_config("test-1"));

        assert!(matches!(reconciler.available_and_updated().await, Ok(false)));
    }

    #[tokio::test]
    async fn test_available_when_no_autoscaler_resource() {
        let mut store = MockKubeStore::new();
        store
            .expect_get_cluster_autoscaler()
            .times(1)
            .returning(|_, _| Err(api_error("NotFound", 404)));
        store.expect_get_deployment().times(0);

        let reconciler = reconciler(store, test_config("test-2"));

        assert!(matches!(reconciler.available_and_updated().await, Ok(true)));
    }

    #[tokio::test]
    async fn test_not_available_when_deployment_missing() {
        let autoscaler = new_cluster_autoscaler();
        let mut store = MockKubeStore::new();
        store
            .expect_get_cluster_autoscaler()
            .times(1)
            .returning(move |_, _| Ok(autoscaler.clone()));
        store
            .expect_get_deployment()
            .times(1)
            .returning(|_, _| Err(api_error("NotFound", 404)));

        let reconciler = reconciler(store, test_config("test-1"));

        assert!(matches!(reconciler.available_and_updated().await, Ok(false)));
    }

    #[tokio::test]
    async fn test_not_available_without_ready_replicas() {
        let autoscaler = new_cluster_autoscaler();
        let mut store = MockKubeStore::new();
        store
            .expect_get_cluster_autoscaler()
            .times(1)
            .returning(move |_, _| Ok(autoscaler.clone()));
        store
            .expect_get_deployment()
            .times(1)
            .returning(|_, _| Ok(deployment_fixture("test-1", 0)));

        let reconciler = reconciler(store, test_config("test-1"));

        assert!(matches!(reconciler.available_and_updated().await, Ok(false)));
    }

    #[tokio::test]
    async fn test_availability_check_propagates_transport_errors() {
        let autoscaler = new_cluster_autoscaler();
        let mut store = MockKubeStore::new();
        store
            .expect_get_cluster_autoscaler()
            .times(1)
            .returning(move |_, _| Ok(autoscaler.clone()));
        store
            .expect_get_deployment()
            .times(1)
            .returning(|_, _| Err(api_error("InternalError", 500)));

        let reconciler = reconciler(store, test_config("test-1"));

        assert!(matches!(
            reconciler.available_and_updated().await,
            Err(Error::DeploymentLookupFailed(_))
        ));
    }
}
