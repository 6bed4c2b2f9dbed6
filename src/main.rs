use std::future::ready;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::Api;
use kube::runtime::controller::Controller;
use kube::runtime::watcher;
use kube::{Client, CustomResourceExt};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::core::config::{compose_config, OperatorConfig};
use crate::core::metrics::OperatorMetrics;
use crate::model::context::ContextData;
use crate::model::spec::ClusterAutoscaler;
use crate::policy::error::error_policy;
use crate::policy::reconciliation::reconcile;
use crate::service::store_svc::KubeObjectStore;

mod core;
mod http;
mod model;
mod policy;
mod service;

fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    if std::env::args().nth(1).as_deref() == Some("export") {
        println!("{}", serde_yaml::to_string(&ClusterAutoscaler::crd())?);
        return Ok(());
    }

    let app_config: OperatorConfig = compose_config("autoscaler", "autoscaler")?;
    let address = app_config.address;

    let kubernetes_client = Client::try_default().await?;

    let recorder_handle = setup_metrics_recorder()?;
    let context = Arc::new(ContextData {
        store: Arc::new(KubeObjectStore::new(kubernetes_client.clone())),
        config: app_config.clone(),
        metrics: OperatorMetrics::register(),
    });

    let app = Router::new()
        .route("/healthz", get(http::status::health_handler))
        .route("/readyz", get(http::status::ready_handler))
        .route("/metrics", get(move || ready(recorder_handle.render())))
        .with_state(context.clone());

    let server = axum::Server::bind(&address).serve(app.into_make_service());
    tokio::spawn(async move {
        if let Err(err) = server.await {
            log::error!("Error running status server - {err}");
        }
    });

    let crd_api = Api::<ClusterAutoscaler>::namespaced(kubernetes_client.clone(), &app_config.namespace);
    let deployment_api = Api::<Deployment>::namespaced(kubernetes_client, &app_config.namespace);

    Controller::new(crd_api, watcher::Config::default())
        .owns(deployment_api, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|reconciliation_result| async move {
            match reconciliation_result {
                Ok(autoscaler_resource) => {
                    log::info!("Reconciliation successful. Resource: {autoscaler_resource:?}");
                }
                Err(reconciliation_err) => {
                    log::warn!("Reconciliation error: {reconciliation_err:?}");
                }
            }
        })
        .await;

    Ok(())
}
