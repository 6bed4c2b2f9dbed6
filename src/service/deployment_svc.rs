use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec, Toleration};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::ObjectMeta;
use kube::Resource;

use crate::core::config::OperatorConfig;
use crate::model::error::Error;
use crate::model::spec::{ClusterAutoscaler, ResourceLimits, ScaleDownConfig};

pub static RELEASE_VERSION_ANNOTATION: &str = "autoscaling.d71.dev/release-version";

static CRITICAL_POD_ANNOTATION: &str = "scheduler.alpha.kubernetes.io/critical-pod";
static CA_SERVICE_ACCOUNT: &str = "cluster-autoscaler";
static CA_CONTAINER_NAME: &str = "cluster-autoscaler";
static CA_COMMAND: &str = "/cluster-autoscaler";

/// Name of the deployment generated for a resource with the given name.
pub fn deployment_name(name: &str) -> String {
    format!("cluster-autoscaler-{name}")
}

/// Builds the full deployment running the autoscaler for the given resource.
///
/// Deterministic: the same resource and settings always produce the same
/// object, so rebuilding is how the reconciler decides whether the stored
/// deployment is current.
pub fn autoscaler_deployment(
    autoscaler: &ClusterAutoscaler,
    config: &OperatorConfig,
) -> Result<Deployment, Error> {
    let name = autoscaler
        .metadata
        .name
        .as_deref()
        .ok_or(Error::MissingObjectKey(".metadata.name"))?;
    let namespace = autoscaler
        .metadata
        .namespace
        .as_deref()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    let owner_ref = autoscaler
        .controller_owner_ref(&())
        .ok_or(Error::MissingObjectKey(".metadata.uid"))?;

    let labels = autoscaler_labels(name);

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(deployment_name(name)),
            namespace: Some(namespace.to_owned()),
            annotations: Some(release_version_annotation(config)),
            owner_references: Some(vec![owner_ref]),
            ..ObjectMeta::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_expressions: None,
                match_labels: Some(labels),
            },
            template: autoscaler_pod_template(autoscaler, config)?,
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    })
}

/// Pod template embedded in the deployment; the reconciler compares this
/// against the stored one to decide whether an update is due.
pub fn autoscaler_pod_template(
    autoscaler: &ClusterAutoscaler,
    config: &OperatorConfig,
) -> Result<PodTemplateSpec, Error> {
    let name = autoscaler
        .metadata
        .name
        .as_deref()
        .ok_or(Error::MissingObjectKey(".metadata.name"))?;

    let mut annotations = release_version_annotation(config);
    annotations.insert(String::from(CRITICAL_POD_ANNOTATION), String::new());

    Ok(PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(autoscaler_labels(name)),
            annotations: Some(annotations),
            ..ObjectMeta::default()
        }),
        spec: Some(autoscaler_pod_spec(autoscaler, config)),
    })
}

fn autoscaler_pod_spec(autoscaler: &ClusterAutoscaler, config: &OperatorConfig) -> PodSpec {
    PodSpec {
        service_account_name: Some(String::from(CA_SERVICE_ACCOUNT)),
        containers: vec![Container {
            name: String::from(CA_CONTAINER_NAME),
            image: Some(config.image.clone()),
            command: Some(vec![String::from(CA_COMMAND)]),
            args: Some(autoscaler_args(autoscaler, config)),
            ..Container::default()
        }],
        tolerations: Some(vec![Toleration {
            key: Some(String::from("CriticalAddonsOnly")),
            operator: Some(String::from("Exists")),
            ..Toleration::default()
        }]),
        ..PodSpec::default()
    }
}

/// Command-line arguments for the autoscaler binary.
///
/// Every optional spec field maps to exactly one flag, present only when the
/// field is set. Namespace and cloud provider always come from the settings.
pub fn autoscaler_args(autoscaler: &ClusterAutoscaler, config: &OperatorConfig) -> Vec<String> {
    let spec = &autoscaler.spec;
    let mut args = vec![String::from("--logtostderr")];

    if let Some(grace_period) = spec.max_pod_grace_period {
        args.push(format!("--max-graceful-termination-sec={grace_period}"));
    }
    if let Some(threshold) = spec.pod_priority_threshold {
        args.push(format!("--expendable-pods-priority-cutoff={threshold}"));
    }
    if let Some(limits) = &spec.resource_limits {
        args.extend(resource_limits_args(limits));
    }
    if let Some(scale_down) = &spec.scale_down {
        args.extend(scale_down_args(scale_down));
    }

    args.push(format!("--cloud-provider={}", config.cloud_provider));
    args.push(format!("--namespace={}", config.namespace));

    args
}

fn resource_limits_args(limits: &ResourceLimits) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(max_nodes) = limits.max_nodes_total {
        args.push(format!("--max-nodes-total={max_nodes}"));
    }
    if let Some(cores) = &limits.cores {
        args.push(format!("--cores-total={}:{}", cores.min, cores.max));
    }
    if let Some(memory) = &limits.memory {
        args.push(format!("--memory-total={}:{}", memory.min, memory.max));
    }
    for gpu in limits.gpus.iter().flatten() {
        args.push(format!("--gpu-total={}:{}:{}", gpu.gpu_type, gpu.min, gpu.max));
    }

    args
}

fn scale_down_args(scale_down: &ScaleDownConfig) -> Vec<String> {
    if !scale_down.enabled {
        return vec![String::from("--scale-down-enabled=false")];
    }

    let mut args = vec![String::from("--scale-down-enabled=true")];

    if let Some(delay) = &scale_down.delay_after_add {
        args.push(format!("--scale-down-delay-after-add={delay}"));
    }
    if let Some(delay) = &scale_down.delay_after_delete {
        args.push(format!("--scale-down-delay-after-delete={delay}"));
    }
    if let Some(delay) = &scale_down.delay_after_failure {
        args.push(format!("--scale-down-delay-after-failure={delay}"));
    }
    if let Some(unneeded_time) = &scale_down.unneeded_time {
        args.push(format!("--scale-down-unneeded-time={unneeded_time}"));
    }

    args
}

fn autoscaler_labels(name: &str) -> BTreeMap<String, String> {
    [
        (String::from("cluster-autoscaler"), name.to_owned()),
        (String::from("app"), String::from("cluster-autoscaler")),
    ]
    .into_iter()
    .collect()
}

fn release_version_annotation(config: &OperatorConfig) -> BTreeMap<String, String> {
    [(
        String::from(RELEASE_VERSION_ANNOTATION),
        config.release_version.clone(),
    )]
    .into_iter()
    .collect()
}
