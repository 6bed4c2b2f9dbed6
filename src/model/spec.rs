use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Spec object for the managed autoscaler
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[kube(group = "autoscaling.d71.dev", version = "v1alpha1", kind = "ClusterAutoscaler", namespaced)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAutoscalerSpec {
    /// Priority below which pods may be expended to make room for others.
    pub pod_priority_threshold: Option<i32>,
    /// Seconds the autoscaler waits for pod termination on scale-down.
    pub max_pod_grace_period: Option<i32>,
    pub resource_limits: Option<ResourceLimits>,
    pub scale_down: Option<ScaleDownConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLimits {
    pub max_nodes_total: Option<i32>,
    pub cores: Option<ResourceRange>,
    pub memory: Option<ResourceRange>,
    pub gpus: Option<Vec<GPULimit>>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct ResourceRange {
    pub min: i32,
    pub max: i32,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct GPULimit {
    #[serde(rename = "type")]
    pub gpu_type: String,
    pub min: i32,
    pub max: i32,
}

/// Scale-down behavior. Delay and time fields hold duration strings like "10s" or "5m".
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScaleDownConfig {
    pub enabled: bool,
    pub delay_after_add: Option<String>,
    pub delay_after_delete: Option<String>,
    pub delay_after_failure: Option<String>,
    pub unneeded_time: Option<String>,
}
