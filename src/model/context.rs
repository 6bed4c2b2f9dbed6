use std::sync::Arc;

use crate::core::config::OperatorConfig;
use crate::core::metrics::OperatorMetrics;
use crate::service::store_svc::KubeStore;

pub struct ContextData {
    /// Object store holding the watched resources and the managed deployments.
    pub store: Arc<dyn KubeStore>,
    /// Process-wide settings, read-only after startup.
    pub config: OperatorConfig,
    /// Handle to the counters registered at process start.
    pub metrics: OperatorMetrics,
}
