use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;

use crate::model::context::ContextData;
use crate::model::error::Error;
use crate::model::spec::ClusterAutoscaler;

/// Error handler invoked when the reconciler fails, with access to both the
/// object that caused the failure and the actual error.
pub fn error_policy(_obj: Arc<ClusterAutoscaler>, error: &Error, ctx: Arc<ContextData>) -> Action {
    log::warn!("Error during reconciliation - {error}");
    ctx.metrics.observe_reconcile_error();
    Action::requeue(Duration::from_secs(60))
}
