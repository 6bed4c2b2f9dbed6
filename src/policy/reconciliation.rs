use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::Resource;

use crate::model::context::ContextData;
use crate::model::error::Error;
use crate::model::event::{ResourceEvent, WatchedResource};
use crate::model::spec::ClusterAutoscaler;
use crate::service::reconciler_svc::AutoscalerReconciler;

/// Entry point invoked by the controller runtime on every observed change.
pub async fn reconcile(autoscaler: Arc<ClusterAutoscaler>, context: Arc<ContextData>) -> Result<Action, Error> {
    let deleted = autoscaler.meta().deletion_timestamp.is_some();
    let event = ResourceEvent {
        resource: WatchedResource::ClusterAutoscaler(autoscaler),
        deleted,
    };

    AutoscalerReconciler::new(context).handle(event).await?;

    Ok(Action::requeue(Duration::from_secs(300)))
}
