use std::sync::Arc;

use crate::model::spec::ClusterAutoscaler;

/// Change notification handed to the reconciler.
///
/// Deletion is a flag rather than a separate event kind: deleted resources
/// need no action here because the generated objects carry owner references
/// and are collected by the cluster.
#[derive(Clone)]
pub struct ResourceEvent {
    pub resource: WatchedResource,
    pub deleted: bool,
}

/// Closed set of object kinds the operator reacts to.
#[derive(Clone)]
pub enum WatchedResource {
    ClusterAutoscaler(Arc<ClusterAutoscaler>),
}
