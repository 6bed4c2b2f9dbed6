use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::model::context::ContextData;
use crate::service::reconciler_svc::AutoscalerReconciler;

pub async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness follows the managed deployment: ready only while it is running
/// and carries the configured release version.
pub async fn ready_handler(State(context): State<Arc<ContextData>>) -> impl IntoResponse {
    match AutoscalerReconciler::new(context).available_and_updated().await {
        Ok(true) => StatusCode::OK,
        Ok(false) => StatusCode::SERVICE_UNAVAILABLE,
        Err(err) => {
            log::warn!("Error checking autoscaler availability - {err}");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
