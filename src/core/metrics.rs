use metrics::{counter, describe_counter, Counter};

pub const RECONCILE_ERRORS_METRIC_NAME: &str = "autoscaler_operator_reconcile_errors_total";

/// Handle to the counters registered at process start.
///
/// Passed around explicitly instead of incrementing through free functions,
/// so components declare which counters they touch.
#[derive(Clone)]
pub struct OperatorMetrics {
    reconcile_errors: Counter,
}

impl OperatorMetrics {
    /// Registers the operator counters with the installed recorder.
    pub fn register() -> Self {
        describe_counter!(
            RECONCILE_ERRORS_METRIC_NAME,
            "Number of errors that occurred while reconciling autoscaler deployments"
        );
        Self {
            reconcile_errors: counter!(RECONCILE_ERRORS_METRIC_NAME),
        }
    }

    pub fn observe_reconcile_error(&self) {
        self.reconcile_errors.increment(1);
    }
}
