pub mod deployment_svc;
pub mod reconciler_svc;
pub mod store_svc;
