pub mod error;
pub mod reconciliation;
