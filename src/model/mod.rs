pub mod context;
pub mod error;
pub mod event;
pub mod spec;
