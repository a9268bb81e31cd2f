//! Service Module
//!
//! Business logic on top of the `JobStore` trait.

pub mod command;
pub mod reconcile;
pub mod report;

// Re-export for convenience
pub use command as command_service;
pub use reconcile::{ReconcilePolicy, add_upd_del_job};
pub use report as report_service;
