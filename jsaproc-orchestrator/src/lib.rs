//! JSA Processing Orchestrator
//!
//! Job store implementations and the store-level services of the
//! processing system:
//! - `PgJobStore`, the Postgres store, and `MemoryJobStore`
//! - The dependency reconciler which maintains derived jobs
//! - Operator commands (state and QA changes)
//! - The job list, error summary and QA reports

pub mod db;
pub mod repository;
pub mod service;

pub use repository::{MemoryJobStore, PgJobStore};
