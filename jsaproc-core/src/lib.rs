//! JSA Processing Core
//!
//! Core types and abstractions shared by the processing system crates.
//!
//! This crate contains:
//! - Domain types: jobs, parent links, processing and QA log entries
//! - The processing and QA state tables
//! - The error taxonomy used across the workspace
//! - The error classifier used to triage failed jobs
//! - The `JobStore` trait through which the persistent store is consumed

pub mod domain;
pub mod error;
pub mod error_filter;
pub mod qa_state;
pub mod state;
pub mod store;

pub use error::{ProcError, Result};
pub use qa_state::QaState;
pub use state::JobState;
pub use store::JobStore;
