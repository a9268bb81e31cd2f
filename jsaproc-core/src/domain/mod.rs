//! Core domain types
//!
//! These types mirror the rows the persistent store keeps for each job.
//! The store owns all job data; the engine only holds transient copies.

pub mod job;
pub mod log;
pub mod obs;
