//! JSA Processing Runner
//!
//! The worker side of the processing system. A runner polls the job store
//! and drives jobs through the stages it is configured for:
//! - Fetch: assemble input data (shared tree, input directory, archive)
//! - Run: invoke the reduction pipeline and record its products
//!
//! Architecture:
//! - Configuration: settings from environment or defaults
//! - Directories: per job input, output, scratch and log trees
//! - Tools: wrappers around the Starlink validation and reduction programs
//! - Services: input data assembly
//! - Stages: the state machine steps, each guarded so failures land in ERROR
//! - Scheduler: the polling loop

pub mod config;
pub mod directories;
pub mod jac;
pub mod scheduler;
pub mod service;
pub mod stage;
pub mod tools;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use stage::JobOrchestrator;
