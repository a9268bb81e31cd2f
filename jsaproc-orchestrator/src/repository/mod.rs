//! Repository Module
//!
//! Data access layer for the job store.
//! The Postgres repositories handle one group of tables each; `PgJobStore`
//! and `MemoryJobStore` expose them through the `JobStore` trait.

pub mod file;
pub mod job;
pub mod log;
pub mod memory;
pub mod obs;
pub mod store;

// Re-export for convenience
pub use memory::MemoryJobStore;
pub use store::PgJobStore;
