//! Scheduler layer for the runner
//!
//! Polls the job store on an interval and runs each configured stage once
//! per tick.

pub mod poller;

pub use poller::JobPoller;
