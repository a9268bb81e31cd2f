//! Persistent job store interface
//!
//! The orchestration engine consumes the job database through this trait
//! only. Implementations must make `change_state` an atomic
//! compare-and-swap: it is the sole synchronization primitive between
//! independent workers.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::job::{Job, JobId, JobSummary, Location, NewJob, ParentLink};
use crate::domain::log::{LogEntry, QaEntry};
use crate::domain::obs::{ObsInfo, TaskInfo};
use crate::error::Result;
use crate::qa_state::QaState;
use crate::state::JobState;

/// Query parameters for `JobStore::find_jobs`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindJobs {
    pub state: Option<JobState>,
    pub location: Option<Location>,
    pub task: Option<String>,
    /// Highest priority first
    pub prioritize: bool,
    pub limit: Option<usize>,
    /// Stable secondary order by id
    pub sort: bool,
    /// Attach output files whose names end with this pattern
    pub outputs: Option<String>,
}

impl FindJobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: JobState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn prioritize(mut self) -> Self {
        self.prioritize = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn sorted(mut self) -> Self {
        self.sort = true;
        self
    }

    pub fn outputs(mut self, pattern: impl Into<String>) -> Self {
        self.outputs = Some(pattern.into());
        self
    }
}

/// Query parameters for `JobStore::find_error_logs`
#[derive(Debug, Clone, PartialEq)]
pub struct FindErrors {
    pub location: Option<Location>,
    pub task: Option<String>,
    /// Require the latest log entry to have come from this state
    pub state_prev: Option<JobState>,
    pub error_state: JobState,
}

impl Default for FindErrors {
    fn default() -> Self {
        Self {
            location: None,
            task: None,
            state_prev: None,
            error_state: JobState::Error,
        }
    }
}

/// Repository trait for the job database
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Lists jobs matching the query
    async fn find_jobs(&self, query: &FindJobs) -> Result<Vec<JobSummary>>;

    /// Fetches a job by id, failing with `NotFound`
    async fn get_job(&self, id: JobId) -> Result<Job>;

    /// Fetches a job by tag, failing with `NotFound`
    async fn get_job_by_tag(&self, tag: &str) -> Result<Job>;

    /// Creates a job in state UNKNOWN and returns its id
    async fn add_job(&self, job: NewJob) -> Result<JobId>;

    /// Moves a job to `new_state` and appends a log entry
    ///
    /// When `state_prev` is given the change only happens if the job is
    /// currently in that state; otherwise it fails with `NoRows`.
    async fn change_state(
        &self,
        id: JobId,
        new_state: JobState,
        message: &str,
        state_prev: Option<JobState>,
        username: Option<&str>,
    ) -> Result<()>;

    /// Processing log of a job, oldest first
    async fn get_logs(&self, id: JobId) -> Result<Vec<LogEntry>>;

    /// Jobs in the error state with their logs, newest entry first
    async fn find_error_logs(&self, query: &FindErrors) -> Result<BTreeMap<JobId, Vec<LogEntry>>>;

    /// Declared input filenames (no path, no suffix)
    async fn get_input_files(&self, id: JobId) -> Result<Vec<String>>;

    /// Output filenames, failing with `NotFound` if none are recorded
    async fn get_output_files(&self, id: JobId) -> Result<Vec<String>>;

    /// Replaces the recorded output filenames
    async fn set_output_files(&self, id: JobId, files: &[String]) -> Result<()>;

    async fn get_parents(&self, id: JobId) -> Result<Vec<ParentLink>>;

    async fn replace_parents(&self, id: JobId, parents: &[ParentLink]) -> Result<()>;

    /// Appends a QA entry and updates the job's QA state
    async fn add_qa_entry(
        &self,
        id: JobId,
        status: QaState,
        message: &str,
        username: &str,
    ) -> Result<()>;

    /// QA log of a job, oldest first
    async fn get_qas(&self, id: JobId) -> Result<Vec<QaEntry>>;

    async fn get_obs_info(&self, id: JobId) -> Result<Vec<ObsInfo>>;

    async fn get_tasks(&self) -> Result<Vec<String>>;

    /// Fetches a task definition, failing with `NotFound`
    async fn get_task_info(&self, task: &str) -> Result<TaskInfo>;
}
