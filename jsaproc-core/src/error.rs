//! Error types for the processing system

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::job::JobId;
use crate::state::JobState;

/// Result type alias for processing operations
pub type Result<T> = std::result::Result<T, ProcError>;

/// Errors that can occur while orchestrating jobs
#[derive(Debug, Error)]
pub enum ProcError {
    /// State code not present in the state table
    #[error("Unknown state code {0}")]
    UnknownState(String),

    /// QA state code not present in the QA table
    #[error("Unknown QA state code {0}")]
    UnknownQaState(String),

    /// Error filter name not recognised
    #[error("Unknown filtering option \"{0}\"")]
    InvalidFilter(String),

    /// A required row (job, task, output list) was not found in the store
    #[error("Not found: {0}")]
    NotFound(String),

    /// Compare-and-swap on the job state did not match the expected state
    ///
    /// Under contention this means another worker moved the job first.
    #[error("Job {job_id} was not in the expected state {expected:?}")]
    NoRows {
        job_id: JobId,
        expected: Option<JobState>,
    },

    /// Operation disallowed by the caller's policy flags
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Downloaded file failed format validation and was quarantined
    #[error("Downloaded file {} fails hds validation. Moved to {}", .path.display(), .moved_to.display())]
    Validation { path: PathBuf, moved_to: PathBuf },

    /// Input file is not present in the shared archive tree
    #[error("File {0} is not present at JAC")]
    NotAtJac(String),

    /// Remote archive call failed or returned a non-success status
    #[error("Remote service error: {0}")]
    Remote(String),

    /// External tool exited with a non-zero status
    #[error("{program} exited with non zero status. Retcode was {exit_code}; job_id is {job_id}. stdout/stderr are written in {}", .log.display())]
    ExternalProcess {
        program: String,
        exit_code: i32,
        job_id: JobId,
        log: PathBuf,
    },

    /// Caller supplied an invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persistent store failure
    #[error("Store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ProcError {
    /// Wrap a store backend error
    pub fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Store(Box::new(err))
    }

    /// Check if this error is a compare-and-swap mismatch
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::NoRows { .. })
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
