//! Failure handling shared by the stages

use std::future::Future;

use jsaproc_core::domain::job::JobId;
use jsaproc_core::{JobState, JobStore, Result};
use tracing::error;

/// Run a stage body for a job already claimed by this worker
///
/// If the body fails, its message is recorded against the job with a move
/// to ERROR. Returns whether the body succeeded; only a failure to record
/// the error is returned as `Err`.
pub async fn guarded<F>(
    store: &dyn JobStore,
    job_id: JobId,
    username: Option<&str>,
    body: F,
) -> Result<bool>
where
    F: Future<Output = Result<()>>,
{
    match body.await {
        Ok(()) => Ok(true),
        Err(err) => {
            let message = err.to_string();
            error!("Error processing job {}: {}", job_id, message);
            store
                .change_state(job_id, JobState::Error, &message, None, username)
                .await?;
            Ok(false)
        }
    }
}
