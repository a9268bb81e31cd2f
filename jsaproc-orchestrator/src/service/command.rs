//! Operator Commands
//!
//! State and QA changes requested through the web layer. Codes arrive as
//! strings and are validated before any job is touched.

use jsaproc_core::domain::job::JobId;
use jsaproc_core::{JobState, JobStore, ProcError, QaState, Result};

/// Move each job to `new_state`, expecting it to be in `state_prev`
///
/// Without `state_prev` the change is forced. Stops at the first job which
/// cannot be changed.
pub async fn change_state(
    store: &dyn JobStore,
    job_ids: &[JobId],
    new_state: &str,
    state_prev: Option<&str>,
    message: &str,
    username: Option<&str>,
) -> Result<()> {
    let new_state = JobState::from_code(new_state)?;
    let state_prev = state_prev.map(JobState::from_code).transpose()?;

    if message.trim().is_empty() {
        return Err(ProcError::InvalidArgument(
            "You must provide a message to change state".to_string(),
        ));
    }

    for job_id in job_ids {
        store
            .change_state(*job_id, new_state, message, state_prev, username)
            .await?;
        tracing::info!("Job {} changed to {} by {:?}", job_id, new_state, username);
    }

    Ok(())
}

/// Append a QA entry to each job
pub async fn change_qa(
    store: &dyn JobStore,
    job_ids: &[JobId],
    qa_state: &str,
    message: &str,
    username: &str,
) -> Result<()> {
    let qa_state = QaState::from_code(qa_state)?;

    for job_id in job_ids {
        store
            .add_qa_entry(*job_id, qa_state, message, username)
            .await?;
    }

    Ok(())
}
