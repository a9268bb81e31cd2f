//! Dependency Reconciler
//!
//! Keeps a derived job (one built from the outputs of parent jobs)
//! consistent with its desired parent set: creating it, updating its parents
//! or marking it as deleted.

use jsaproc_core::domain::job::{Job, JobId, NewJob, ParentSet};
use jsaproc_core::{JobState, JobStore, ProcError, Result};
use tracing::{debug, info, warn};

/// Which mutations a reconciliation may perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    pub allow_add: bool,
    pub allow_upd: bool,
    pub allow_del: bool,
    /// Log the decision without touching the store
    pub dry_run: bool,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            allow_add: true,
            allow_upd: true,
            allow_del: true,
            dry_run: false,
        }
    }
}

impl ReconcilePolicy {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }
}

/// Add, update or delete the job described by `desired`
///
/// The job is identified by its tag. `desired.parents` is the full desired
/// parent/filter set, compared with the stored set without regard to order.
///
/// # Returns
/// The id of the affected job, or `None` if there is no job (nothing to
/// delete, or a dry-run creation).
pub async fn add_upd_del_job(
    store: &dyn JobStore,
    desired: NewJob,
    policy: ReconcilePolicy,
    description: Option<&str>,
) -> Result<Option<JobId>> {
    // TODO: compare stored recipe parameters with desired.parameters and
    // reset the job to UNKNOWN when they differ.
    let description = description
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} job tagged {}", desired.task, desired.tag));

    match store.get_task_info(&desired.task).await {
        Ok(_) => {}
        Err(err) if err.is_not_found() => {
            warn!("Task {} is not in the database", desired.task);
        }
        Err(err) => return Err(err),
    }

    let existing = match store.get_job_by_tag(&desired.tag).await {
        Ok(job) => {
            debug!("{} is in already-existing job {}", description, job.id);
            Some(job)
        }
        Err(err) if err.is_not_found() => {
            debug!("{} is not already in database", description);
            None
        }
        Err(err) => return Err(err),
    };

    let parents: ParentSet = desired.parents.iter().cloned().collect();

    match existing {
        None if parents.is_empty() => Ok(None),
        Some(job) if parents.is_empty() => delete_job(store, &job, policy, &description).await,
        Some(job) => update_job(store, &job, &parents, policy, &description).await,
        None => {
            let desired = NewJob {
                parents: parents.to_vec(),
                ..desired
            };
            add_job(store, desired, policy, &description).await
        }
    }
}

async fn delete_job(
    store: &dyn JobStore,
    job: &Job,
    policy: ReconcilePolicy,
    description: &str,
) -> Result<Option<JobId>> {
    if !policy.allow_del {
        return Err(ProcError::PermissionDenied(format!(
            "Cannot delete {}. It already exists in job {} and deleting is turned off",
            description, job.id
        )));
    }

    if job.state == JobState::Deleted {
        debug!("Job {} for {} is already deleted", job.id, description);
        return Ok(Some(job.id));
    }

    if policy.dry_run {
        info!(
            "DRYRUN: job {} for {} would be marked as DELETED",
            job.id, description
        );
        return Ok(Some(job.id));
    }

    store
        .change_state(
            job.id,
            JobState::Deleted,
            &format!(
                "No valid parent jobs found for {}; marking job as DELETED",
                description
            ),
            None,
            None,
        )
        .await?;
    info!(
        "Job {} for {} marked as deleted (no valid input jobs)",
        job.id, description
    );

    Ok(Some(job.id))
}

async fn update_job(
    store: &dyn JobStore,
    job: &Job,
    parents: &ParentSet,
    policy: ReconcilePolicy,
    description: &str,
) -> Result<Option<JobId>> {
    let old_parents: ParentSet = store.get_parents(job.id).await?.into_iter().collect();

    if old_parents == *parents {
        debug!(
            "Parent/filter list for job {} ({}) is unchanged",
            job.id, description
        );
        return Ok(Some(job.id));
    }

    debug!(
        "Parent/filter list for job {} has changed from previous state",
        job.id
    );

    if !policy.allow_upd {
        return Err(ProcError::PermissionDenied(format!(
            "Cannot update {}. It already exists in job {} and updating is turned off",
            description, job.id
        )));
    }

    debug!(
        "Parent jobs {:?} have been removed from job {}",
        old_parents.difference(parents),
        job.id
    );
    debug!(
        "Parent jobs {:?} have been added to job {}",
        parents.difference(&old_parents),
        job.id
    );

    if policy.dry_run {
        info!(
            "DRYRUN: job {} ({}) would have been updated and status changed",
            job.id, description
        );
        return Ok(Some(job.id));
    }

    store.replace_parents(job.id, &parents.to_vec()).await?;
    store
        .change_state(
            job.id,
            JobState::Unknown,
            "Parent job list has been updated; job reset to UNKNOWN",
            None,
            None,
        )
        .await?;
    info!(
        "Job {} ({}) updated and reset to UNKNOWN",
        job.id, description
    );

    Ok(Some(job.id))
}

async fn add_job(
    store: &dyn JobStore,
    desired: NewJob,
    policy: ReconcilePolicy,
    description: &str,
) -> Result<Option<JobId>> {
    if !policy.allow_add {
        return Err(ProcError::PermissionDenied(format!(
            "Cannot add {}. It doesn't already exist and adding is turned off",
            description
        )));
    }

    if policy.dry_run {
        info!("DRYRUN: {} would have been created", description);
        return Ok(None);
    }

    let id = store.add_job(desired).await?;
    info!("{} has been created as job {}", description, id);

    Ok(Some(id))
}
