//! Postgres-backed job store

use std::collections::BTreeMap;

use async_trait::async_trait;
use jsaproc_core::domain::job::{Job, JobId, JobSummary, NewJob, ParentLink};
use jsaproc_core::domain::log::{LogEntry, QaEntry};
use jsaproc_core::domain::obs::{ObsInfo, TaskInfo};
use jsaproc_core::store::{FindErrors, FindJobs};
use jsaproc_core::{JobState, JobStore, ProcError, QaState, Result};
use sqlx::PgPool;
use tracing::debug;

use super::{file, job, log, obs};

/// `JobStore` implementation on a Postgres connection pool
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_job(&self, row: job::JobRow) -> Result<Job> {
        let tiles = job::tiles(&self.pool, row.id())
            .await
            .map_err(db_error)?;
        row.into_job(tiles)
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn find_jobs(&self, query: &FindJobs) -> Result<Vec<JobSummary>> {
        job::find(&self.pool, query)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(JobSummary::try_from)
            .collect()
    }

    async fn get_job(&self, id: JobId) -> Result<Job> {
        let row = job::find_by_id(&self.pool, id)
            .await
            .map_err(db_error)?
            .ok_or_else(|| ProcError::NotFound(format!("job {}", id)))?;
        self.load_job(row).await
    }

    async fn get_job_by_tag(&self, tag: &str) -> Result<Job> {
        let row = job::find_by_tag(&self.pool, tag)
            .await
            .map_err(db_error)?
            .ok_or_else(|| ProcError::NotFound(format!("job tagged {}", tag)))?;
        self.load_job(row).await
    }

    async fn add_job(&self, new_job: NewJob) -> Result<JobId> {
        let id = job::create(&self.pool, &new_job).await.map_err(db_error)?;
        debug!("Created job {} tagged {}", id, new_job.tag);
        Ok(id)
    }

    async fn change_state(
        &self,
        id: JobId,
        new_state: JobState,
        message: &str,
        state_prev: Option<JobState>,
        username: Option<&str>,
    ) -> Result<()> {
        let previous = job::update_state(&self.pool, id, new_state, message, state_prev, username)
            .await
            .map_err(db_error)?;

        match previous {
            Some(_) => Ok(()),
            None => Err(ProcError::NoRows {
                job_id: id,
                expected: state_prev,
            }),
        }
    }

    async fn get_logs(&self, id: JobId) -> Result<Vec<LogEntry>> {
        log::find_by_job(&self.pool, id)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(LogEntry::try_from)
            .collect()
    }

    async fn find_error_logs(&self, query: &FindErrors) -> Result<BTreeMap<JobId, Vec<LogEntry>>> {
        let rows = log::find_errors(&self.pool, query)
            .await
            .map_err(db_error)?;

        let mut result: BTreeMap<JobId, Vec<LogEntry>> = BTreeMap::new();
        for row in rows {
            let job_id = row.job_id;
            result
                .entry(job_id)
                .or_default()
                .push(LogEntry::try_from(row)?);
        }

        if let Some(state_prev) = query.state_prev {
            result.retain(|_, logs| logs.first().is_some_and(|l| l.state_prev == state_prev));
        }

        Ok(result)
    }

    async fn get_input_files(&self, id: JobId) -> Result<Vec<String>> {
        file::input_files(&self.pool, id).await.map_err(db_error)
    }

    async fn get_output_files(&self, id: JobId) -> Result<Vec<String>> {
        let files = file::output_files(&self.pool, id)
            .await
            .map_err(db_error)?;

        if files.is_empty() {
            return Err(ProcError::NotFound(format!("output files of job {}", id)));
        }

        Ok(files)
    }

    async fn set_output_files(&self, id: JobId, files: &[String]) -> Result<()> {
        file::replace_output_files(&self.pool, id, files)
            .await
            .map_err(db_error)
    }

    async fn get_parents(&self, id: JobId) -> Result<Vec<ParentLink>> {
        Ok(job::parents(&self.pool, id)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(ParentLink::from)
            .collect())
    }

    async fn replace_parents(&self, id: JobId, parents: &[ParentLink]) -> Result<()> {
        job::replace_parents(&self.pool, id, parents)
            .await
            .map_err(db_error)
    }

    async fn add_qa_entry(
        &self,
        id: JobId,
        status: QaState,
        message: &str,
        username: &str,
    ) -> Result<()> {
        let created = log::create_qa(&self.pool, id, status, message, username)
            .await
            .map_err(db_error)?;

        if !created {
            return Err(ProcError::NotFound(format!("job {}", id)));
        }

        Ok(())
    }

    async fn get_qas(&self, id: JobId) -> Result<Vec<QaEntry>> {
        log::find_qa_by_job(&self.pool, id)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(QaEntry::try_from)
            .collect()
    }

    async fn get_obs_info(&self, id: JobId) -> Result<Vec<ObsInfo>> {
        obs::find_by_job(&self.pool, id).await.map_err(db_error)
    }

    async fn get_tasks(&self) -> Result<Vec<String>> {
        obs::task_names(&self.pool).await.map_err(db_error)
    }

    async fn get_task_info(&self, task: &str) -> Result<TaskInfo> {
        obs::find_task(&self.pool, task)
            .await
            .map_err(db_error)?
            .ok_or_else(|| ProcError::NotFound(format!("task {}", task)))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn db_error(err: sqlx::Error) -> ProcError {
    match err {
        sqlx::Error::RowNotFound => ProcError::NotFound("row".to_string()),
        other => ProcError::store(other),
    }
}
