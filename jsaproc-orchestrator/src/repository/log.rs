//! Log Repository
//!
//! Handles all database operations related to the processing and QA logs.

use chrono::{DateTime, Utc};
use jsaproc_core::domain::job::JobId;
use jsaproc_core::domain::log::{LogEntry, QaEntry};
use jsaproc_core::store::FindErrors;
use jsaproc_core::{JobState, ProcError, QaState};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::job;

/// Processing log of a job, oldest first
pub async fn find_by_job(pool: &PgPool, job_id: JobId) -> Result<Vec<LogRow>, sqlx::Error> {
    sqlx::query_as::<_, LogRow>(
        r#"
        SELECT job_id, datetime, state_prev, state_new, message, username
        FROM log
        WHERE job_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await
}

/// Log entries of every job in the error state, grouped by job, newest first
pub async fn find_errors(pool: &PgPool, query: &FindErrors) -> Result<Vec<LogRow>, sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT log.job_id, log.datetime, log.state_prev, log.state_new, \
         log.message, log.username \
         FROM job JOIN log ON log.job_id = job.id WHERE job.state = ",
    );
    builder.push_bind(query.error_state.code().to_string());

    if let Some(location) = query.location {
        builder
            .push(" AND job.location = ")
            .push_bind(location.as_str());
    }

    if let Some(task) = &query.task {
        builder.push(" AND job.task = ").push_bind(task.clone());
    }

    builder.push(" ORDER BY log.job_id ASC, log.id DESC");

    builder.build_query_as::<LogRow>().fetch_all(pool).await
}

/// QA log of a job, oldest first
pub async fn find_qa_by_job(pool: &PgPool, job_id: JobId) -> Result<Vec<QaRow>, sqlx::Error> {
    sqlx::query_as::<_, QaRow>(
        r#"
        SELECT datetime, status, message, username
        FROM qa
        WHERE job_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await
}

/// Append a QA entry and update the job's QA state
///
/// Returns false if the job does not exist.
pub async fn create_qa(
    pool: &PgPool,
    job_id: JobId,
    status: QaState,
    message: &str,
    username: &str,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    if job::update_qa_state(&mut tx, job_id, status).await? == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO qa (job_id, datetime, status, message, username)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(job_id)
    .bind(Utc::now())
    .bind(status.code().to_string())
    .bind(message)
    .bind(username)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(true)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
pub struct LogRow {
    pub job_id: JobId,
    datetime: DateTime<Utc>,
    state_prev: String,
    state_new: String,
    message: String,
    username: Option<String>,
}

impl TryFrom<LogRow> for LogEntry {
    type Error = ProcError;

    fn try_from(row: LogRow) -> Result<Self, ProcError> {
        Ok(LogEntry {
            timestamp: row.datetime,
            state_prev: JobState::from_code(&row.state_prev)?,
            state_new: JobState::from_code(&row.state_new)?,
            message: row.message,
            username: row.username,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct QaRow {
    datetime: DateTime<Utc>,
    status: String,
    message: String,
    username: String,
}

impl TryFrom<QaRow> for QaEntry {
    type Error = ProcError;

    fn try_from(row: QaRow) -> Result<Self, ProcError> {
        Ok(QaEntry {
            timestamp: row.datetime,
            status: QaState::from_code(&row.status)?,
            message: row.message,
            username: Some(row.username),
        })
    }
}
