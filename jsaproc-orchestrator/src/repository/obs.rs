//! Observation and Task Repository

use jsaproc_core::domain::job::JobId;
use jsaproc_core::domain::obs::{ObsInfo, TaskInfo};
use sqlx::PgPool;

/// Observations attached to a job
pub async fn find_by_job(pool: &PgPool, job_id: JobId) -> Result<Vec<ObsInfo>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ObsRow>(
        r#"
        SELECT obsid, obsidss, utdate, obsnum, instrument, backend, subsys,
               project, survey, sourcename, obstype
        FROM obs
        WHERE job_id = $1
        ORDER BY id
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Names of all tasks
pub async fn task_names(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT taskname FROM task ORDER BY taskname")
        .fetch_all(pool)
        .await
}

/// Find a task by name
pub async fn find_task(pool: &PgPool, task: &str) -> Result<Option<TaskInfo>, sqlx::Error> {
    let row = sqlx::query_as::<_, TaskRow>(
        r#"
        SELECT taskname, etransfer, starlink_dir, version, command_run
        FROM task
        WHERE taskname = $1
        "#,
    )
    .bind(task)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ObsRow {
    obsid: String,
    obsidss: Option<String>,
    utdate: Option<i32>,
    obsnum: Option<i32>,
    instrument: Option<String>,
    backend: Option<String>,
    subsys: Option<String>,
    project: Option<String>,
    survey: Option<String>,
    sourcename: Option<String>,
    obstype: Option<String>,
}

impl From<ObsRow> for ObsInfo {
    fn from(row: ObsRow) -> Self {
        ObsInfo {
            obsid: row.obsid,
            obsidss: row.obsidss,
            utdate: row.utdate,
            obsnum: row.obsnum,
            instrument: row.instrument,
            backend: row.backend,
            subsys: row.subsys,
            project: row.project,
            survey: row.survey,
            sourcename: row.sourcename,
            obstype: row.obstype,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    taskname: String,
    etransfer: Option<bool>,
    starlink_dir: Option<String>,
    version: Option<i32>,
    command_run: Option<String>,
}

impl From<TaskRow> for TaskInfo {
    fn from(row: TaskRow) -> Self {
        TaskInfo {
            taskname: row.taskname,
            etransfer: row.etransfer,
            starlink_dir: row.starlink_dir,
            version: row.version,
            command_run: row.command_run,
        }
    }
}
