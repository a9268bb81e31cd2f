//! Job Repository
//!
//! Handles all database operations on the job, parent and tile tables.

use chrono::Utc;
use jsaproc_core::domain::job::{Job, JobId, JobSummary, NewJob, ParentLink};
use jsaproc_core::store::FindJobs;
use jsaproc_core::{JobState, ProcError, QaState};
use sqlx::{PgPool, Postgres, QueryBuilder};

/// LIKE pattern matching names which end with `suffix` literally
fn suffix_pattern(suffix: &str) -> String {
    let mut pattern = String::with_capacity(suffix.len() + 1);
    pattern.push('%');
    for c in suffix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern
}

/// Find jobs matching a query
pub async fn find(pool: &PgPool, query: &FindJobs) -> Result<Vec<SummaryRow>, sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT job.id, job.tag, job.state, job.location, job.priority, job.task, ",
    );

    match &query.outputs {
        Some(pattern) => {
            builder.push(
                "ARRAY(SELECT o.filename::TEXT FROM output_file AS o \
                 WHERE o.job_id = job.id AND o.filename LIKE ",
            );
            builder.push_bind(suffix_pattern(pattern));
            builder.push(" ESCAPE '\\'");
            builder.push(" ORDER BY o.filename) AS outputs");
        }
        None => {
            builder.push("ARRAY[]::TEXT[] AS outputs");
        }
    }

    builder.push(" FROM job WHERE TRUE");

    if let Some(state) = query.state {
        builder
            .push(" AND job.state = ")
            .push_bind(state.code().to_string());
    }

    if let Some(location) = query.location {
        builder
            .push(" AND job.location = ")
            .push_bind(location.as_str());
    }

    if let Some(task) = &query.task {
        builder.push(" AND job.task = ").push_bind(task.clone());
    }

    let mut order = Vec::new();
    if query.prioritize {
        order.push("job.priority DESC");
    }
    if query.sort {
        order.push("job.id ASC");
    }
    if !order.is_empty() {
        builder.push(" ORDER BY ").push(order.join(", "));
    }

    if let Some(limit) = query.limit {
        builder.push(" LIMIT ").push_bind(limit as i64);
    }

    builder
        .build_query_as::<SummaryRow>()
        .fetch_all(pool)
        .await
}

/// Find a job by ID
pub async fn find_by_id(pool: &PgPool, id: JobId) -> Result<Option<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, tag, state, location, foreign_id, mode, parameters,
               priority, task, qa_state
        FROM job
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Find a job by tag
pub async fn find_by_tag(pool: &PgPool, tag: &str) -> Result<Option<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, tag, state, location, foreign_id, mode, parameters,
               priority, task, qa_state
        FROM job
        WHERE tag = $1
        "#,
    )
    .bind(tag)
    .fetch_optional(pool)
    .await
}

/// Tiles covered by a job
pub async fn tiles(pool: &PgPool, id: JobId) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT tile FROM tile WHERE job_id = $1 ORDER BY tile")
        .bind(id)
        .fetch_all(pool)
        .await
}

/// Create a new job in state UNKNOWN with its parents, inputs and tiles
pub async fn create(pool: &PgPool, job: &NewJob) -> Result<JobId, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let id: JobId = sqlx::query_scalar(
        r#"
        INSERT INTO job (tag, state, location, mode, parameters, priority, task, qa_state)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(&job.tag)
    .bind(JobState::Unknown.code().to_string())
    .bind(job.location.as_str())
    .bind(&job.mode)
    .bind(&job.parameters)
    .bind(job.priority)
    .bind(&job.task)
    .bind(QaState::Unknown.code().to_string())
    .fetch_one(&mut *tx)
    .await?;

    for link in &job.parents {
        sqlx::query("INSERT INTO parent (job_id, parent, filter) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(link.parent)
            .bind(&link.filter)
            .execute(&mut *tx)
            .await?;
    }

    for filename in &job.input_files {
        sqlx::query("INSERT INTO input_file (job_id, filename) VALUES ($1, $2)")
            .bind(id)
            .bind(filename)
            .execute(&mut *tx)
            .await?;
    }

    for tile in job.tilelist.iter().flatten() {
        sqlx::query("INSERT INTO tile (job_id, tile) VALUES ($1, $2)")
            .bind(id)
            .bind(tile)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(id)
}

/// Change a job's state and append a log entry
///
/// The update is a single conditional statement on a locked row, so two
/// callers expecting the same prior state cannot both succeed. Returns the
/// previous state code, or `None` if the job was not in `state_prev` (or
/// does not exist); nothing is written in that case.
pub async fn update_state(
    pool: &PgPool,
    id: JobId,
    new_state: JobState,
    message: &str,
    state_prev: Option<JobState>,
    username: Option<&str>,
) -> Result<Option<String>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let previous: Option<String> = sqlx::query_scalar(
        r#"
        WITH old AS (SELECT id, state FROM job WHERE id = $1 FOR UPDATE)
        UPDATE job SET state = $2
        FROM old
        WHERE job.id = old.id AND ($3::VARCHAR IS NULL OR old.state = $3)
        RETURNING old.state
        "#,
    )
    .bind(id)
    .bind(new_state.code().to_string())
    .bind(state_prev.map(|s| s.code().to_string()))
    .fetch_optional(&mut *tx)
    .await?;

    let Some(previous) = previous else {
        tx.rollback().await?;
        return Ok(None);
    };

    sqlx::query(
        r#"
        INSERT INTO log (job_id, datetime, state_prev, state_new, message, username)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(Utc::now())
    .bind(&previous)
    .bind(new_state.code().to_string())
    .bind(message)
    .bind(username)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Some(previous))
}

/// Parent links of a job
pub async fn parents(pool: &PgPool, id: JobId) -> Result<Vec<ParentRow>, sqlx::Error> {
    sqlx::query_as::<_, ParentRow>(
        "SELECT parent, filter FROM parent WHERE job_id = $1 ORDER BY parent, filter",
    )
    .bind(id)
    .fetch_all(pool)
    .await
}

/// Replace the parent links of a job
pub async fn replace_parents(
    pool: &PgPool,
    id: JobId,
    parents: &[ParentLink],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM parent WHERE job_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    for link in parents {
        sqlx::query("INSERT INTO parent (job_id, parent, filter) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(link.parent)
            .bind(&link.filter)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(())
}

/// Set the QA state column of a job
pub async fn update_qa_state(
    conn: &mut sqlx::PgConnection,
    id: JobId,
    status: QaState,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE job SET qa_state = $1 WHERE id = $2")
        .bind(status.code().to_string())
        .bind(id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
pub struct JobRow {
    id: JobId,
    tag: String,
    state: String,
    location: String,
    foreign_id: Option<String>,
    mode: String,
    parameters: String,
    priority: i32,
    task: String,
    qa_state: String,
}

impl JobRow {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Convert to a job, attaching the tile list if there is one
    pub fn into_job(self, tiles: Vec<i64>) -> Result<Job, ProcError> {
        Ok(Job {
            id: self.id,
            tag: self.tag,
            state: JobState::from_code(&self.state)?,
            location: self.location.parse()?,
            foreign_id: self.foreign_id,
            mode: self.mode,
            parameters: self.parameters,
            priority: self.priority,
            task: self.task,
            qa_state: QaState::from_code(&self.qa_state)?,
            tilelist: if tiles.is_empty() { None } else { Some(tiles) },
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct SummaryRow {
    id: JobId,
    tag: String,
    state: String,
    location: String,
    priority: i32,
    task: String,
    outputs: Vec<String>,
}

impl TryFrom<SummaryRow> for JobSummary {
    type Error = ProcError;

    fn try_from(row: SummaryRow) -> Result<Self, ProcError> {
        Ok(JobSummary {
            id: row.id,
            tag: row.tag,
            state: JobState::from_code(&row.state)?,
            location: row.location.parse()?,
            priority: row.priority,
            task: row.task,
            outputs: row.outputs,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct ParentRow {
    parent: JobId,
    filter: String,
}

impl From<ParentRow> for ParentLink {
    fn from(row: ParentRow) -> Self {
        ParentLink::new(row.parent, row.filter)
    }
}
