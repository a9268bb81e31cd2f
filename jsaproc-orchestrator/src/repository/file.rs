//! File Repository
//!
//! Handles the input and output file lists of jobs.

use jsaproc_core::domain::job::JobId;
use sqlx::PgPool;

/// Declared input filenames of a job
pub async fn input_files(pool: &PgPool, job_id: JobId) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT filename FROM input_file WHERE job_id = $1 ORDER BY id")
        .bind(job_id)
        .fetch_all(pool)
        .await
}

/// Recorded output filenames of a job
pub async fn output_files(pool: &PgPool, job_id: JobId) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT filename FROM output_file WHERE job_id = $1 ORDER BY id")
        .bind(job_id)
        .fetch_all(pool)
        .await
}

/// Replace the output filenames of a job
pub async fn replace_output_files(
    pool: &PgPool,
    job_id: JobId,
    files: &[String],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM output_file WHERE job_id = $1")
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

    for filename in files {
        sqlx::query("INSERT INTO output_file (job_id, filename) VALUES ($1, $2)")
            .bind(job_id)
            .bind(filename)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(())
}
