use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create job table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job (
            id BIGSERIAL PRIMARY KEY,
            tag VARCHAR(80) NOT NULL UNIQUE,
            state VARCHAR(1) NOT NULL DEFAULT '?',
            location VARCHAR(10) NOT NULL,
            foreign_id VARCHAR(80),
            mode VARCHAR(10) NOT NULL,
            parameters TEXT NOT NULL DEFAULT '',
            priority INTEGER NOT NULL DEFAULT 0,
            task VARCHAR(80) NOT NULL,
            qa_state VARCHAR(1) NOT NULL DEFAULT '?'
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create parent table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS parent (
            job_id BIGINT NOT NULL REFERENCES job(id),
            parent BIGINT NOT NULL REFERENCES job(id),
            filter VARCHAR(80) NOT NULL DEFAULT '',
            PRIMARY KEY (job_id, parent, filter)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create file tables
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS input_file (
            id BIGSERIAL PRIMARY KEY,
            job_id BIGINT NOT NULL REFERENCES job(id),
            filename VARCHAR(80) NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS output_file (
            id BIGSERIAL PRIMARY KEY,
            job_id BIGINT NOT NULL REFERENCES job(id),
            filename VARCHAR(150) NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create log tables
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS log (
            id BIGSERIAL PRIMARY KEY,
            job_id BIGINT NOT NULL REFERENCES job(id),
            datetime TIMESTAMPTZ NOT NULL,
            state_prev VARCHAR(1) NOT NULL,
            state_new VARCHAR(1) NOT NULL,
            message TEXT NOT NULL,
            username VARCHAR(80)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS qa (
            id BIGSERIAL PRIMARY KEY,
            job_id BIGINT NOT NULL REFERENCES job(id),
            datetime TIMESTAMPTZ NOT NULL,
            status VARCHAR(1) NOT NULL,
            message TEXT NOT NULL,
            username VARCHAR(80) NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create observation and task tables
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS obs (
            id BIGSERIAL PRIMARY KEY,
            job_id BIGINT NOT NULL REFERENCES job(id),
            obsid VARCHAR(80) NOT NULL,
            obsidss VARCHAR(80),
            utdate INTEGER,
            obsnum INTEGER,
            instrument VARCHAR(80),
            backend VARCHAR(80),
            subsys VARCHAR(80),
            project VARCHAR(80),
            survey VARCHAR(80),
            sourcename VARCHAR(80),
            obstype VARCHAR(80)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS task (
            id SERIAL PRIMARY KEY,
            taskname VARCHAR(80) NOT NULL UNIQUE,
            etransfer BOOLEAN,
            starlink_dir VARCHAR(255),
            version INTEGER,
            command_run VARCHAR(255)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tile (
            job_id BIGINT NOT NULL REFERENCES job(id),
            tile BIGINT NOT NULL,
            PRIMARY KEY (job_id, tile)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_state ON job(state, location)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_log_job_id ON log(job_id, id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_qa_job_id ON qa(job_id, id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_output_file_job_id ON output_file(job_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
