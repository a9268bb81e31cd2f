//! JSA Processing Runner
//!
//! Connects to the job store, wires the archive clients and Starlink tools
//! into the stages, and polls for work until stopped.

use std::sync::Arc;

use anyhow::{Context, Result};
use jsaproc_client::ArchiveClient;
use jsaproc_orchestrator::{PgJobStore, db};
use jsaproc_runner::config::Config;
use jsaproc_runner::directories::JobDirectories;
use jsaproc_runner::jac::JacDataTree;
use jsaproc_runner::scheduler::JobPoller;
use jsaproc_runner::service::InputAssembler;
use jsaproc_runner::stage::JobOrchestrator;
use jsaproc_runner::tools::{HdsTraceValidator, Jsawrapdr};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jsaproc_runner=info,jsaproc_orchestrator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting JSA processing runner");

    let config = load_config()?;
    info!(
        "Loaded configuration: runner_id={}, work_root={}, stages={:?}",
        config.runner_id,
        config.work_root.display(),
        config.stages
    );

    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to the job store")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    info!("Job store ready");

    let archive = match &config.archive_cert {
        Some(cert) => {
            info!("Using archive certificate {}", cert.display());
            ArchiveClient::with_certificate(config.archive_url.clone(), cert)
                .context("Failed to load archive certificate")?
        }
        None => ArchiveClient::new(config.archive_url.clone()),
    };

    let directories = JobDirectories::new(&config.work_root);
    let assembler = InputAssembler::new(
        JacDataTree::new(config.data_root.clone()),
        directories.clone(),
        Arc::new(archive),
        Arc::new(HdsTraceValidator::new(config.starlink_dir.clone())),
    );
    let reducer = Jsawrapdr::new(config.starlink_dir.clone(), directories)
        .with_cleanup(config.cleanup.clone())
        .with_persist(config.persist);

    let orchestrator = JobOrchestrator::new(
        Arc::new(PgJobStore::new(pool)),
        assembler,
        Arc::new(reducer),
        config.runner_id.clone(),
    );

    let poller = JobPoller::new(config, Arc::new(orchestrator));

    info!("Starting job polling loop");
    if let Err(e) = poller.run().await {
        error!("Poller error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Loads configuration from environment variables, failing on invalid values
fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Invalid runner configuration")?;
    config.validate()?;
    Ok(config)
}
