//! Job poller
//!
//! Every tick runs the configured stages in order, one job per stage. A
//! stage which fails is logged and the next stage still runs.

use std::sync::Arc;

use tokio::time;
use tracing::{debug, error, info};

use crate::config::{Config, Stage};
use crate::stage::JobOrchestrator;

/// Job poller that continuously polls for and processes jobs
pub struct JobPoller {
    config: Config,
    orchestrator: Arc<JobOrchestrator>,
}

impl JobPoller {
    pub fn new(config: Config, orchestrator: Arc<JobOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    /// Starts the polling loop
    pub async fn run(&self) -> anyhow::Result<()> {
        info!(
            "Starting job poller (interval: {:?}, stages: {:?})",
            self.config.poll_interval, self.config.stages
        );

        let mut interval = time::interval(self.config.poll_interval);

        loop {
            interval.tick().await;

            debug!("Polling for jobs");

            let handled = self.poll_once().await;
            if handled > 0 {
                info!("Handled {} job(s) this cycle", handled);
            }
        }
    }

    /// Performs a single poll cycle, returning the number of jobs attempted
    pub async fn poll_once(&self) -> usize {
        let mut handled = 0;

        for stage in &self.config.stages {
            let result = match stage {
                Stage::Fetch => self.orchestrator.fetch_next().await,
                Stage::Run => self.orchestrator.run_next().await,
            };

            match result {
                Ok(Some(_)) => handled += 1,
                Ok(None) => {}
                Err(e) => error!("Error during {} stage: {:#}", stage, e),
            }
        }

        handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::INPUT_LIST_NAME;
    use crate::testing::{Harness, new_job};
    use jsaproc_core::{JobState, JobStore};

    fn config(stages: Vec<Stage>) -> Config {
        let mut config = Config::default();
        config.stages = stages;
        config
    }

    #[tokio::test]
    async fn test_one_tick_fetches_then_runs() {
        let h = Harness::new(b"HDS");
        h.put_in_tree("s4a20200101_00001_0001");
        let id = h
            .store
            .add_job(new_job("tick", 0, &["s4a20200101_00001_0001"]))
            .await
            .unwrap();
        h.store
            .change_state(id, JobState::Missing, "queued", None, None)
            .await
            .unwrap();

        let store = h.store.clone();
        let Harness {
            _root,
            orchestrator,
            ..
        } = h;
        let poller = JobPoller::new(
            config(vec![Stage::Fetch, Stage::Run]),
            Arc::new(orchestrator),
        );

        assert_eq!(poller.poll_once().await, 2);
        assert_eq!(store.get_job(id).await.unwrap().state, JobState::Processed);
        assert_eq!(poller.poll_once().await, 0);
    }

    #[tokio::test]
    async fn test_only_configured_stages_run() {
        let h = Harness::new(b"HDS");
        let id = h.store.add_job(new_job("fetch-only", 0, &[])).await.unwrap();
        h.store
            .change_state(id, JobState::Missing, "queued", None, None)
            .await
            .unwrap();

        let store = h.store.clone();
        let list = h.directories.input_dir(id).join(INPUT_LIST_NAME);
        let Harness {
            _root,
            orchestrator,
            ..
        } = h;
        let poller = JobPoller::new(config(vec![Stage::Fetch]), Arc::new(orchestrator));

        assert_eq!(poller.poll_once().await, 1);
        assert_eq!(store.get_job(id).await.unwrap().state, JobState::Waiting);
        assert!(list.is_file());
    }
}
