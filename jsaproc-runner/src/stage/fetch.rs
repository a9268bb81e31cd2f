//! Fetch stage: MISSING -> FETCHING -> WAITING

use jsaproc_core::domain::job::{JobId, Location};
use jsaproc_core::store::FindJobs;
use jsaproc_core::{JobState, Result};
use tracing::{debug, error, info, warn};

use super::JobOrchestrator;
use super::guard::guarded;

impl JobOrchestrator {
    /// Fetch data for the highest priority MISSING job at JAC
    ///
    /// Returns the id of the job attempted, if there was one.
    pub async fn fetch_next(&self) -> Result<Option<JobId>> {
        debug!("Looking for a job for which to fetch data");

        let query = FindJobs::new()
            .state(JobState::Missing)
            .location(Location::Jac)
            .prioritize()
            .limit(1)
            .sorted();

        let Some(job) = self.store.find_jobs(&query).await?.into_iter().next() else {
            warn!("Did not find a job to fetch");
            return Ok(None);
        };

        self.fetch_job(job.id, false).await?;
        Ok(Some(job.id))
    }

    /// Assemble the input data of one job
    ///
    /// The job must be MISSING unless `force` is set. If another worker has
    /// already claimed it the call returns quietly and leaves the job alone.
    pub async fn fetch_job(&self, job_id: JobId, force: bool) -> Result<()> {
        info!("About to fetch data for job {}", job_id);

        let state_prev = (!force).then_some(JobState::Missing);
        match self
            .store
            .change_state(
                job_id,
                JobState::Fetching,
                "Data is being assembled",
                state_prev,
                self.username(),
            )
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_no_rows() => {
                error!("Job {} cannot be fetched because it is not missing", job_id);
                return Ok(());
            }
            Err(err) => return Err(err),
        }

        let done = guarded(self.store(), job_id, self.username(), async {
            let input_files = self.store.get_input_files(job_id).await?;
            let list = self.assembler.assemble(job_id, &input_files).await?;
            debug!("Input list for job {} written to {}", job_id, list.display());

            self.store
                .change_state(
                    job_id,
                    JobState::Waiting,
                    "Data has been assembled for job and job can now be executed",
                    Some(JobState::Fetching),
                    self.username(),
                )
                .await
        })
        .await?;

        if done {
            info!("Done fetching data for job {}", job_id);
        }

        Ok(())
    }
}
