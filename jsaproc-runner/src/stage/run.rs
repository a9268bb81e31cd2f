//! Run stage: WAITING -> RUNNING -> PROCESSED

use jsaproc_core::domain::job::{JobId, Location};
use jsaproc_core::store::FindJobs;
use jsaproc_core::{JobState, ProcError, Result};
use tracing::{debug, error, info, warn};

use super::JobOrchestrator;
use super::guard::guarded;
use crate::service::list_output_files;
use crate::tools::ReductionRequest;

impl JobOrchestrator {
    /// Run the highest priority WAITING job at JAC
    pub async fn run_next(&self) -> Result<Option<JobId>> {
        debug!("Looking for a job to run");

        let query = FindJobs::new()
            .state(JobState::Waiting)
            .location(Location::Jac)
            .prioritize()
            .limit(1)
            .sorted();

        let Some(job) = self.store.find_jobs(&query).await?.into_iter().next() else {
            warn!("Did not find a job to run");
            return Ok(None);
        };

        self.run_job(job.id).await?;
        Ok(Some(job.id))
    }

    /// Reduce one job whose data has been assembled
    pub async fn run_job(&self, job_id: JobId) -> Result<()> {
        info!("About to run job {}", job_id);

        match self
            .store
            .change_state(
                job_id,
                JobState::Running,
                "Job is about to be run",
                Some(JobState::Waiting),
                self.username(),
            )
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_no_rows() => {
                error!("Job {} cannot be run because it is not waiting", job_id);
                return Ok(());
            }
            Err(err) => return Err(err),
        }

        let done = guarded(self.store(), job_id, self.username(), async {
            let job = self.store.get_job(job_id).await?;

            let manifest = self.assembler.input_list_path(job_id);
            if !tokio::fs::try_exists(&manifest).await? {
                return Err(ProcError::NotFound(format!(
                    "input file list {} for job {}",
                    manifest.display(),
                    job_id
                )));
            }

            let log = self
                .reducer
                .reduce(&ReductionRequest {
                    job_id,
                    manifest,
                    mode: job.mode,
                    parameters: job.parameters,
                })
                .await?;
            debug!("Job {} log written to {}", job_id, log.display());

            let output_dir = self.assembler.directories().output_dir(job_id);
            let outputs = list_output_files(&output_dir).await?;
            info!("Job {} produced {} output files", job_id, outputs.len());
            self.store.set_output_files(job_id, &outputs).await?;

            self.store
                .change_state(
                    job_id,
                    JobState::Processed,
                    "Job has been successfully processed",
                    Some(JobState::Running),
                    self.username(),
                )
                .await
        })
        .await?;

        if done {
            info!("Done running job {}", job_id);
        }

        Ok(())
    }
}
