//! Transfer planning
//!
//! Products already held by the archive go to the "replace" area of the
//! transfer directory, everything else to "new".

use jsaproc_client::{AvailabilityCache, CatalogSource};
use jsaproc_core::domain::job::JobId;
use jsaproc_core::{JobStore, ProcError, Result};
use tracing::debug;

/// Where each output file of a job should be transferred
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferPlan {
    pub new: Vec<String>,
    pub replace: Vec<String>,
}

/// Decide for each output file of `job_id` whether it is new to the archive
pub async fn plan_transfer<C: CatalogSource>(
    store: &dyn JobStore,
    cache: &mut AvailabilityCache<C>,
    job_id: JobId,
) -> Result<TransferPlan> {
    let files = match store.get_output_files(job_id).await {
        Ok(files) => files,
        Err(err) if err.is_not_found() => {
            return Err(ProcError::NotFound(format!(
                "no output files recorded for job {}",
                job_id
            )));
        }
        Err(err) => return Err(err),
    };

    let present = cache.check_files(&files).await?;

    let mut plan = TransferPlan::default();
    for (file, at_archive) in files.into_iter().zip(present) {
        if at_archive {
            plan.replace.push(file);
        } else {
            plan.new.push(file);
        }
    }

    debug!(
        "Job {}: {} new and {} replacement files",
        job_id,
        plan.new.len(),
        plan.replace.len()
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::new_job;
    use async_trait::async_trait;
    use jsaproc_orchestrator::MemoryJobStore;

    struct FakeCatalog(Vec<&'static str>);

    #[async_trait]
    impl CatalogSource for FakeCatalog {
        async fn files_by_pattern(&self, pattern: &str) -> Result<Vec<String>> {
            let prefix = pattern.split('%').next().unwrap_or(pattern);
            Ok(self
                .0
                .iter()
                .filter(|f| f.starts_with(prefix))
                .map(|f| f.to_string())
                .collect())
        }
    }

    #[tokio::test]
    async fn test_plan_splits_new_and_replace() {
        let store = MemoryJobStore::new();
        let id = store.add_job(new_job("t", 0, &[])).await.unwrap();
        store
            .set_output_files(
                id,
                &[
                    "jcmts20200101_00001_850_reduced_001.fits".to_string(),
                    "jcmts20200101_00001_850_reduced_002.fits".to_string(),
                ],
            )
            .await
            .unwrap();

        let mut cache = AvailabilityCache::new(FakeCatalog(vec![
            "jcmts20200101_00001_850_reduced_001",
        ]));
        let plan = plan_transfer(&store, &mut cache, id).await.unwrap();

        assert_eq!(plan.replace, ["jcmts20200101_00001_850_reduced_001.fits"]);
        assert_eq!(plan.new, ["jcmts20200101_00001_850_reduced_002.fits"]);
    }

    #[tokio::test]
    async fn test_no_outputs_is_not_found() {
        let store = MemoryJobStore::new();
        let id = store.add_job(new_job("empty", 0, &[])).await.unwrap();

        let mut cache = AvailabilityCache::new(FakeCatalog(Vec::new()));
        let err = plan_transfer(&store, &mut cache, id).await.unwrap_err();

        assert!(err.is_not_found());
        assert!(err.to_string().contains("no output files recorded"));
    }
}
