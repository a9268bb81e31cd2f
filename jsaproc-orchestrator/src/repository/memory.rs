//! In-memory job store
//!
//! Implements `JobStore` with the same semantics as the Postgres store,
//! including the compare-and-swap on `change_state`. Used for tests and
//! single-process runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use jsaproc_core::domain::job::{Job, JobId, JobSummary, NewJob, ParentLink};
use jsaproc_core::domain::log::{LogEntry, QaEntry};
use jsaproc_core::domain::obs::{ObsInfo, TaskInfo};
use jsaproc_core::store::{FindErrors, FindJobs};
use jsaproc_core::{JobState, JobStore, ProcError, QaState, Result};
use tokio::sync::Mutex;

#[derive(Debug)]
struct Record {
    job: Job,
    parents: Vec<ParentLink>,
    input_files: Vec<String>,
    output_files: Vec<String>,
    logs: Vec<LogEntry>,
    qas: Vec<QaEntry>,
    obs: Vec<ObsInfo>,
}

#[derive(Debug, Default)]
struct Inner {
    last_id: JobId,
    jobs: BTreeMap<JobId, Record>,
    tasks: BTreeMap<String, TaskInfo>,
}

impl Inner {
    fn record(&self, id: JobId) -> Result<&Record> {
        self.jobs
            .get(&id)
            .ok_or_else(|| ProcError::NotFound(format!("job {}", id)))
    }

    fn record_mut(&mut self, id: JobId) -> Result<&mut Record> {
        self.jobs
            .get_mut(&id)
            .ok_or_else(|| ProcError::NotFound(format!("job {}", id)))
    }
}

/// `JobStore` held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task definition
    pub async fn add_task(&self, task: TaskInfo) {
        let mut inner = self.inner.lock().await;
        inner.tasks.insert(task.taskname.clone(), task);
    }

    /// Attach observation metadata to a job
    pub async fn add_obs_info(&self, id: JobId, obs: ObsInfo) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.record_mut(id)?.obs.push(obs);
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn find_jobs(&self, query: &FindJobs) -> Result<Vec<JobSummary>> {
        let inner = self.inner.lock().await;

        // Records are keyed by id, so iteration is already in id order.
        let mut jobs: Vec<JobSummary> = inner
            .jobs
            .values()
            .filter(|r| query.state.is_none_or(|s| r.job.state == s))
            .filter(|r| query.location.is_none_or(|l| r.job.location == l))
            .filter(|r| query.task.as_ref().is_none_or(|t| r.job.task == *t))
            .map(|r| {
                let mut summary = JobSummary::from(r.job.clone());
                if let Some(pattern) = &query.outputs {
                    let mut outputs: Vec<String> = r
                        .output_files
                        .iter()
                        .filter(|f| f.ends_with(pattern.as_str()))
                        .cloned()
                        .collect();
                    outputs.sort();
                    summary.outputs = outputs;
                }
                summary
            })
            .collect();

        if query.prioritize {
            jobs.sort_by(|a, b| b.priority.cmp(&a.priority));
        }

        if let Some(limit) = query.limit {
            jobs.truncate(limit);
        }

        Ok(jobs)
    }

    async fn get_job(&self, id: JobId) -> Result<Job> {
        let inner = self.inner.lock().await;
        Ok(inner.record(id)?.job.clone())
    }

    async fn get_job_by_tag(&self, tag: &str) -> Result<Job> {
        let inner = self.inner.lock().await;
        inner
            .jobs
            .values()
            .find(|r| r.job.tag == tag)
            .map(|r| r.job.clone())
            .ok_or_else(|| ProcError::NotFound(format!("job tagged {}", tag)))
    }

    async fn add_job(&self, new_job: NewJob) -> Result<JobId> {
        let mut inner = self.inner.lock().await;

        if inner.jobs.values().any(|r| r.job.tag == new_job.tag) {
            return Err(ProcError::InvalidArgument(format!(
                "Job tag {} already exists",
                new_job.tag
            )));
        }

        inner.last_id += 1;
        let id = inner.last_id;

        let job = Job {
            id,
            tag: new_job.tag,
            state: JobState::Unknown,
            location: new_job.location,
            foreign_id: None,
            mode: new_job.mode,
            parameters: new_job.parameters,
            priority: new_job.priority,
            task: new_job.task,
            qa_state: QaState::Unknown,
            tilelist: new_job.tilelist.filter(|tiles| !tiles.is_empty()),
        };

        inner.jobs.insert(
            id,
            Record {
                job,
                parents: new_job.parents,
                input_files: new_job.input_files,
                output_files: Vec::new(),
                logs: Vec::new(),
                qas: Vec::new(),
                obs: Vec::new(),
            },
        );

        Ok(id)
    }

    async fn change_state(
        &self,
        id: JobId,
        new_state: JobState,
        message: &str,
        state_prev: Option<JobState>,
        username: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;

        let no_rows = ProcError::NoRows {
            job_id: id,
            expected: state_prev,
        };

        let Some(record) = inner.jobs.get_mut(&id) else {
            return Err(no_rows);
        };

        let previous = record.job.state;
        if state_prev.is_some_and(|expected| expected != previous) {
            return Err(no_rows);
        }

        record.job.state = new_state;
        record.logs.push(LogEntry {
            timestamp: Utc::now(),
            state_prev: previous,
            state_new: new_state,
            message: message.to_string(),
            username: username.map(str::to_string),
        });

        Ok(())
    }

    async fn get_logs(&self, id: JobId) -> Result<Vec<LogEntry>> {
        let inner = self.inner.lock().await;
        Ok(inner.record(id)?.logs.clone())
    }

    async fn find_error_logs(&self, query: &FindErrors) -> Result<BTreeMap<JobId, Vec<LogEntry>>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .jobs
            .iter()
            .filter(|(_, r)| r.job.state == query.error_state)
            .filter(|(_, r)| query.location.is_none_or(|l| r.job.location == l))
            .filter(|(_, r)| query.task.as_ref().is_none_or(|t| r.job.task == *t))
            .filter(|(_, r)| !r.logs.is_empty())
            .map(|(id, r)| (*id, r.logs.iter().rev().cloned().collect::<Vec<_>>()))
            .filter(|(_, logs)| {
                query
                    .state_prev
                    .is_none_or(|s| logs.first().is_some_and(|l| l.state_prev == s))
            })
            .collect())
    }

    async fn get_input_files(&self, id: JobId) -> Result<Vec<String>> {
        let inner = self.inner.lock().await;
        Ok(inner.record(id)?.input_files.clone())
    }

    async fn get_output_files(&self, id: JobId) -> Result<Vec<String>> {
        let inner = self.inner.lock().await;
        let files = &inner.record(id)?.output_files;

        if files.is_empty() {
            return Err(ProcError::NotFound(format!("output files of job {}", id)));
        }

        Ok(files.clone())
    }

    async fn set_output_files(&self, id: JobId, files: &[String]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.record_mut(id)?.output_files = files.to_vec();
        Ok(())
    }

    async fn get_parents(&self, id: JobId) -> Result<Vec<ParentLink>> {
        let inner = self.inner.lock().await;
        let mut parents = inner.record(id)?.parents.clone();
        parents.sort();
        Ok(parents)
    }

    async fn replace_parents(&self, id: JobId, parents: &[ParentLink]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.record_mut(id)?.parents = parents.to_vec();
        Ok(())
    }

    async fn add_qa_entry(
        &self,
        id: JobId,
        status: QaState,
        message: &str,
        username: &str,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let record = inner.record_mut(id)?;

        record.job.qa_state = status;
        record.qas.push(QaEntry {
            timestamp: Utc::now(),
            status,
            message: message.to_string(),
            username: Some(username.to_string()),
        });

        Ok(())
    }

    async fn get_qas(&self, id: JobId) -> Result<Vec<QaEntry>> {
        let inner = self.inner.lock().await;
        Ok(inner.record(id)?.qas.clone())
    }

    async fn get_obs_info(&self, id: JobId) -> Result<Vec<ObsInfo>> {
        let inner = self.inner.lock().await;
        Ok(inner.record(id)?.obs.clone())
    }

    async fn get_tasks(&self) -> Result<Vec<String>> {
        let inner = self.inner.lock().await;
        Ok(inner.tasks.keys().cloned().collect())
    }

    async fn get_task_info(&self, task: &str) -> Result<TaskInfo> {
        let inner = self.inner.lock().await;
        inner
            .tasks
            .get(task)
            .cloned()
            .ok_or_else(|| ProcError::NotFound(format!("task {}", task)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsaproc_core::domain::job::Location;
    use std::sync::Arc;

    fn new_job(tag: &str, priority: i32) -> NewJob {
        NewJob {
            tag: tag.to_string(),
            location: Location::Jac,
            mode: "obs".to_string(),
            parameters: String::new(),
            task: "jcmt-nightly".to_string(),
            priority,
            parents: Vec::new(),
            input_files: Vec::new(),
            tilelist: None,
        }
    }

    #[tokio::test]
    async fn test_add_job_starts_unknown() {
        let store = MemoryJobStore::new();
        let id = store.add_job(new_job("a", 0)).await.unwrap();
        let job = store.get_job(id).await.unwrap();
        assert_eq!(job.state, JobState::Unknown);
        assert_eq!(job.qa_state, QaState::Unknown);
        assert_eq!(store.get_job_by_tag("a").await.unwrap().id, id);
    }

    #[tokio::test]
    async fn test_duplicate_tag_rejected() {
        let store = MemoryJobStore::new();
        store.add_job(new_job("a", 0)).await.unwrap();
        assert!(store.add_job(new_job("a", 1)).await.is_err());
    }

    #[tokio::test]
    async fn test_change_state_cas() {
        let store = MemoryJobStore::new();
        let id = store.add_job(new_job("a", 0)).await.unwrap();

        store
            .change_state(id, JobState::Missing, "queued", Some(JobState::Unknown), None)
            .await
            .unwrap();

        let err = store
            .change_state(id, JobState::Fetching, "fetch", Some(JobState::Queued), None)
            .await
            .unwrap_err();
        assert!(err.is_no_rows());

        // The failed attempt changes nothing.
        let logs = store.get_logs(id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].state_prev, JobState::Unknown);
        assert_eq!(logs[0].state_new, JobState::Missing);
        assert_eq!(store.get_job(id).await.unwrap().state, JobState::Missing);
    }

    #[tokio::test]
    async fn test_change_state_without_expectation() {
        let store = MemoryJobStore::new();
        let id = store.add_job(new_job("a", 0)).await.unwrap();

        store
            .change_state(id, JobState::Error, "boom", None, Some("operator"))
            .await
            .unwrap();

        let logs = store.get_logs(id).await.unwrap();
        assert_eq!(logs[0].username.as_deref(), Some("operator"));
    }

    #[tokio::test]
    async fn test_change_state_missing_job() {
        let store = MemoryJobStore::new();
        let err = store
            .change_state(99, JobState::Error, "x", None, None)
            .await
            .unwrap_err();
        assert!(err.is_no_rows());
    }

    #[tokio::test]
    async fn test_concurrent_cas_has_one_winner() {
        let store = Arc::new(MemoryJobStore::new());
        let id = store.add_job(new_job("a", 0)).await.unwrap();
        store
            .change_state(id, JobState::Missing, "m", None, None)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .change_state(id, JobState::Fetching, "f", Some(JobState::Missing), None)
                    .await
                    .is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_find_jobs_priority_then_id() {
        let store = MemoryJobStore::new();
        let low = store.add_job(new_job("low", 1)).await.unwrap();
        let high_a = store.add_job(new_job("high_a", 5)).await.unwrap();
        let high_b = store.add_job(new_job("high_b", 5)).await.unwrap();

        let jobs = store
            .find_jobs(&FindJobs::new().prioritize().sorted())
            .await
            .unwrap();
        let ids: Vec<JobId> = jobs.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![high_a, high_b, low]);

        let jobs = store
            .find_jobs(&FindJobs::new().prioritize().sorted().limit(1))
            .await
            .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, high_a);
    }

    #[tokio::test]
    async fn test_find_jobs_outputs_pattern() {
        let store = MemoryJobStore::new();
        let id = store.add_job(new_job("a", 0)).await.unwrap();
        store
            .set_output_files(
                id,
                &[
                    "x_preview_256.png".to_string(),
                    "x_preview_64.png".to_string(),
                    "x_previewA64.png".to_string(),
                    "x.fits".to_string(),
                ],
            )
            .await
            .unwrap();

        let jobs = store
            .find_jobs(&FindJobs::new().outputs("preview_64.png"))
            .await
            .unwrap();
        assert_eq!(jobs[0].outputs, vec!["x_preview_64.png"]);
    }

    #[tokio::test]
    async fn test_output_files_not_found_when_empty() {
        let store = MemoryJobStore::new();
        let id = store.add_job(new_job("a", 0)).await.unwrap();
        assert!(store.get_output_files(id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_find_error_logs_newest_first() {
        let store = MemoryJobStore::new();
        let id = store.add_job(new_job("a", 0)).await.unwrap();
        let ok = store.add_job(new_job("b", 0)).await.unwrap();
        store
            .change_state(id, JobState::Fetching, "fetching", None, None)
            .await
            .unwrap();
        store
            .change_state(id, JobState::Error, "401 Client Error", None, None)
            .await
            .unwrap();
        store
            .change_state(ok, JobState::Complete, "done", None, None)
            .await
            .unwrap();

        let errors = store.find_error_logs(&FindErrors::default()).await.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[&id][0].message, "401 Client Error");
        assert_eq!(errors[&id][1].message, "fetching");

        let query = FindErrors {
            state_prev: Some(JobState::Running),
            ..FindErrors::default()
        };
        assert!(store.find_error_logs(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_qa_entry_updates_state() {
        let store = MemoryJobStore::new();
        let id = store.add_job(new_job("a", 0)).await.unwrap();
        store
            .add_qa_entry(id, QaState::Bad, "striped", "reviewer")
            .await
            .unwrap();

        assert_eq!(store.get_job(id).await.unwrap().qa_state, QaState::Bad);
        let qas = store.get_qas(id).await.unwrap();
        assert_eq!(qas.len(), 1);
        assert_eq!(qas[0].username.as_deref(), Some("reviewer"));
    }

    #[tokio::test]
    async fn test_task_lookup() {
        let store = MemoryJobStore::new();
        assert!(
            store
                .get_task_info("jcmt-nightly")
                .await
                .unwrap_err()
                .is_not_found()
        );

        store
            .add_task(TaskInfo {
                taskname: "jcmt-nightly".to_string(),
                etransfer: Some(true),
                starlink_dir: None,
                version: None,
                command_run: None,
            })
            .await;
        assert_eq!(store.get_tasks().await.unwrap(), vec!["jcmt-nightly"]);
        assert!(store.get_task_info("jcmt-nightly").await.is_ok());
    }
}
