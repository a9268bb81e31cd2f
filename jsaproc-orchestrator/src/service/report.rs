//! Reports
//!
//! Data behind the job list, error summary and job QA pages. Rendering and
//! routing belong to the web layer; these functions only gather and filter.

use std::collections::BTreeMap;
use std::path::Path;

use jsaproc_core::domain::job::{Job, JobId, Location};
use jsaproc_core::domain::log::{LogEntry, QaEntry};
use jsaproc_core::domain::obs::ObsInfo;
use jsaproc_core::error_filter::{self, ErrorFilter};
use jsaproc_core::state;
use jsaproc_core::store::{FindErrors, FindJobs};
use jsaproc_core::{JobState, JobStore, Result};
use serde::Serialize;

/// Output suffix of the thumbnail shown in job listings
const LIST_PREVIEW: &str = "preview_64.png";

const RECIPE_URL: &str = "http://beta.cadc-ccda.hia-iha.nrc-cnrc.gc.ca/dp/recipe/";

// =============================================================================
// Job List
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobListEntry {
    pub id: JobId,
    pub tag: String,
    pub state: JobState,
    pub location: Location,
    /// First 64 pixel preview among the job's outputs
    pub preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobList {
    pub jobs: Vec<JobListEntry>,
    pub locations: Vec<Location>,
    pub selected_location: Option<Location>,
    pub states: Vec<JobState>,
    pub selected_state: Option<JobState>,
}

/// List jobs in id order, optionally restricted by location and state
pub async fn job_list(
    store: &dyn JobStore,
    location: Option<Location>,
    state: Option<JobState>,
) -> Result<JobList> {
    let query = FindJobs {
        location,
        state,
        sort: true,
        outputs: Some(LIST_PREVIEW.to_string()),
        ..FindJobs::default()
    };

    let jobs = store
        .find_jobs(&query)
        .await?
        .into_iter()
        .map(|job| JobListEntry {
            preview: job.outputs.first().cloned(),
            id: job.id,
            tag: job.tag,
            state: job.state,
            location: job.location,
        })
        .collect();

    Ok(JobList {
        jobs,
        locations: Location::ALL.to_vec(),
        selected_location: location,
        states: JobState::ALL.to_vec(),
        selected_state: state,
    })
}

// =============================================================================
// Error Summary
// =============================================================================

/// Parameters of the error summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorQuery {
    /// Named error filter, or every error when `None`
    pub filtering: Option<String>,
    pub task: Option<String>,
    /// Substring the latest log message must contain
    pub extra: Option<String>,
    /// State the job was in before its latest transition
    pub state_prev: Option<JobState>,
    /// State to report on, ERROR by default
    pub error_state: Option<JobState>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorSummary {
    /// Per location, the matching jobs with their logs newest first
    pub jobs: BTreeMap<Location, BTreeMap<JobId, Vec<LogEntry>>>,
    pub filtering: Option<String>,
    pub filter_names: Vec<&'static str>,
    pub tasks: Vec<String>,
    pub chosen_task: Option<String>,
    pub extra: Option<String>,
    pub state_prev: Option<JobState>,
    pub error_state: JobState,
    pub states: Vec<JobState>,
    pub error_states: Vec<JobState>,
}

/// Summarize jobs in the error state, classified by their latest message
///
/// When reporting on ERROR the previous-state constraint is applied by the
/// store; for any other state it is applied by the classifier.
pub async fn error_summary(store: &dyn JobStore, query: ErrorQuery) -> Result<ErrorSummary> {
    let filtering = non_empty(query.filtering);
    let task = non_empty(query.task);
    let extra = non_empty(query.extra);
    let error_state = query.error_state.unwrap_or(JobState::Error);
    let in_error = error_state == JobState::Error;

    let filter = match filtering.as_deref() {
        Some(name) => ErrorFilter::new(name, extra.as_deref())?,
        None => ErrorFilter::any(extra.as_deref()),
    }
    .with_state_prev(if in_error { None } else { query.state_prev });

    let tasks = store.get_tasks().await?;

    let mut jobs = BTreeMap::new();
    for location in Location::ALL {
        let logs = store
            .find_error_logs(&FindErrors {
                location: Some(location),
                task: task.clone(),
                state_prev: if in_error { query.state_prev } else { None },
                error_state,
            })
            .await?;
        jobs.insert(location, filter.filter(logs));
    }

    Ok(ErrorSummary {
        jobs,
        filtering,
        filter_names: error_filter::filter_names(),
        tasks,
        chosen_task: task,
        extra,
        state_prev: query.state_prev,
        error_state,
        states: JobState::ALL.to_vec(),
        error_states: state::error_states().iter().copied().collect(),
    })
}

// =============================================================================
// Job QA Info
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobQaInfo {
    pub job: Job,
    /// Recipe page at the remote site, for CADC jobs with a foreign id
    pub foreign_url: Option<String>,
    pub input_files: Vec<String>,
    pub output_files: Vec<String>,
    /// 1024 pixel previews of reduced and HEALPix products
    pub previews: Vec<String>,
    pub obs_info: Vec<ObsInfo>,
    /// QA log, newest first
    pub qa_log: Vec<QaEntry>,
    /// Pipeline HTML logs on disk, newest first
    pub orac_logs: Vec<String>,
    /// Wrapper text logs on disk, newest first
    pub wrapdr_logs: Vec<String>,
}

/// Gather everything shown on a job's QA page
pub async fn job_qa_info(
    store: &dyn JobStore,
    job_id: JobId,
    log_dir: Option<&Path>,
) -> Result<JobQaInfo> {
    let job = store.get_job(job_id).await?;

    let foreign_url = match (&job.foreign_id, job.location) {
        (Some(foreign_id), Location::Cadc) => Some(format!("{}{}", RECIPE_URL, foreign_id)),
        _ => None,
    };

    let input_files = store.get_input_files(job_id).await?;

    let output_files = match store.get_output_files(job_id).await {
        Ok(files) => files,
        Err(err) if err.is_not_found() => Vec::new(),
        Err(err) => return Err(err),
    };

    let previews = output_files
        .iter()
        .filter(|f| f.contains("preview_1024.png"))
        .filter(|f| f.contains("_reduced-") || f.contains("_healpix-"))
        .cloned()
        .collect();

    let obs_info = store.get_obs_info(job_id).await?;

    let mut qa_log = store.get_qas(job_id).await?;
    qa_log.reverse();

    let (orac_logs, wrapdr_logs) = match log_dir {
        Some(dir) => (
            list_logs(dir, "oracdr", ".html").await?,
            list_logs(dir, "jsawrapdr", ".log").await?,
        ),
        None => (Vec::new(), Vec::new()),
    };

    Ok(JobQaInfo {
        job,
        foreign_url,
        input_files,
        output_files,
        previews,
        obs_info,
        qa_log,
        orac_logs,
        wrapdr_logs,
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Names of files in `dir` with the given prefix and suffix, reverse sorted
///
/// A missing directory has no logs.
async fn list_logs(dir: &Path, prefix: &str, suffix: &str) -> Result<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(prefix) && name.ends_with(suffix) {
            names.push(name);
        }
    }

    names.sort_by(|a, b| b.cmp(a));
    Ok(names)
}
