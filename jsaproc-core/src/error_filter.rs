//! Error classifier
//!
//! Sorts jobs which are in error into categories based on their most recent
//! log message. Each named category is a list of substrings known to appear
//! in a class of failure. The special `uncategorized` category selects jobs
//! whose latest message matches none of the named categories.

use std::collections::BTreeMap;

use crate::domain::log::LogEntry;
use crate::error::{ProcError, Result};
use crate::state::JobState;

/// Name of the category matching no other category
pub const UNCATEGORIZED: &str = "uncategorized";

/// Named categories, sorted by name
static CATEGORIES: [(&str, &[&str]); 3] = [
    ("network", &["503 Server Error", "fails hds validation"]),
    ("running", &["jsawrapdr exited with non zero status"]),
    ("unauthorized", &["401 Client Error"]),
];

/// Names accepted by `ErrorFilter::new`
pub fn filter_names() -> Vec<&'static str> {
    CATEGORIES
        .iter()
        .map(|(name, _)| *name)
        .chain(std::iter::once(UNCATEGORIZED))
        .collect()
}

#[derive(Debug, Clone)]
enum Condition {
    Any,
    ContainsAny(&'static [&'static str]),
    ContainsNone(Vec<&'static str>),
}

/// Filter over the latest log message of each job
#[derive(Debug, Clone)]
pub struct ErrorFilter {
    condition: Condition,
    extra: Option<String>,
    state_prev: Option<JobState>,
}

impl ErrorFilter {
    /// Creates a filter for a named category
    ///
    /// # Arguments
    /// * `name` - One of `filter_names()`
    /// * `extra` - Additional substring the latest message must contain
    pub fn new(name: &str, extra: Option<&str>) -> Result<Self> {
        let condition = if name == UNCATEGORIZED {
            Condition::ContainsNone(
                CATEGORIES
                    .iter()
                    .flat_map(|(_, patterns)| patterns.iter().copied())
                    .collect(),
            )
        } else {
            let (_, patterns) = CATEGORIES
                .iter()
                .find(|(category, _)| *category == name)
                .ok_or_else(|| ProcError::InvalidFilter(name.to_string()))?;
            Condition::ContainsAny(patterns)
        };

        Ok(Self {
            condition,
            extra: None,
            state_prev: None,
        }
        .with_extra(extra))
    }

    /// Creates a filter which accepts every category
    pub fn any(extra: Option<&str>) -> Self {
        Self {
            condition: Condition::Any,
            extra: None,
            state_prev: None,
        }
        .with_extra(extra)
    }

    pub fn with_extra(mut self, extra: Option<&str>) -> Self {
        self.extra = extra.filter(|e| !e.is_empty()).map(str::to_string);
        self
    }

    /// Also require the latest log entry to have left `state_prev`
    pub fn with_state_prev(mut self, state_prev: Option<JobState>) -> Self {
        self.state_prev = state_prev;
        self
    }

    /// Checks a job's log, newest entry first
    pub fn matches(&self, logs: &[LogEntry]) -> bool {
        let latest = logs.first();
        let message = latest.map(|entry| entry.message.as_str()).unwrap_or("");

        let category = match &self.condition {
            Condition::Any => true,
            Condition::ContainsAny(patterns) => patterns.iter().any(|p| message.contains(p)),
            Condition::ContainsNone(patterns) => !patterns.iter().any(|p| message.contains(p)),
        };

        let extra = self
            .extra
            .as_deref()
            .is_none_or(|extra| message.contains(extra));

        let state_prev = match self.state_prev {
            None => true,
            Some(state) => latest.is_some_and(|entry| entry.state_prev == state),
        };

        category && extra && state_prev
    }

    /// Returns the jobs whose logs satisfy the filter
    pub fn filter<K: Ord>(
        &self,
        job_logs: BTreeMap<K, Vec<LogEntry>>,
    ) -> BTreeMap<K, Vec<LogEntry>> {
        job_logs
            .into_iter()
            .filter(|(_, logs)| self.matches(logs))
            .collect()
    }
}
