//! Job domain types

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ProcError, Result};
use crate::qa_state::QaState;
use crate::state::JobState;

/// Store-assigned job identifier
pub type JobId = i64;

/// Site at which a job is processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Location {
    #[serde(rename = "JAC")]
    Jac,
    #[serde(rename = "CADC")]
    Cadc,
}

impl Location {
    pub const ALL: [Location; 2] = [Location::Jac, Location::Cadc];

    pub fn as_str(self) -> &'static str {
        match self {
            Location::Jac => "JAC",
            Location::Cadc => "CADC",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = ProcError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "JAC" => Ok(Location::Jac),
            "CADC" => Ok(Location::Cadc),
            other => Err(ProcError::InvalidArgument(format!(
                "Unknown location {}",
                other
            ))),
        }
    }
}

/// Job record as held by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub tag: String,
    pub state: JobState,
    pub location: Location,
    pub foreign_id: Option<String>,
    pub mode: String,
    pub parameters: String,
    pub priority: i32,
    pub task: String,
    pub qa_state: QaState,
    pub tilelist: Option<Vec<i64>>,
}

/// Lightweight job listing row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub tag: String,
    pub state: JobState,
    pub location: Location,
    pub priority: i32,
    pub task: String,
    /// Output files matching the listing's output pattern, if one was given
    pub outputs: Vec<String>,
}

impl From<Job> for JobSummary {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            tag: job.tag,
            state: job.state,
            location: job.location,
            priority: job.priority,
            task: job.task,
            outputs: Vec::new(),
        }
    }
}

/// A parent job together with the filter applied to its outputs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParentLink {
    pub parent: JobId,
    pub filter: String,
}

impl ParentLink {
    pub fn new(parent: JobId, filter: impl Into<String>) -> Self {
        Self {
            parent,
            filter: filter.into(),
        }
    }

    /// Pair parent ids with their filters
    ///
    /// Without filters every parent gets an empty filter. With filters the
    /// two lists must have the same length.
    pub fn zip(parents: &[JobId], filters: Option<&[String]>) -> Result<Vec<Self>> {
        match filters {
            None => Ok(parents.iter().map(|p| ParentLink::new(*p, "")).collect()),
            Some(filters) if filters.len() == parents.len() => Ok(parents
                .iter()
                .zip(filters)
                .map(|(p, f)| ParentLink::new(*p, f.clone()))
                .collect()),
            Some(filters) => Err(ProcError::InvalidArgument(format!(
                "{} parent jobs given with {} filters",
                parents.len(),
                filters.len()
            ))),
        }
    }
}

/// Unordered set of parent/filter pairs
///
/// Two parent lists which differ only in order are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentSet(BTreeSet<ParentLink>);

impl ParentSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParentLink> {
        self.0.iter()
    }

    /// Links present in `self` but not in `other`
    pub fn difference(&self, other: &ParentSet) -> Vec<ParentLink> {
        self.0.difference(&other.0).cloned().collect()
    }

    pub fn to_vec(&self) -> Vec<ParentLink> {
        self.0.iter().cloned().collect()
    }
}

impl FromIterator<ParentLink> for ParentSet {
    fn from_iter<T: IntoIterator<Item = ParentLink>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Attributes of a job to be created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    pub tag: String,
    pub location: Location,
    pub mode: String,
    pub parameters: String,
    pub task: String,
    pub priority: i32,
    pub parents: Vec<ParentLink>,
    pub input_files: Vec<String>,
    pub tilelist: Option<Vec<i64>>,
}
