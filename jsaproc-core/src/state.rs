//! Processing state model
//!
//! Fixed table of job processing states. Each state has a single-character
//! code (as stored in the job database), a human-readable name, a display
//! phase and pre-/post-run classification. The table and the derived state
//! sets are built once and never change.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::{ProcError, Result};

/// Job processing state
///
/// Variants are declared in display order, so the derived `Ord` follows the
/// processing sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Unknown,
    Queued,
    Missing,
    Fetching,
    Waiting,
    Running,
    Processed,
    Transferring,
    IngestQueue,
    IngestFetch,
    Ingestion,
    Ingesting,
    Complete,
    Error,
    Deleted,
    WontWork,
}

/// General phase of processing, for display purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Queue,
    Fetch,
    Run,
    Complete,
    Error,
}

impl Phase {
    pub fn code(self) -> char {
        match self {
            Phase::Queue => 'Q',
            Phase::Fetch => 'F',
            Phase::Run => 'S',
            Phase::Complete => 'Y',
            Phase::Error => 'E',
        }
    }
}

/// Information about a state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateInfo {
    /// Human-readable name
    pub name: &'static str,
    /// Phase grouping
    pub phase: Phase,
    /// True if the state represents a long-running process
    pub active: bool,
    /// `Some(true)` before the run, `Some(false)` after it, `None` when the
    /// state cannot be classified either way
    pub pre_run: Option<bool>,
    /// True for terminal states
    pub is_final: bool,
}

const fn info(
    name: &'static str,
    phase: Phase,
    active: bool,
    pre_run: Option<bool>,
    is_final: bool,
) -> StateInfo {
    StateInfo {
        name,
        phase,
        active,
        pre_run,
        is_final,
    }
}

static STATE_TABLE: [(JobState, char, StateInfo); 16] = [
    (JobState::Unknown, '?', info("Unknown", Phase::Queue, false, Some(true), false)),
    (JobState::Queued, 'Q', info("Queued", Phase::Queue, false, Some(true), false)),
    (JobState::Missing, 'M', info("Missing", Phase::Queue, false, Some(true), false)),
    (JobState::Fetching, 'F', info("Fetching", Phase::Fetch, true, Some(true), false)),
    (JobState::Waiting, 'W', info("Waiting", Phase::Fetch, false, Some(true), false)),
    (JobState::Running, 'S', info("Running", Phase::Run, true, None, false)),
    (JobState::Processed, 'P', info("Processed", Phase::Run, false, Some(false), false)),
    (JobState::Transferring, 'T', info("Transferring", Phase::Run, true, Some(false), false)),
    (JobState::IngestQueue, 'G', info("Queued to reingest", Phase::Run, false, Some(false), false)),
    (JobState::IngestFetch, 'H', info("Fetching to reingest", Phase::Run, true, Some(false), false)),
    (JobState::Ingestion, 'I', info("Waiting to ingest", Phase::Run, false, Some(false), false)),
    (JobState::Ingesting, 'J', info("Ingesting", Phase::Run, true, Some(false), false)),
    (JobState::Complete, 'Y', info("Complete", Phase::Complete, false, Some(false), true)),
    (JobState::Error, 'E', info("Error", Phase::Error, false, None, true)),
    (JobState::Deleted, 'X', info("Deleted", Phase::Error, false, None, true)),
    (JobState::WontWork, 'Z', info("Won't work", Phase::Error, false, None, true)),
];

static PRE_RUN: LazyLock<BTreeSet<JobState>> =
    LazyLock::new(|| states_where(|i| i.pre_run == Some(true)));

static POST_RUN: LazyLock<BTreeSet<JobState>> =
    LazyLock::new(|| states_where(|i| i.pre_run == Some(false)));

static PRE_QA: LazyLock<BTreeSet<JobState>> = LazyLock::new(|| {
    let mut states = PRE_RUN.clone();
    states.insert(JobState::Running);
    states.insert(JobState::Processed);
    states
});

static FINAL: LazyLock<BTreeSet<JobState>> = LazyLock::new(|| states_where(|i| i.is_final));

// Everything other than a clean finish.
static ERROR: LazyLock<BTreeSet<JobState>> = LazyLock::new(|| {
    JobState::ALL
        .iter()
        .copied()
        .filter(|s| *s != JobState::Complete)
        .collect()
});

fn states_where(predicate: impl Fn(&StateInfo) -> bool) -> BTreeSet<JobState> {
    STATE_TABLE
        .iter()
        .filter(|(_, _, info)| predicate(info))
        .map(|(state, _, _)| *state)
        .collect()
}

impl JobState {
    /// All states in display order
    pub const ALL: [JobState; 16] = [
        JobState::Unknown,
        JobState::Queued,
        JobState::Missing,
        JobState::Fetching,
        JobState::Waiting,
        JobState::Running,
        JobState::Processed,
        JobState::Transferring,
        JobState::IngestQueue,
        JobState::IngestFetch,
        JobState::Ingestion,
        JobState::Ingesting,
        JobState::Complete,
        JobState::Error,
        JobState::Deleted,
        JobState::WontWork,
    ];

    fn entry(self) -> &'static (JobState, char, StateInfo) {
        // The table is declared in the same order as the enum.
        &STATE_TABLE[self as usize]
    }

    /// Single-character code stored in the database
    pub fn code(self) -> char {
        self.entry().1
    }

    pub fn info(self) -> &'static StateInfo {
        &self.entry().2
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Look up a state by its code
    pub fn from_code(code: &str) -> Result<Self> {
        let mut chars = code.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => STATE_TABLE
                .iter()
                .find(|(_, code, _)| *code == c)
                .map(|(state, _, _)| *state)
                .ok_or_else(|| ProcError::UnknownState(code.to_string())),
            _ => Err(ProcError::UnknownState(code.to_string())),
        }
    }

    pub fn is_active(self) -> bool {
        self.info().active
    }

    pub fn is_final(self) -> bool {
        self.info().is_final
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JobState {
    type Err = ProcError;

    fn from_str(code: &str) -> Result<Self> {
        JobState::from_code(code)
    }
}

/// Check whether a state code exists
pub fn is_valid(code: &str) -> bool {
    JobState::from_code(code).is_ok()
}

/// Return the human-readable name of a state code
pub fn name_of(code: &str) -> Result<&'static str> {
    JobState::from_code(code).map(JobState::name)
}

/// Return the information record for a state code
pub fn info_of(code: &str) -> Result<&'static StateInfo> {
    JobState::from_code(code).map(JobState::info)
}

/// Return the state whose name matches, compared case-insensitively
pub fn lookup_name(name: &str) -> Result<JobState> {
    let lower = name.to_lowercase();

    STATE_TABLE
        .iter()
        .find(|(_, _, info)| info.name.to_lowercase() == lower)
        .map(|(state, _, _)| *state)
        .ok_or_else(|| ProcError::UnknownState(format!("name {}", name)))
}

/// States strictly before the reduction run
pub fn pre_run() -> &'static BTreeSet<JobState> {
    &PRE_RUN
}

/// States strictly after the reduction run
pub fn post_run() -> &'static BTreeSet<JobState> {
    &POST_RUN
}

/// States in which a job has not yet been through QA
pub fn pre_qa() -> &'static BTreeSet<JobState> {
    &PRE_QA
}

/// Terminal states
pub fn final_states() -> &'static BTreeSet<JobState> {
    &FINAL
}

/// States which do not represent a clean finish
pub fn error_states() -> &'static BTreeSet<JobState> {
    &ERROR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_enum_order() {
        for (index, (state, _, _)) in STATE_TABLE.iter().enumerate() {
            assert_eq!(JobState::ALL[index], *state);
        }
    }

    #[test]
    fn test_every_code_is_valid() {
        for state in JobState::ALL {
            let code = state.code().to_string();
            assert!(is_valid(&code));
            assert_eq!(name_of(&code).unwrap(), state.name());
            assert_eq!(info_of(&code).unwrap(), state.info());
            assert_eq!(JobState::from_code(&code).unwrap(), state);
        }
    }

    #[test]
    fn test_unknown_codes_rejected() {
        for code in ["", "A", "QQ", "q", "??"] {
            assert!(!is_valid(code));
            assert!(matches!(name_of(code), Err(ProcError::UnknownState(_))));
            assert!(matches!(info_of(code), Err(ProcError::UnknownState(_))));
        }
    }

    #[test]
    fn test_lookup_name_is_case_insensitive() {
        assert_eq!(lookup_name("missing").unwrap(), JobState::Missing);
        assert_eq!(lookup_name("WON'T WORK").unwrap(), JobState::WontWork);
        assert_eq!(
            lookup_name("Waiting to ingest").unwrap(),
            JobState::Ingestion
        );
        assert!(lookup_name("Waiting to").is_err());
    }

    #[test]
    fn test_derived_sets() {
        assert!(pre_run().contains(&JobState::Waiting));
        assert!(!pre_run().contains(&JobState::Running));
        assert!(!post_run().contains(&JobState::Running));
        assert!(post_run().contains(&JobState::Complete));
        assert!(!post_run().contains(&JobState::Error));

        assert!(pre_qa().contains(&JobState::Running));
        assert!(pre_qa().contains(&JobState::Processed));
        assert!(!pre_qa().contains(&JobState::Transferring));

        let finals: Vec<_> = final_states().iter().copied().collect();
        assert_eq!(
            finals,
            vec![
                JobState::Complete,
                JobState::Error,
                JobState::Deleted,
                JobState::WontWork
            ]
        );

        assert_eq!(error_states().len(), JobState::ALL.len() - 1);
        assert!(!error_states().contains(&JobState::Complete));
    }

    #[test]
    fn test_codes_are_unique() {
        let codes: BTreeSet<char> = JobState::ALL.iter().map(|s| s.code()).collect();
        assert_eq!(codes.len(), JobState::ALL.len());
    }
}
