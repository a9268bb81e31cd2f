//! Log domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::qa_state::QaState;
use crate::state::JobState;

/// Processing log entry recorded alongside each state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub state_prev: JobState,
    pub state_new: JobState,
    pub message: String,
    pub username: Option<String>,
}

/// QA log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaEntry {
    pub timestamp: DateTime<Utc>,
    pub status: QaState,
    pub message: String,
    pub username: Option<String>,
}
