//! QA state model

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::{ProcError, Result};

/// Job QA state
///
/// Variants are declared in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QaState {
    Invalid,
    Unknown,
    Bad,
    Questionable,
    Good,
}

static IFFY: LazyLock<BTreeSet<QaState>> = LazyLock::new(|| {
    [QaState::Invalid, QaState::Bad, QaState::Questionable]
        .into_iter()
        .collect()
});

impl QaState {
    /// All QA states in display order
    pub const ALL: [QaState; 5] = [
        QaState::Invalid,
        QaState::Unknown,
        QaState::Bad,
        QaState::Questionable,
        QaState::Good,
    ];

    pub fn code(self) -> char {
        match self {
            QaState::Unknown => '?',
            QaState::Invalid => 'I',
            QaState::Bad => 'B',
            QaState::Questionable => 'Q',
            QaState::Good => 'G',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            QaState::Unknown => "Unknown",
            QaState::Invalid => "Invalid",
            QaState::Bad => "Bad",
            QaState::Questionable => "Questionable",
            QaState::Good => "Good",
        }
    }

    pub fn from_code(code: &str) -> Result<Self> {
        QaState::ALL
            .iter()
            .copied()
            .find(|state| code.len() == 1 && code.starts_with(state.code()))
            .ok_or_else(|| ProcError::UnknownQaState(code.to_string()))
    }

    /// True for states that mark a job's products as doubtful
    pub fn is_iffy(self) -> bool {
        IFFY.contains(&self)
    }
}

impl fmt::Display for QaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QaState {
    type Err = ProcError;

    fn from_str(code: &str) -> Result<Self> {
        QaState::from_code(code)
    }
}

/// Check whether a QA state code exists
pub fn is_valid(code: &str) -> bool {
    QaState::from_code(code).is_ok()
}

/// Return the human-readable name of a QA state code
pub fn name_of(code: &str) -> Result<&'static str> {
    QaState::from_code(code).map(QaState::name)
}

/// QA states which indicate a problem with the products
pub fn iffy_states() -> &'static BTreeSet<QaState> {
    &IFFY
}
