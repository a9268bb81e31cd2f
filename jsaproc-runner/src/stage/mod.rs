//! Processing stages
//!
//! Each stage claims a job with a compare-and-swap state change, does its
//! work, then advances the job. Losing the claim to another worker is not a
//! failure of the job; anything going wrong after the claim moves the job
//! to ERROR.

mod fetch;
pub mod guard;
mod run;
pub mod transfer;

use std::sync::Arc;

use jsaproc_core::JobStore;

use crate::service::InputAssembler;
use crate::tools::Reducer;

pub use transfer::{TransferPlan, plan_transfer};

/// Drives jobs through the fetch and run stages
pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    assembler: InputAssembler,
    reducer: Arc<dyn Reducer>,
    username: String,
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        assembler: InputAssembler,
        reducer: Arc<dyn Reducer>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            store,
            assembler,
            reducer,
            username: username.into(),
        }
    }

    pub fn store(&self) -> &dyn JobStore {
        self.store.as_ref()
    }

    fn username(&self) -> Option<&str> {
        Some(self.username.as_str())
    }
}
