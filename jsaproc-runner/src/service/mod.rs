//! Service layer
//!
//! Services contain the runner's business logic below the stage level.

pub mod acquisition;

pub use acquisition::{INPUT_LIST_NAME, InputAssembler, list_output_files};
