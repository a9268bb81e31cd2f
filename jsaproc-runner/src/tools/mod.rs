//! Starlink tool wrappers
//!
//! Both tools are reached through traits so the stages can be exercised
//! without a Starlink installation.

pub mod hdstrace;
pub mod jsawrapdr;

pub use hdstrace::{FileValidator, HdsTraceValidator};
pub use jsawrapdr::{Jsawrapdr, ReductionRequest, Reducer};
