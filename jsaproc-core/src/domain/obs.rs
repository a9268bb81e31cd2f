//! Observation and task records

use serde::{Deserialize, Serialize};

/// Observation metadata attached to a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsInfo {
    pub obsid: String,
    pub obsidss: Option<String>,
    pub utdate: Option<i32>,
    pub obsnum: Option<i32>,
    pub instrument: Option<String>,
    pub backend: Option<String>,
    pub subsys: Option<String>,
    pub project: Option<String>,
    pub survey: Option<String>,
    pub sourcename: Option<String>,
    pub obstype: Option<String>,
}

/// Processing task definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub taskname: String,
    pub etransfer: Option<bool>,
    pub starlink_dir: Option<String>,
    pub version: Option<i32>,
    pub command_run: Option<String>,
}
