//! Per job directory trees
//!
//! Each tree (input, output, scratch, log) is split on the job id so that
//! no directory holds more than a thousand entries:
//! `<base>/<id / 1_000_000>/<(id / 1000) % 1000>/<id>`, zero padded to three
//! digits.

use std::path::{Path, PathBuf};

use jsaproc_core::Result;
use jsaproc_core::domain::job::JobId;
use tracing::debug;
use walkdir::WalkDir;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Disk usage of the four trees, in GiB
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskUsage {
    pub input: f64,
    pub output: f64,
    pub scratch: f64,
    pub log: f64,
}

/// Roots of the per job directory trees
#[derive(Debug, Clone)]
pub struct JobDirectories {
    input: PathBuf,
    output: PathBuf,
    scratch: PathBuf,
    log: PathBuf,
}

impl JobDirectories {
    /// Trees named `input`, `output`, `scratch` and `log` under `root`
    pub fn new(root: &Path) -> Self {
        Self {
            input: root.join("input"),
            output: root.join("output"),
            scratch: root.join("scratch"),
            log: root.join("log"),
        }
    }

    pub fn input_dir(&self, job_id: JobId) -> PathBuf {
        job_path(&self.input, job_id)
    }

    pub fn output_dir(&self, job_id: JobId) -> PathBuf {
        job_path(&self.output, job_id)
    }

    pub fn scratch_dir(&self, job_id: JobId) -> PathBuf {
        job_path(&self.scratch, job_id)
    }

    pub fn log_dir(&self, job_id: JobId) -> PathBuf {
        job_path(&self.log, job_id)
    }

    /// Remove any previous output directory and create an empty one
    pub async fn reset_output_dir(&self, job_id: JobId) -> Result<PathBuf> {
        let dir = self.output_dir(job_id);
        if tokio::fs::try_exists(&dir).await? {
            debug!("Removing previous output directory {}", dir.display());
            tokio::fs::remove_dir_all(&dir).await?;
        }
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Size of each tree
    pub fn usage(&self) -> Result<DiskUsage> {
        Ok(DiskUsage {
            input: dir_size_gib(&self.input)?,
            output: dir_size_gib(&self.output)?,
            scratch: dir_size_gib(&self.scratch)?,
            log: dir_size_gib(&self.log)?,
        })
    }
}

fn job_path(base: &Path, job_id: JobId) -> PathBuf {
    base.join(format!("{:03}", job_id / 1_000_000))
        .join(format!("{:03}", (job_id / 1000) % 1000))
        .join(job_id.to_string())
}

/// Create `dir` and its parents if missing
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

/// Total size of the files below `path`, in GiB
///
/// A path which does not exist has size zero.
pub fn dir_size_gib(path: &Path) -> Result<f64> {
    if !path.exists() {
        return Ok(0.0);
    }

    let mut bytes: u64 = 0;
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() {
            bytes += entry.metadata().map_err(std::io::Error::from)?.len();
        }
    }

    Ok(bytes as f64 / GIB)
}
