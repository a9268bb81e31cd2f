//! HDS file validation with hdstrace

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use jsaproc_core::Result;
use tokio::process::Command;
use tracing::debug;

/// Checks that a downloaded file is readable
#[async_trait]
pub trait FileValidator: Send + Sync {
    async fn is_valid(&self, path: &Path) -> Result<bool>;
}

/// Runs `<starpath>/bin/hdstrace <file> QUIET`; exit status 0 means valid
#[derive(Debug, Clone)]
pub struct HdsTraceValidator {
    starpath: PathBuf,
    program: PathBuf,
}

impl HdsTraceValidator {
    pub fn new(starpath: impl Into<PathBuf>) -> Self {
        let starpath = starpath.into();
        let program = starpath.join("bin").join("hdstrace");
        Self { starpath, program }
    }

    /// Use a different hdstrace executable with the same Starlink tree
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl FileValidator for HdsTraceValidator {
    async fn is_valid(&self, path: &Path) -> Result<bool> {
        let status = Command::new(&self.program)
            .arg(path)
            .arg("QUIET")
            .env("ADAM_NOPROMPT", "1")
            .env("ADAM_EXIT", "1")
            .env("LD_LIBRARY_PATH", self.starpath.join("lib"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        debug!("hdstrace {} exited with {}", path.display(), status);
        Ok(status.success())
    }
}
