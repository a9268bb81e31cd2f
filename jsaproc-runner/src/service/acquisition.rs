//! Input data assembly
//!
//! For every input file the first hit wins:
//! 1. the shared archive tree
//! 2. the job's input directory
//! 3. a download from the remote archive into the input directory, which is
//!    then validated; invalid downloads are moved to `invalid/` and fail the
//!    whole assembly
//!
//! The resolved paths are written, one per line, to the input list which the
//! reduction pipeline reads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use jsaproc_client::RemoteArchive;
use jsaproc_core::domain::job::JobId;
use jsaproc_core::{ProcError, Result};
use tracing::{debug, info, warn};

use crate::directories::{JobDirectories, ensure_dir};
use crate::jac::{JacDataTree, file_in_dir};
use crate::tools::FileValidator;

/// Name of the input list written to each job's input directory
pub const INPUT_LIST_NAME: &str = "input_files_job.lis";

/// Subdirectory of the input directory receiving files which fail validation
pub const INVALID_DIR_NAME: &str = "invalid";

pub struct InputAssembler {
    tree: JacDataTree,
    directories: JobDirectories,
    archive: Arc<dyn RemoteArchive>,
    validator: Arc<dyn FileValidator>,
}

impl InputAssembler {
    pub fn new(
        tree: JacDataTree,
        directories: JobDirectories,
        archive: Arc<dyn RemoteArchive>,
        validator: Arc<dyn FileValidator>,
    ) -> Self {
        Self {
            tree,
            directories,
            archive,
            validator,
        }
    }

    pub fn directories(&self) -> &JobDirectories {
        &self.directories
    }

    /// Location of the input list for a job
    pub fn input_list_path(&self, job_id: JobId) -> PathBuf {
        self.directories.input_dir(job_id).join(INPUT_LIST_NAME)
    }

    /// Make every input file available and write the input list
    ///
    /// `filenames` carry neither path nor suffix. Returns the path of the
    /// input list.
    pub async fn assemble(&self, job_id: JobId, filenames: &[String]) -> Result<PathBuf> {
        let input_dir = self.directories.input_dir(job_id);
        ensure_dir(&input_dir).await?;

        let mut paths = Vec::with_capacity(filenames.len());
        for filename in filenames {
            paths.push(self.locate(filename, &input_dir).await?);
        }

        self.write_input_list(job_id, &paths).await
    }

    async fn locate(&self, filename: &str, input_dir: &Path) -> Result<PathBuf> {
        if let Some(path) = self.tree.find(filename) {
            debug!("{} found in shared tree", filename);
            return Ok(path);
        }

        if let Some(path) = file_in_dir(filename, input_dir) {
            debug!("{} already in input directory", filename);
            return Ok(path);
        }

        info!("Fetching {} from the archive", filename);
        let path = self.archive.fetch(filename, input_dir).await?;

        if !self.validator.is_valid(&path).await? {
            let moved_to = quarantine(&path, input_dir).await?;
            warn!(
                "Downloaded {} is not valid, moved to {}",
                path.display(),
                moved_to.display()
            );
            return Err(ProcError::Validation { path, moved_to });
        }

        Ok(path)
    }

    /// Write the input list, replacing any previous one
    pub async fn write_input_list(&self, job_id: JobId, paths: &[PathBuf]) -> Result<PathBuf> {
        let input_dir = self.directories.input_dir(job_id);
        ensure_dir(&input_dir).await?;

        let mut contents = String::new();
        for path in paths {
            contents.push_str(&path.to_string_lossy());
            contents.push('\n');
        }

        let list = input_dir.join(INPUT_LIST_NAME);
        tokio::fs::write(&list, contents).await?;
        Ok(list)
    }
}

async fn quarantine(path: &Path, input_dir: &Path) -> Result<PathBuf> {
    let invalid_dir = input_dir.join(INVALID_DIR_NAME);
    ensure_dir(&invalid_dir).await?;

    let name = path
        .file_name()
        .ok_or_else(|| ProcError::InvalidArgument(format!("{} has no file name", path.display())))?;
    let moved_to = invalid_dir.join(name);
    tokio::fs::rename(path, &moved_to).await?;
    Ok(moved_to)
}

/// Names of the files currently in a job's output directory
///
/// Whatever the directory holds is taken to be the job's products.
/// Subdirectories are not products and are skipped.
pub async fn list_output_files(output_dir: &Path) -> Result<Vec<String>> {
    let metadata = match tokio::fs::metadata(output_dir).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ProcError::NotFound(format!(
                "output directory {}",
                output_dir.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    if !metadata.is_dir() {
        return Err(ProcError::InvalidArgument(format!(
            "{} is not a directory",
            output_dir.display()
        )));
    }

    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(output_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    files.sort();
    Ok(files)
}
