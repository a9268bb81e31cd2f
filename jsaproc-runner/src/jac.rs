//! Shared archive tree lookup
//!
//! Raw observations are mirrored under the data root:
//! - SCUBA-2: `raw/scuba2/<subarray>/<date>/<obsnum>/<name>.sdf`
//! - ACSIS: `raw/acsis/spectra/<date>/<obsnum>/<name>.sdf`

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use jsaproc_core::{ProcError, Result};
use regex::Regex;

const SUFFIX: &str = ".sdf";

static SCUBA2_RAW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(s[48][abcd])([0-9]{8})_([0-9]{5})_[0-9]{4}$")
        .expect("constant regex pattern is valid")
});

static ACSIS_RAW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^a([0-9]{8})_([0-9]{5})_[0-9]{2}_[0-9]{4}$")
        .expect("constant regex pattern is valid")
});

/// The shared archive tree rooted at `root`
#[derive(Debug, Clone)]
pub struct JacDataTree {
    root: PathBuf,
}

impl JacDataTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where a raw file would live in the tree, if its name is recognised
    pub fn path_for(&self, filename: &str) -> Option<PathBuf> {
        let file = format!("{}{}", filename, SUFFIX);

        if let Some(caps) = SCUBA2_RAW.captures(filename) {
            return Some(
                self.root
                    .join("raw/scuba2")
                    .join(&caps[1])
                    .join(&caps[2])
                    .join(&caps[3])
                    .join(file),
            );
        }

        if let Some(caps) = ACSIS_RAW.captures(filename) {
            return Some(
                self.root
                    .join("raw/acsis/spectra")
                    .join(&caps[1])
                    .join(&caps[2])
                    .join(file),
            );
        }

        None
    }

    /// Path of `filename` in the tree if the file exists there
    pub fn find(&self, filename: &str) -> Option<PathBuf> {
        self.path_for(filename).filter(|path| path.is_file())
    }

    /// Paths of all `filenames`, provided every one is in the tree
    pub fn get_jac_input_data(&self, filenames: &[String]) -> Result<Vec<PathBuf>> {
        filenames
            .iter()
            .map(|f| self.find(f).ok_or_else(|| ProcError::NotAtJac(f.clone())))
            .collect()
    }
}

/// Path of `filename` with the data suffix in `dir`, if it exists
pub fn file_in_dir(filename: &str, dir: &Path) -> Option<PathBuf> {
    let path = dir.join(format!("{}{}", filename, SUFFIX));
    path.is_file().then_some(path)
}
