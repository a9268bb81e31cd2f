//! Fakes for the runner tests

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use jsaproc_client::RemoteArchive;
use jsaproc_core::domain::job::{Location, NewJob};
use jsaproc_core::{ProcError, Result};
use jsaproc_orchestrator::MemoryJobStore;
use tempfile::TempDir;

use crate::directories::JobDirectories;
use crate::jac::JacDataTree;
use crate::service::InputAssembler;
use crate::stage::JobOrchestrator;
use crate::tools::{FileValidator, ReductionRequest, Reducer};

/// Archive writing `content` for each requested file
pub struct FakeArchive {
    content: &'static [u8],
    fetched: Mutex<Vec<String>>,
}

impl FakeArchive {
    pub fn new(content: &'static [u8]) -> Arc<Self> {
        Arc::new(Self {
            content,
            fetched: Mutex::new(Vec::new()),
        })
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteArchive for FakeArchive {
    async fn fetch(&self, filename: &str, directory: &Path) -> Result<PathBuf> {
        self.fetched.lock().unwrap().push(filename.to_string());
        let path = directory.join(format!("{}.sdf", filename));
        std::fs::write(&path, self.content)?;
        Ok(path)
    }
}

/// Files are valid when they start with `HDS`
pub struct FakeValidator;

#[async_trait]
impl FileValidator for FakeValidator {
    async fn is_valid(&self, path: &Path) -> Result<bool> {
        Ok(std::fs::read(path)?.starts_with(b"HDS"))
    }
}

/// Reducer writing a fixed set of products to the output directory
pub struct FakeReducer {
    directories: JobDirectories,
    products: Vec<&'static str>,
    exit_code: i32,
    requests: Mutex<Vec<ReductionRequest>>,
}

impl FakeReducer {
    pub fn requests(&self) -> Vec<ReductionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Reducer for FakeReducer {
    async fn reduce(&self, request: &ReductionRequest) -> Result<PathBuf> {
        self.requests.lock().unwrap().push(request.clone());

        let log_dir = self.directories.log_dir(request.job_id);
        std::fs::create_dir_all(&log_dir)?;
        let log = log_dir.join("jsawrapdr_test.log");
        std::fs::write(&log, b"reducing")?;

        if self.exit_code != 0 {
            return Err(ProcError::ExternalProcess {
                program: "jsawrapdr".to_string(),
                exit_code: self.exit_code,
                job_id: request.job_id,
                log,
            });
        }

        let output_dir = self.directories.reset_output_dir(request.job_id).await?;
        for product in &self.products {
            std::fs::write(output_dir.join(product), b"product")?;
        }
        Ok(log)
    }
}

pub struct Harness {
    pub _root: TempDir,
    pub store: Arc<MemoryJobStore>,
    pub tree: JacDataTree,
    pub directories: JobDirectories,
    pub archive: Arc<FakeArchive>,
    pub reducer: Arc<FakeReducer>,
    pub orchestrator: JobOrchestrator,
}

impl Harness {
    pub fn new(archive_content: &'static [u8]) -> Self {
        Self::with_reducer(archive_content, vec!["jcmts20200101_00001_850_reduced001.fits"], 0)
    }

    pub fn with_reducer(
        archive_content: &'static [u8],
        products: Vec<&'static str>,
        exit_code: i32,
    ) -> Self {
        let root = TempDir::new().unwrap();
        let tree = JacDataTree::new(root.path().join("jcmtdata"));
        let directories = JobDirectories::new(&root.path().join("work"));
        let store = Arc::new(MemoryJobStore::new());
        let archive = FakeArchive::new(archive_content);
        let reducer = Arc::new(FakeReducer {
            directories: directories.clone(),
            products,
            exit_code,
            requests: Mutex::new(Vec::new()),
        });

        let assembler = InputAssembler::new(
            tree.clone(),
            directories.clone(),
            archive.clone(),
            Arc::new(FakeValidator),
        );
        let orchestrator =
            JobOrchestrator::new(store.clone(), assembler, reducer.clone(), "test-runner");

        Self {
            _root: root,
            store,
            tree,
            directories,
            archive,
            reducer,
            orchestrator,
        }
    }

    /// Place a raw file in the shared tree
    pub fn put_in_tree(&self, filename: &str) -> PathBuf {
        let path = self.tree.path_for(filename).unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"HDS").unwrap();
        path
    }
}

pub fn new_job(tag: &str, priority: i32, input_files: &[&str]) -> NewJob {
    NewJob {
        tag: tag.to_string(),
        location: Location::Jac,
        mode: "obs".to_string(),
        parameters: "REDUCE_SCAN".to_string(),
        task: "jcmt-nightly".to_string(),
        priority,
        parents: Vec::new(),
        input_files: input_files.iter().map(|f| f.to_string()).collect(),
        tilelist: None,
    }
}
