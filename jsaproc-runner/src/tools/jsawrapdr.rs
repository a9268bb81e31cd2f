//! Reduction with jsawrapdr
//!
//! jsawrapdr unpacks the inputs into a scratch directory, runs ORAC-DR and,
//! when persisting, copies acceptable products to the job's output
//! directory. Its stdout and stderr go to a timestamped log file in the
//! job's log directory.

use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use chrono::Utc;
use jsaproc_core::domain::job::JobId;
use jsaproc_core::{ProcError, Result};
use tokio::process::Command;
use tracing::{debug, info};

use crate::directories::{JobDirectories, ensure_dir};

/// What to reduce
#[derive(Debug, Clone)]
pub struct ReductionRequest {
    pub job_id: JobId,
    /// The input list written by the fetch stage
    pub manifest: PathBuf,
    pub mode: String,
    /// Recipe parameters, passed through as `--drparameters`
    pub parameters: String,
}

/// Runs the reduction pipeline for one job
#[async_trait]
pub trait Reducer: Send + Sync {
    /// Run the pipeline, returning the path of its log file
    async fn reduce(&self, request: &ReductionRequest) -> Result<PathBuf>;
}

/// The Starlink `jsawrapdr` wrapper script
#[derive(Debug, Clone)]
pub struct Jsawrapdr {
    starpath: PathBuf,
    program: PathBuf,
    directories: JobDirectories,
    cleanup: String,
    persist: bool,
    debug: bool,
}

impl Jsawrapdr {
    pub fn new(starpath: impl Into<PathBuf>, directories: JobDirectories) -> Self {
        let starpath = starpath.into();
        let program = starpath.join("Perl").join("bin").join("jsawrapdr");
        Self {
            starpath,
            program,
            directories,
            cleanup: "cadc".to_string(),
            persist: false,
            debug: false,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Cleanup policy: `cadc`, `none` or `all`
    pub fn with_cleanup(mut self, cleanup: impl Into<String>) -> Self {
        self.cleanup = cleanup.into();
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Command line arguments, without the program name
    pub fn arguments(
        &self,
        request: &ReductionRequest,
        scratch_dir: &Path,
        output_dir: &Path,
    ) -> Vec<String> {
        let mut args = vec![
            "--debugxfer".to_string(),
            format!("--outdir={}", scratch_dir.display()),
            format!("--inputs={}", request.manifest.display()),
            format!("--id=jac-{}", request.job_id),
            format!("--mode={}", request.mode),
            format!("--cleanup={}", self.cleanup),
            format!("--drparameters={}", request.parameters),
        ];

        if self.persist {
            args.push("-persist".to_string());
            args.push(format!("--transdir={}", output_dir.display()));
        }

        if self.debug {
            args.push("-debug".to_string());
        }

        args
    }

    /// Starlink variables overlaid on the inherited environment
    fn environment(&self, log_dir: &Path) -> Vec<(&'static str, OsString)> {
        let bin = self.starpath.join("bin");
        vec![
            ("STARLINK_DIR", self.starpath.clone().into_os_string()),
            ("PATH", prepend_path(bin.clone(), "PATH")),
            (
                "LD_LIBRARY_PATH",
                prepend_path(self.starpath.join("lib"), "LD_LIBRARY_PATH"),
            ),
            ("ORAC_DIR", bin.join("oracdr").join("src").into_os_string()),
            ("ORAC_LOGDIR", log_dir.as_os_str().to_os_string()),
            ("STAR_LOGIN", OsString::from("1")),
            ("CONVERT_DIR", bin.join("convert").into_os_string()),
        ]
    }
}

#[async_trait]
impl Reducer for Jsawrapdr {
    async fn reduce(&self, request: &ReductionRequest) -> Result<PathBuf> {
        let job_id = request.job_id;
        let timestamp = Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();

        let scratch_base = self.directories.scratch_dir(job_id);
        ensure_dir(&scratch_base).await?;
        let scratch_dir = unique_scratch_dir(&scratch_base, &timestamp)?;

        let log_dir = self.directories.log_dir(job_id);
        ensure_dir(&log_dir).await?;
        let (log, log_path) = open_log(&log_dir, &timestamp)?;

        let output_dir = self.directories.reset_output_dir(job_id).await?;

        let args = self.arguments(request, &scratch_dir, &output_dir);
        info!(
            "Running jsawrapdr for job {} (log {})",
            job_id,
            log_path.display()
        );
        debug!("jsawrapdr arguments: {:?}", args);

        let status = Command::new(&self.program)
            .args(&args)
            .envs(self.environment(&log_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log))
            .status()
            .await?;

        if !status.success() {
            return Err(ProcError::ExternalProcess {
                program: "jsawrapdr".to_string(),
                exit_code: status.code().unwrap_or(-1),
                job_id,
                log: log_path,
            });
        }

        Ok(log_path)
    }
}

fn prepend_path(dir: PathBuf, var: &str) -> OsString {
    let mut value = dir.into_os_string();
    if let Some(existing) = std::env::var_os(var).filter(|v| !v.is_empty()) {
        value.push(":");
        value.push(existing);
    }
    value
}

/// `<base>/<timestamp>`, or a uniquely suffixed sibling if that is taken
fn unique_scratch_dir(base: &Path, timestamp: &str) -> Result<PathBuf> {
    let dir = base.join(timestamp);
    if dir.exists() {
        let dir = tempfile::Builder::new()
            .prefix(timestamp)
            .tempdir_in(base)?
            .keep();
        return Ok(dir);
    }
    std::fs::create_dir(&dir)?;
    Ok(dir)
}

/// `<log_dir>/jsawrapdr_<timestamp>.log`, or a uniquely suffixed one
fn open_log(log_dir: &Path, timestamp: &str) -> Result<(File, PathBuf)> {
    let path = log_dir.join(format!("jsawrapdr_{}.log", timestamp));
    if path.exists() {
        let (file, path) = tempfile::Builder::new()
            .prefix(&format!("jsawrapdr_{}", timestamp))
            .suffix(".log")
            .tempfile_in(log_dir)?
            .keep()
            .map_err(|e| e.error)?;
        return Ok((file, path));
    }
    Ok((File::create(&path)?, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(manifest: &Path) -> ReductionRequest {
        ReductionRequest {
            job_id: 42,
            manifest: manifest.to_path_buf(),
            mode: "obs".to_string(),
            parameters: "REDUCE_SCAN_JSA_PUBLIC".to_string(),
        }
    }

    #[test]
    fn test_arguments() {
        let root = TempDir::new().unwrap();
        let tool = Jsawrapdr::new("/star", JobDirectories::new(root.path()));
        let args = tool.arguments(
            &request(Path::new("/in/input_files_job.lis")),
            Path::new("/scratch/42/ts"),
            Path::new("/out/42"),
        );
        assert_eq!(
            args,
            vec![
                "--debugxfer",
                "--outdir=/scratch/42/ts",
                "--inputs=/in/input_files_job.lis",
                "--id=jac-42",
                "--mode=obs",
                "--cleanup=cadc",
                "--drparameters=REDUCE_SCAN_JSA_PUBLIC",
            ]
        );
    }

    #[test]
    fn test_persist_and_debug_arguments() {
        let root = TempDir::new().unwrap();
        let tool = Jsawrapdr::new("/star", JobDirectories::new(root.path()))
            .with_cleanup("none")
            .with_persist(true)
            .with_debug(true);
        let args = tool.arguments(
            &request(Path::new("/in/x.lis")),
            Path::new("/scratch"),
            Path::new("/out/42"),
        );
        assert!(args.contains(&"--cleanup=none".to_string()));
        assert_eq!(
            &args[args.len() - 3..],
            ["-persist", "--transdir=/out/42", "-debug"]
        );
    }

    #[test]
    fn test_environment_overlay() {
        let root = TempDir::new().unwrap();
        let tool = Jsawrapdr::new("/star", JobDirectories::new(root.path()));
        let env = tool.environment(Path::new("/log/42"));
        let get = |key: &str| {
            env.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string_lossy().into_owned())
                .unwrap()
        };
        assert_eq!(get("STARLINK_DIR"), "/star");
        assert!(get("PATH").starts_with("/star/bin"));
        assert!(get("LD_LIBRARY_PATH").starts_with("/star/lib"));
        assert_eq!(get("ORAC_DIR"), "/star/bin/oracdr/src");
        assert_eq!(get("ORAC_LOGDIR"), "/log/42");
        assert_eq!(get("STAR_LOGIN"), "1");
        assert_eq!(get("CONVERT_DIR"), "/star/bin/convert");
    }

    #[test]
    fn test_log_name_collision_gets_unique_file() {
        let dir = TempDir::new().unwrap();
        let (_, first) = open_log(dir.path(), "2020-01-01_00-00-00").unwrap();
        let (_, second) = open_log(dir.path(), "2020-01-01_00-00-00").unwrap();
        assert_eq!(
            first.file_name().unwrap(),
            "jsawrapdr_2020-01-01_00-00-00.log"
        );
        assert_ne!(first, second);
        let name = second.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("jsawrapdr_2020-01-01_00-00-00"));
        assert!(name.ends_with(".log"));
    }

    #[test]
    fn test_scratch_name_collision_gets_unique_dir() {
        let dir = TempDir::new().unwrap();
        let first = unique_scratch_dir(dir.path(), "ts").unwrap();
        let second = unique_scratch_dir(dir.path(), "ts").unwrap();
        assert_eq!(first, dir.path().join("ts"));
        assert_ne!(first, second);
        assert!(second.is_dir());
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("jsawrapdr");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_output_captured_in_log() {
            let root = TempDir::new().unwrap();
            let program = script(root.path(), r#"echo "args: $*"; echo "login=$STAR_LOGIN" >&2"#);
            let dirs = JobDirectories::new(root.path());
            let tool = Jsawrapdr::new(root.path().join("star"), dirs.clone()).with_program(program);

            let log = tool.reduce(&request(Path::new("/in/x.lis"))).await.unwrap();

            assert!(log.starts_with(dirs.log_dir(42)));
            let text = std::fs::read_to_string(&log).unwrap();
            assert!(text.contains("--id=jac-42"));
            assert!(text.contains("--inputs=/in/x.lis"));
            assert!(text.contains("login=1"));
            assert!(dirs.output_dir(42).is_dir());
        }

        #[tokio::test]
        async fn test_non_zero_exit_is_external_process_error() {
            let root = TempDir::new().unwrap();
            let program = script(root.path(), "echo failing; exit 3");
            let dirs = JobDirectories::new(root.path());
            let tool = Jsawrapdr::new(root.path().join("star"), dirs).with_program(program);

            let err = tool
                .reduce(&request(Path::new("/in/x.lis")))
                .await
                .unwrap_err();

            assert!(err.to_string().contains("jsawrapdr exited with non zero status"));
            match err {
                ProcError::ExternalProcess {
                    exit_code,
                    job_id,
                    log,
                    ..
                } => {
                    assert_eq!(exit_code, 3);
                    assert_eq!(job_id, 42);
                    assert!(std::fs::read_to_string(log).unwrap().contains("failing"));
                }
                other => panic!("unexpected error {:?}", other),
            }
        }
    }
}
