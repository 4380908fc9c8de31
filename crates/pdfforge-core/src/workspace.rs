//! Per-job workspaces
//!
//! Every job owns a directory under the workspace root, named by a
//! timestamp plus random suffix and created with a non-recursive
//! `create_dir` so that two jobs can never claim the same one. Inputs are
//! staged under `inputs/` with sanitised names; the artifact sits at the
//! top of the job directory.
//!
//! ```text
//! <root>/
//!   2024-05-01_12-30-05.123_9f1c2a4b7d3e/
//!     inputs/
//!       000-report.pdf
//!       001-scan.png
//!     merged.pdf
//! ```

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::Local;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AssembleError;

const INPUTS_DIR: &str = "inputs";
const MAX_ALLOCATION_ATTEMPTS: usize = 8;
const MAX_NAME_LEN: usize = 128;
const MAX_JOB_ID_LEN: usize = 64;

/// What happens to a job directory once its result has been handed back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retention {
    /// Remove everything
    #[default]
    Dispose,
    /// Remove staged inputs, keep the artifact for retrieval by job id
    KeepArtifact,
}

/// Root directory under which job directories are allocated
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, AssembleError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            AssembleError::serialization("open workspace", format!("{}: {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh, exclusively owned job directory
    pub fn open_job(&self) -> Result<Job, AssembleError> {
        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let id = new_job_id();
            let dir = self.root.join(&id);
            match fs::create_dir(&dir) {
                Ok(()) => {
                    let inputs_dir = dir.join(INPUTS_DIR);
                    if let Err(e) = fs::create_dir(&inputs_dir) {
                        let _ = fs::remove_dir_all(&dir);
                        return Err(AssembleError::serialization("open job", e));
                    }
                    debug!(job_id = %id, "job directory allocated");
                    return Ok(Job {
                        id,
                        dir,
                        inputs_dir,
                        inputs: Vec::new(),
                        artifact: None,
                        disposed: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(AssembleError::serialization("open job", e)),
            }
        }
        Err(AssembleError::serialization(
            "open job",
            "could not allocate a unique job directory",
        ))
    }

    /// Path of a retained artifact, looked up by job id
    pub fn artifact_for(&self, job_id: &str) -> Option<PathBuf> {
        if !is_valid_job_id(job_id) {
            return None;
        }
        let entries = fs::read_dir(self.root.join(job_id)).ok()?;
        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .find(|path| {
                path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("pdf")
            })
    }
}

/// One request's unit of work and filesystem scope.
///
/// A job dropped without [`Job::dispose`] (an early return or a panic
/// unwinding through its owner) removes its whole directory.
#[derive(Debug)]
pub struct Job {
    id: String,
    dir: PathBuf,
    inputs_dir: PathBuf,
    inputs: Vec<InputHandle>,
    artifact: Option<PathBuf>,
    disposed: bool,
}

impl Job {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn inputs(&self) -> &[InputHandle] {
        &self.inputs
    }

    /// Write an uploaded buffer into the job's input directory
    pub fn stage(&mut self, name: &str, bytes: &[u8]) -> Result<InputHandle, AssembleError> {
        let sanitized = sanitize_input_name(name)?;
        let staged_name = format!("{:03}-{}", self.inputs.len(), sanitized);
        let path = self.inputs_dir.join(&staged_name);

        if path.parent() != Some(self.inputs_dir.as_path()) {
            return Err(AssembleError::invalid_name(name, "escapes the job workspace"));
        }

        fs::write(&path, bytes)
            .map_err(|e| AssembleError::serialization("stage input", e))?;

        let handle = InputHandle {
            original_name: name.to_string(),
            staged_name,
            path,
            size_bytes: bytes.len() as u64,
        };
        debug!(
            job_id = %self.id,
            input = %handle.staged_name,
            size_bytes = handle.size_bytes,
            "input staged"
        );
        self.inputs.push(handle.clone());
        Ok(handle)
    }

    /// Reserve the artifact path for this job
    pub fn finalize(&mut self, file_name: &str) -> Result<PathBuf, AssembleError> {
        let file_name = sanitize_input_name(file_name)?;
        let path = self.dir.join(file_name);
        self.artifact = Some(path.clone());
        Ok(path)
    }

    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }

    /// Remove staged inputs and, unless kept, the whole job directory.
    /// Failures are logged, never returned: disposal runs after the result
    /// is already decided.
    pub fn dispose(mut self, retention: Retention) {
        self.release(retention);
    }

    fn release(&mut self, retention: Retention) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        let keep = retention == Retention::KeepArtifact
            && self.artifact.as_deref().map(Path::exists).unwrap_or(false);

        let (target, result) = if keep {
            (&self.inputs_dir, fs::remove_dir_all(&self.inputs_dir))
        } else {
            (&self.dir, fs::remove_dir_all(&self.dir))
        };

        match result {
            Ok(()) => debug!(job_id = %self.id, retained = keep, "job disposed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                job_id = %self.id,
                path = %target.display(),
                "failed to dispose job: {}",
                e
            ),
        }
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        if !self.disposed {
            warn!(job_id = %self.id, "job dropped without disposal, removing it");
            self.release(Retention::Dispose);
        }
    }
}

/// A staged upload, owned by its job
#[derive(Debug, Clone)]
pub struct InputHandle {
    original_name: String,
    staged_name: String,
    path: PathBuf,
    size_bytes: u64,
}

impl InputHandle {
    /// Client-supplied name; only used for type detection and messages
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn staged_name(&self) -> &str {
        &self.staged_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn read(&self) -> Result<Vec<u8>, AssembleError> {
        fs::read(&self.path).map_err(|e| AssembleError::unreadable(&self.original_name, e))
    }
}

fn new_job_id() -> String {
    let entropy = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}",
        Local::now().format("%Y-%m-%d_%H-%M-%S%.3f"),
        &entropy[..12]
    )
}

/// Whether `id` could have been produced by [`new_job_id`]
pub fn is_valid_job_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_JOB_ID_LEN
        && !id.starts_with('.')
        && !id.contains("..")
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Reduce a client file name to a safe single path component.
///
/// Names that try to leave the directory (`..`, absolute paths) are
/// rejected outright; leading directories are dropped and any character
/// outside `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_input_name(raw: &str) -> Result<String, AssembleError> {
    if raw.trim().is_empty() {
        return Err(AssembleError::invalid_name(raw, "empty file name"));
    }
    if raw.contains('\0') {
        return Err(AssembleError::invalid_name(raw, "contains NUL byte"));
    }

    let normalized = raw.replace('\\', "/");
    let path = Path::new(&normalized);
    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(AssembleError::invalid_name(raw, "parent directory reference"))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(AssembleError::invalid_name(raw, "absolute path"))
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    let last = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AssembleError::invalid_name(raw, "no file name"))?;

    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        return Err(AssembleError::invalid_name(raw, "no usable characters"));
    }

    // Keep the tail so the extension survives
    let cleaned = if cleaned.len() > MAX_NAME_LEN {
        &cleaned[cleaned.len() - MAX_NAME_LEN..]
    } else {
        cleaned
    };

    Ok(cleaned.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashSet;

    fn workspace() -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path().join("processed")).unwrap();
        (dir, ws)
    }

    #[test]
    fn test_sanitize_keeps_plain_names() {
        assert_eq!(sanitize_input_name("report.pdf").unwrap(), "report.pdf");
        assert_eq!(
            sanitize_input_name("My Scan (1).PNG").unwrap(),
            "My_Scan__1_.PNG"
        );
    }

    #[test]
    fn test_sanitize_drops_leading_directories() {
        assert_eq!(sanitize_input_name("uploads/a/b.pdf").unwrap(), "b.pdf");
        assert_eq!(sanitize_input_name("C:\\Users\\x\\b.pdf").unwrap(), "b.pdf");
        assert_eq!(sanitize_input_name(".hidden.pdf").unwrap(), "hidden.pdf");
    }

    #[test]
    fn test_sanitize_rejects_traversal() {
        for name in [
            "../etc/passwd",
            "a/../../b.pdf",
            "..\\..\\win.ini",
            "/etc/passwd",
            "..",
            "",
        ] {
            let err = sanitize_input_name(name).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInputName, "{:?}", name);
        }
    }

    #[test]
    fn test_sanitize_truncates_keeping_extension() {
        let long = format!("{}.pdf", "a".repeat(300));
        let cleaned = sanitize_input_name(&long).unwrap();
        assert_eq!(cleaned.len(), MAX_NAME_LEN);
        assert!(cleaned.ends_with(".pdf"));
    }

    #[test]
    fn test_jobs_get_distinct_directories() {
        let (_guard, ws) = workspace();
        let jobs: Vec<Job> = (0..50).map(|_| ws.open_job().unwrap()).collect();
        let ids: HashSet<&str> = jobs.iter().map(|j| j.id()).collect();
        assert_eq!(ids.len(), 50);
        assert!(jobs.iter().all(|j| j.dir().is_dir()));
        assert!(jobs.iter().all(|j| is_valid_job_id(j.id())));
    }

    #[test]
    fn test_concurrent_job_allocation_never_collides() {
        let (_guard, ws) = workspace();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ws = ws.clone();
                std::thread::spawn(move || {
                    (0..20)
                        .map(|_| ws.open_job().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let jobs: Vec<Job> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        let ids: HashSet<&str> = jobs.iter().map(|j| j.id()).collect();
        assert_eq!(ids.len(), 160);
        assert!(jobs.iter().all(|j| j.dir().is_dir()));
    }

    #[test]
    fn test_stage_writes_inside_inputs() {
        let (_guard, ws) = workspace();
        let mut job = ws.open_job().unwrap();

        let a = job.stage("report.pdf", b"one").unwrap();
        let b = job.stage("report.pdf", b"two").unwrap();

        assert_eq!(a.staged_name(), "000-report.pdf");
        assert_eq!(b.staged_name(), "001-report.pdf");
        assert!(a.path().starts_with(job.dir()));
        assert_eq!(a.read().unwrap(), b"one");
        assert_eq!(b.size_bytes(), 3);
        assert_eq!(job.inputs().len(), 2);
    }

    #[test]
    fn test_stage_rejects_escaping_name() {
        let (_guard, ws) = workspace();
        let mut job = ws.open_job().unwrap();
        let err = job.stage("../../outside.pdf", b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInputName);
        assert!(!ws.root().join("outside.pdf").exists());
    }

    #[test]
    fn test_dispose_removes_everything_by_default() {
        let (_guard, ws) = workspace();
        let mut job = ws.open_job().unwrap();
        job.stage("a.pdf", b"x").unwrap();
        let dir = job.dir().to_path_buf();

        job.dispose(Retention::Dispose);
        assert!(!dir.exists());
    }

    #[test]
    fn test_dispose_can_keep_artifact() {
        let (_guard, ws) = workspace();
        let mut job = ws.open_job().unwrap();
        let input = job.stage("a.pdf", b"x").unwrap();
        let artifact = job.finalize("merged.pdf").unwrap();
        fs::write(&artifact, b"%PDF-1.7").unwrap();
        let id = job.id().to_string();

        job.dispose(Retention::KeepArtifact);

        assert!(!input.path().exists());
        assert_eq!(ws.artifact_for(&id), Some(artifact));
    }

    #[test]
    fn test_keep_without_artifact_removes_job() {
        let (_guard, ws) = workspace();
        let job = ws.open_job().unwrap();
        let dir = job.dir().to_path_buf();
        job.dispose(Retention::KeepArtifact);
        assert!(!dir.exists());
    }

    #[test]
    fn test_dropped_job_is_removed() {
        let (_guard, ws) = workspace();
        let mut job = ws.open_job().unwrap();
        job.stage("a.pdf", b"x").unwrap();
        let dir = job.dir().to_path_buf();

        drop(job);

        assert!(!dir.exists());
        assert_eq!(fs::read_dir(ws.root()).unwrap().count(), 0);
    }

    #[test]
    fn test_panicking_job_is_removed() {
        let (_guard, ws) = workspace();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut job = ws.open_job().unwrap();
            job.stage("a.pdf", b"x").unwrap();
            job.finalize("merged.pdf").unwrap();
            panic!("assembly blew up");
        }));

        assert!(result.is_err());
        assert_eq!(fs::read_dir(ws.root()).unwrap().count(), 0);
    }

    #[test]
    fn test_disposed_job_with_kept_artifact_survives_drop() {
        let (_guard, ws) = workspace();
        let mut job = ws.open_job().unwrap();
        let artifact = job.finalize("split.pdf").unwrap();
        fs::write(&artifact, b"%PDF-1.7").unwrap();

        job.dispose(Retention::KeepArtifact);

        assert!(artifact.exists());
    }

    #[test]
    fn test_artifact_lookup_rejects_bad_ids() {
        let (_guard, ws) = workspace();
        assert_eq!(ws.artifact_for("../etc"), None);
        assert_eq!(ws.artifact_for(""), None);
        assert_eq!(ws.artifact_for("2024-01-01_00-00-00.000_abc"), None);
    }
}
