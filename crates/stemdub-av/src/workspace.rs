//! Staging-area management for pipeline execution.
//!
//! A [`Workspace`] owns the five staging directories the pipeline passes
//! artifacts through. In the shared layout they sit directly under a root and
//! are reset at the start of every job; [`Workspace::scoped`] derives a
//! per-job layout that lives in its own subtree instead.

use std::path::{Path, PathBuf};

use stemdub_core::JobId;

/// The staging directories, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StagingDir {
    /// Transient cookie jars handed to the downloader.
    Cookies,
    /// Raw downloaded videos.
    SourceVideo,
    /// Extracted waveforms.
    Audio,
    /// Per-input stem directories written by the separation model.
    Separated,
    /// Final videos, served to clients.
    Output,
}

impl StagingDir {
    /// All five directories.
    pub const ALL: [StagingDir; 5] = [
        StagingDir::Cookies,
        StagingDir::SourceVideo,
        StagingDir::Audio,
        StagingDir::Separated,
        StagingDir::Output,
    ];

    /// The directories cleared unconditionally at job start.
    pub const WORKING: [StagingDir; 4] = [
        StagingDir::Cookies,
        StagingDir::SourceVideo,
        StagingDir::Audio,
        StagingDir::Separated,
    ];

    /// Fixed directory name under the workspace root.
    pub fn dir_name(self) -> &'static str {
        match self {
            StagingDir::Cookies => "temp_cookie",
            StagingDir::SourceVideo => "temp_video",
            StagingDir::Audio => "temp_audio",
            StagingDir::Separated => "temp_audio_converted",
            StagingDir::Output => "output",
        }
    }
}

/// Directory (under the root) that holds per-job working trees.
const JOBS_DIR: &str = "jobs";

/// Set of staging directories.
///
/// # Example
///
/// ```no_run
/// use stemdub_av::{StagingDir, Workspace};
///
/// let workspace = Workspace::new("/srv/stemdub");
/// workspace.reset_for_job(true)?;
/// let videos = workspace.path(StagingDir::SourceVideo);
/// # Ok::<(), stemdub_core::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    working_root: PathBuf,
    output_dir: PathBuf,
    output_prefix: Option<String>,
}

impl Workspace {
    /// Shared layout: all five directories directly under `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            working_root: root.to_path_buf(),
            output_dir: root.join(StagingDir::Output.dir_name()),
            output_prefix: None,
        }
    }

    /// Per-job layout derived from a shared workspace.
    ///
    /// Working directories live under `<root>/jobs/<id>/` and output goes to
    /// `<root>/output/<id>/`, so published files stay reachable under the
    /// shared output root after the working tree is torn down.
    pub fn scoped(&self, job_id: JobId) -> Self {
        let key = job_id.simple();
        Self {
            working_root: self.working_root.join(JOBS_DIR).join(&key),
            output_dir: self.output_dir.join(&key),
            output_prefix: Some(key),
        }
    }

    /// Path of a staging directory.
    pub fn path(&self, dir: StagingDir) -> PathBuf {
        match dir {
            StagingDir::Output => self.output_dir.clone(),
            other => self.working_root.join(other.dir_name()),
        }
    }

    /// Sub-path of output files relative to the shared output root
    /// (`Some(<id>)` for a scoped workspace).
    pub fn output_prefix(&self) -> Option<&str> {
        self.output_prefix.as_deref()
    }

    /// Create all five directories if absent.
    pub fn ensure_all(&self) -> stemdub_core::Result<()> {
        for dir in StagingDir::ALL {
            std::fs::create_dir_all(self.path(dir))?;
        }
        Ok(())
    }

    /// Delete a directory tree and recreate it empty.
    ///
    /// Does nothing when the directory does not exist. Any other deletion
    /// failure is returned.
    pub fn clear(&self, dir: StagingDir) -> stemdub_core::Result<()> {
        let path = self.path(dir);
        match std::fs::remove_dir_all(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        std::fs::create_dir_all(&path)?;
        Ok(())
    }

    /// Bring the workspace to a known-empty state for a new job.
    ///
    /// Creates every directory, clears the four working directories, and
    /// clears the output directory too when `include_output` is set. Anything
    /// a previous job left behind is gone afterwards.
    pub fn reset_for_job(&self, include_output: bool) -> stemdub_core::Result<()> {
        self.ensure_all()?;
        for dir in StagingDir::WORKING {
            self.clear(dir)?;
        }
        if include_output {
            self.clear(StagingDir::Output)?;
        }
        tracing::debug!(
            "workspace reset at {} (output cleared: {include_output})",
            self.working_root.display()
        );
        Ok(())
    }

    /// Names of the regular files in a staging directory, sorted.
    ///
    /// A missing directory lists as empty.
    pub fn list_files(&self, dir: StagingDir) -> stemdub_core::Result<Vec<String>> {
        let path = self.path(dir);
        let entries = match std::fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Remove every per-job working tree under `<root>/jobs/`.
    pub fn remove_job_trees(&self) -> stemdub_core::Result<()> {
        match std::fs::remove_dir_all(self.working_root.join(JOBS_DIR)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Keep the `keep` most recently modified per-job output directories and
    /// delete the rest. Returns how many were removed.
    pub fn prune_job_outputs(&self, keep: usize) -> stemdub_core::Result<usize> {
        let entries = match std::fs::read_dir(&self.output_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push((entry.metadata()?.modified()?, entry.path()));
            }
        }
        dirs.sort_by(|a, b| b.0.cmp(&a.0));

        let mut removed = 0;
        for (_, path) in dirs.into_iter().skip(keep) {
            match std::fs::remove_dir_all(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    /// Remove the working directories of a scoped workspace.
    ///
    /// Output is kept. A shared workspace is left untouched since its working
    /// root is the root of everything.
    pub fn teardown(&self) -> stemdub_core::Result<()> {
        if self.output_prefix.is_none() {
            return Ok(());
        }
        match std::fs::remove_dir_all(&self.working_root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
