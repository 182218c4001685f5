//! Job orchestration: workspace lifecycle, stage sequencing, supersession.

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use stemdub_av::{StagingDir, Workspace};
use stemdub_core::config::{Config, WorkspaceMode};
use stemdub_core::{Error, JobId, Result};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use super::job::{JobInfo, JobReport, JobRequest, JobState, OutputVideo, Stage};
use super::toolchain::MediaToolchain;

/// The in-flight job for a resource key.
struct ActiveJob {
    id: JobId,
    cancel: CancellationToken,
    finished: watch::Receiver<bool>,
}

/// Runs conversion jobs one URL at a time.
///
/// In shared mode all jobs use the same five directories and are serialized
/// by a lock. In isolated mode each job gets its own subtree and jobs run
/// concurrently. In both modes a new request for a URL that already has a
/// job in flight cancels that job and waits for it to wind down first.
pub struct JobRunner {
    toolchain: Arc<dyn MediaToolchain>,
    workspace: Workspace,
    mode: WorkspaceMode,
    keep_jobs: usize,
    lock: Mutex<()>,
    active: DashMap<String, ActiveJob>,
    jobs: RwLock<HashMap<JobId, JobInfo>>,
    shutdown: CancellationToken,
}

impl JobRunner {
    pub fn new(toolchain: Arc<dyn MediaToolchain>, workspace: Workspace, mode: WorkspaceMode) -> Self {
        Self {
            toolchain,
            workspace,
            mode,
            keep_jobs: 0,
            lock: Mutex::new(()),
            active: DashMap::new(),
            jobs: RwLock::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn from_config(toolchain: Arc<dyn MediaToolchain>, config: &Config) -> Self {
        Self::new(
            toolchain,
            Workspace::new(&config.workspace.root),
            config.workspace.mode,
        )
        .with_retention(config.workspace.keep_jobs)
    }

    /// Keep at most `keep_jobs` published job outputs in isolated mode
    /// (`0` keeps all of them).
    pub fn with_retention(mut self, keep_jobs: usize) -> Self {
        self.keep_jobs = keep_jobs;
        self
    }

    pub fn toolchain(&self) -> &Arc<dyn MediaToolchain> {
        &self.toolchain
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn mode(&self) -> WorkspaceMode {
        self.mode
    }

    /// Create the staging directories. With `reset`, everything a previous
    /// run left behind is removed first, including published output and, in
    /// isolated mode, stale per-job working trees.
    pub fn prepare(&self, reset: bool) -> Result<()> {
        if !reset {
            return self.workspace.ensure_all();
        }
        tracing::info!("Resetting workspace at startup");
        if self.mode == WorkspaceMode::Isolated {
            self.workspace.remove_job_trees()?;
        }
        self.workspace.reset_for_job(true)
    }

    /// Cancel every in-flight job and refuse new ones.
    pub fn cancel_all(&self) {
        self.shutdown.cancel();
    }

    /// Snapshot of in-flight jobs, oldest first.
    pub fn active_jobs(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<JobInfo> = self.jobs.read().values().cloned().collect();
        jobs.sort_by_key(|j| j.started_at);
        jobs
    }

    /// Run one job to completion.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for an empty URL.
    /// - [`Error::NotFound`] when the download produced nothing.
    /// - [`Error::Cancelled`] when superseded by a newer request for the same
    ///   URL, or on shutdown.
    /// - [`Error::Pipeline`] naming the failed stage otherwise.
    pub async fn run(&self, request: JobRequest) -> Result<JobReport> {
        let key = request.resource_key().to_string();
        if key.is_empty() {
            return Err(Error::Validation("url must not be empty".into()));
        }

        let id = JobId::new();
        let cancel = self.shutdown.child_token();
        let (done_tx, done_rx) = watch::channel(false);

        let previous = self.active.insert(
            key.clone(),
            ActiveJob {
                id,
                cancel: cancel.clone(),
                finished: done_rx,
            },
        );
        self.jobs.write().insert(
            id,
            JobInfo {
                id,
                url: key.clone(),
                state: JobState::Pending,
                stage: None,
                started_at: Utc::now(),
            },
        );
        let _finish = FinishGuard {
            runner: self,
            key: &key,
            id,
            done: done_tx,
        };

        tracing::info!("Job {id} accepted for {key}");

        if let Some(prev) = previous {
            tracing::info!("Job {id} supersedes job {} for {key}", prev.id);
            prev.cancel.cancel();
            tokio::select! {
                _ = wait_finished(prev.finished) => {}
                _ = cancel.cancelled() => return Err(cancelled(id)),
            }
        }

        let _lock = match self.mode {
            WorkspaceMode::Shared => Some(tokio::select! {
                guard = self.lock.lock() => guard,
                _ = cancel.cancelled() => return Err(cancelled(id)),
            }),
            WorkspaceMode::Isolated => None,
        };

        self.update(id, |info| info.state = JobState::Running);

        let workspace = match self.mode {
            WorkspaceMode::Shared => self.workspace.clone(),
            WorkspaceMode::Isolated => self.workspace.scoped(id),
        };

        let started = std::time::Instant::now();
        let result = self.execute(id, &workspace, &request, &cancel).await;

        if self.mode == WorkspaceMode::Isolated {
            if let Err(e) = workspace.teardown() {
                tracing::warn!("Job {id}: failed to remove working directories: {e}");
            }
            if result.is_err() {
                let output = workspace.path(StagingDir::Output);
                if let Err(e) = std::fs::remove_dir_all(&output) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!("Job {id}: failed to remove {}: {e}", output.display());
                    }
                }
            } else if self.keep_jobs > 0 {
                match self.workspace.prune_job_outputs(self.keep_jobs) {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!("Job {id}: pruned {n} old job output(s)"),
                    Err(e) => tracing::warn!("Job {id}: failed to prune old outputs: {e}"),
                }
            }
        }

        match &result {
            Ok(report) => tracing::info!(
                "Job {id} finished in {:.1}s with {} output(s)",
                started.elapsed().as_secs_f64(),
                report.outputs.len()
            ),
            Err(e) if e.is_cancelled() => tracing::info!("Job {id} cancelled: {e}"),
            Err(e) => tracing::error!("Job {id} failed: {e}"),
        }

        result
    }

    async fn execute(
        &self,
        id: JobId,
        workspace: &Workspace,
        request: &JobRequest,
        cancel: &CancellationToken,
    ) -> Result<JobReport> {
        self.enter(id, Stage::Reset, cancel)?;
        let prepared = match self.mode {
            WorkspaceMode::Shared => workspace.reset_for_job(true),
            WorkspaceMode::Isolated => workspace.ensure_all(),
        };
        prepared.map_err(|e| e.in_stage(Stage::Reset.as_str()))?;

        self.enter(id, Stage::Download, cancel)?;
        let mut sources = self
            .toolchain
            .acquire(workspace, request.resource_key(), &request.cookies, cancel)
            .await
            .map_err(|e| e.in_stage(Stage::Download.as_str()))?;
        if sources.is_empty() {
            return Err(Error::not_found("video", request.resource_key()));
        }
        sources.sort();

        for video in &sources {
            tracing::info!("Job {id}: processing {}", video.display());

            self.enter(id, Stage::Extract, cancel)?;
            let audio = self
                .toolchain
                .extract_audio(workspace, video, cancel)
                .await
                .map_err(|e| e.in_stage(Stage::Extract.as_str()))?;

            self.enter(id, Stage::Separate, cancel)?;
            let stem = self
                .toolchain
                .separate(workspace, &audio, cancel)
                .await
                .map_err(|e| e.in_stage(Stage::Separate.as_str()))?;

            self.enter(id, Stage::Remux, cancel)?;
            self.toolchain
                .remux(workspace, video, &stem, cancel)
                .await
                .map_err(|e| e.in_stage(Stage::Remux.as_str()))?;
        }

        self.enter(id, Stage::Publish, cancel)?;
        let outputs = workspace
            .list_files(StagingDir::Output)
            .map_err(|e| e.in_stage(Stage::Publish.as_str()))?
            .iter()
            .map(|name| OutputVideo::new(name, workspace.output_prefix()))
            .collect();

        Ok(JobReport { id, outputs })
    }

    /// Record the stage and bail out if the job was cancelled meanwhile.
    fn enter(&self, id: JobId, stage: Stage, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(cancelled(id));
        }
        tracing::debug!("Job {id}: {stage}");
        self.update(id, |info| info.stage = Some(stage));
        Ok(())
    }

    fn update(&self, id: JobId, f: impl FnOnce(&mut JobInfo)) {
        if let Some(info) = self.jobs.write().get_mut(&id) {
            f(info);
        }
    }
}

/// Resolve once the sending job reports completion (or goes away).
async fn wait_finished(mut finished: watch::Receiver<bool>) {
    loop {
        let done = *finished.borrow_and_update();
        if done || finished.changed().await.is_err() {
            return;
        }
    }
}

fn cancelled(id: JobId) -> Error {
    Error::Cancelled(format!("job {id} was superseded or the server is shutting down"))
}

/// Signals job completion to any waiting successor and drops the job's
/// bookkeeping, however `run` exits.
struct FinishGuard<'a> {
    runner: &'a JobRunner,
    key: &'a str,
    id: JobId,
    done: watch::Sender<bool>,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        let _ = self.done.send(true);
        self.runner
            .active
            .remove_if(self.key, |_, job| job.id == self.id);
        self.runner.jobs.write().remove(&self.id);
    }
}
