//! Shared test harness for integration tests.
//!
//! Provides [`FakeToolchain`], an in-process stand-in for yt-dlp, ffmpeg and
//! spleeter that writes placeholder files into the workspace, and
//! [`TestHarness`], which wires it into an [`AppContext`] rooted in a
//! temporary directory.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use stemdub::config::{Config, WorkspaceMode};
use stemdub::pipeline::MediaToolchain;
use stemdub::server::AppContext;
use stemdub_av::{PlaylistEntry, ProbeOutcome, StagingDir, ToolInfo, Workspace};
use stemdub_core::{Cookie, Error, Result};
use tokio_util::sync::CancellationToken;

/// Scripted toolchain behaviour.
#[derive(Clone)]
pub struct FakeToolchain {
    /// File names the "download" lands in the source-video directory.
    pub sources: Vec<String>,
    /// Stage name ("download", "extract", "separate", "remux") that fails.
    pub fail_at: Option<(&'static str, String)>,
    /// How long separation takes; honours cancellation.
    pub separate_delay: Duration,
    pub probe: ProbeOutcome,
    /// Every stage invocation, in order, as `"<stage> <file>"`.
    pub calls: Arc<Mutex<Vec<String>>>,
    /// Cookie count seen by each download.
    pub cookies_seen: Arc<Mutex<Vec<usize>>>,
}

impl Default for FakeToolchain {
    fn default() -> Self {
        Self {
            sources: vec!["sample_video.mp4".into()],
            fail_at: None,
            separate_delay: Duration::ZERO,
            probe: ProbeOutcome::Entries(vec![PlaylistEntry {
                title: "First".into(),
                id: Some("a1".into()),
            }]),
            calls: Arc::new(Mutex::new(Vec::new())),
            cookies_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FakeToolchain {
    pub fn with_sources(sources: &[&str]) -> Self {
        Self {
            sources: sources.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing_at(mut self, stage: &'static str, message: &str) -> Self {
        self.fail_at = Some((stage, message.to_string()));
        self
    }

    pub fn slow_separation(mut self, delay: Duration) -> Self {
        self.separate_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, stage: &str, path: &Path) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls.lock().push(format!("{stage} {name}"));
    }

    fn check(&self, stage: &str, tool: &str) -> Result<()> {
        match &self.fail_at {
            Some((s, message)) if *s == stage => Err(Error::tool(tool, message.clone())),
            _ => Ok(()),
        }
    }
}

fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl MediaToolchain for FakeToolchain {
    async fn acquire(
        &self,
        workspace: &Workspace,
        url: &str,
        cookies: &[Cookie],
        _cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>> {
        self.cookies_seen.lock().push(cookies.len());
        self.calls.lock().push(format!("download {url}"));
        self.check("download", "yt-dlp")?;

        let dir = workspace.path(StagingDir::SourceVideo);
        let mut out = Vec::new();
        for name in &self.sources {
            let path = dir.join(name);
            std::fs::write(&path, b"video")?;
            out.push(path);
        }
        Ok(out)
    }

    async fn extract_audio(
        &self,
        workspace: &Workspace,
        video: &Path,
        _cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        self.record("extract", video);
        self.check("extract", "ffmpeg")?;
        let out = workspace
            .path(StagingDir::Audio)
            .join(format!("{}.wav", base_name(video)));
        std::fs::write(&out, b"pcm")?;
        Ok(out)
    }

    async fn separate(
        &self,
        workspace: &Workspace,
        audio: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        self.record("separate", audio);
        if !self.separate_delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.separate_delay) => {}
                _ = cancel.cancelled() => return Err(Error::Cancelled("separation aborted".into())),
            }
        }
        self.check("separate", "spleeter")?;
        let dir = workspace
            .path(StagingDir::Separated)
            .join(base_name(audio));
        std::fs::create_dir_all(&dir)?;
        let out = dir.join("vocals.wav");
        std::fs::write(&out, b"stem")?;
        Ok(out)
    }

    async fn remux(
        &self,
        workspace: &Workspace,
        video: &Path,
        _stem: &Path,
        _cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        self.record("remux", video);
        self.check("remux", "ffmpeg")?;
        let out = workspace
            .path(StagingDir::Output)
            .join(format!("{}.mp4", base_name(video)));
        std::fs::write(&out, b"muxed")?;
        Ok(out)
    }

    async fn probe(&self, _url: &str) -> ProbeOutcome {
        self.probe.clone()
    }

    fn tool_status(&self) -> Vec<ToolInfo> {
        vec![ToolInfo {
            name: "yt-dlp".into(),
            available: true,
            version: Some("fake".into()),
            path: None,
        }]
    }
}

/// App context over a temporary workspace and a [`FakeToolchain`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub toolchain: FakeToolchain,
    pub root: tempfile::TempDir,
}

impl TestHarness {
    pub fn new(toolchain: FakeToolchain) -> Self {
        Self::with_mode(toolchain, WorkspaceMode::Shared)
    }

    pub fn with_mode(toolchain: FakeToolchain, mode: WorkspaceMode) -> Self {
        let root = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.workspace.root = root.path().to_path_buf();
        config.workspace.mode = mode;

        let ctx = AppContext::new(config, Arc::new(toolchain.clone()));
        ctx.runner.prepare(true).unwrap();
        Self {
            ctx,
            toolchain,
            root,
        }
    }

    pub fn workspace(&self) -> Workspace {
        Workspace::new(self.root.path())
    }

    pub fn output_files(&self) -> Vec<String> {
        self.workspace().list_files(StagingDir::Output).unwrap()
    }
}
