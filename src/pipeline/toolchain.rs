//! The seam between the job runner and the external media tools.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stemdub_av::{ProbeOutcome, ToolInfo, ToolRegistry, Workspace};
use stemdub_core::config::{Config, DownloadConfig, ExtractConfig, MuxConfig, SeparationConfig};
use stemdub_core::{Cookie, Result};
use tokio_util::sync::CancellationToken;

/// The four pipeline stages plus the playlist probe.
///
/// Every stage receives the job's workspace and cancellation token; the
/// runner owns sequencing and error attribution.
#[async_trait]
pub trait MediaToolchain: Send + Sync {
    /// Download `url` into the source-video directory and return the files.
    async fn acquire(
        &self,
        workspace: &Workspace,
        url: &str,
        cookies: &[Cookie],
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>>;

    async fn extract_audio(
        &self,
        workspace: &Workspace,
        video: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf>;

    /// Returns the path of the stem that goes onto the final video.
    async fn separate(
        &self,
        workspace: &Workspace,
        audio: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf>;

    async fn remux(
        &self,
        workspace: &Workspace,
        video: &Path,
        stem: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf>;

    async fn probe(&self, url: &str) -> ProbeOutcome;

    /// Availability of the underlying tools. Blocking.
    fn tool_status(&self) -> Vec<ToolInfo>;
}

/// Toolchain that shells out to yt-dlp, ffmpeg and spleeter.
pub struct CliToolchain {
    tools: Arc<ToolRegistry>,
    download: DownloadConfig,
    extract: ExtractConfig,
    separation: SeparationConfig,
    mux: MuxConfig,
}

impl CliToolchain {
    pub fn new(tools: Arc<ToolRegistry>, config: &Config) -> Self {
        Self {
            tools,
            download: config.download.clone(),
            extract: config.extract.clone(),
            separation: config.separation.clone(),
            mux: config.mux.clone(),
        }
    }

    /// Discover tools from `PATH` and the `[tools]` section.
    pub fn discover(config: &Config) -> Self {
        let tools = ToolRegistry::discover(&config.tools);
        Self::new(Arc::new(tools), config)
    }
}

#[async_trait]
impl MediaToolchain for CliToolchain {
    async fn acquire(
        &self,
        workspace: &Workspace,
        url: &str,
        cookies: &[Cookie],
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>> {
        stemdub_av::download_sources(workspace, &self.tools, &self.download, url, cookies, cancel)
            .await
    }

    async fn extract_audio(
        &self,
        workspace: &Workspace,
        video: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        stemdub_av::extract_audio(workspace, &self.tools, &self.extract, video, cancel).await
    }

    async fn separate(
        &self,
        workspace: &Workspace,
        audio: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        stemdub_av::separate_stems(workspace, &self.tools, &self.separation, audio, cancel).await
    }

    async fn remux(
        &self,
        workspace: &Workspace,
        video: &Path,
        stem: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        stemdub_av::remux_with_stem(workspace, &self.tools, &self.mux, video, stem, cancel).await
    }

    async fn probe(&self, url: &str) -> ProbeOutcome {
        stemdub_av::probe_playlist(&self.tools, url).await
    }

    fn tool_status(&self) -> Vec<ToolInfo> {
        self.tools.check_all()
    }
}
