//! Application configuration types.
//!
//! The top-level [`Config`] is deserialized from TOML by the binary and
//! carries every sub-config for the server, workspace, tools and the four
//! pipeline stages. Every section defaults sensibly so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub workspace: WorkspaceConfig,
    pub tools: ToolsConfig,
    pub download: DownloadConfig,
    pub extract: ExtractConfig,
    pub separation: SeparationConfig,
    pub mux: MuxConfig,
}

impl Config {
    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(ref url) = self.server.public_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                warnings.push(format!(
                    "server.public_url '{url}' is not an http(s) URL; result links may be unusable"
                ));
            }
        }

        if self.download.connections == 0 {
            warnings.push("download.connections is 0; the accelerator will be skipped".into());
        }

        if self.download.socket_timeout_secs == 0 {
            warnings.push("download.socket_timeout_secs is 0; sockets will never time out".into());
        }

        if self.workspace.mode == WorkspaceMode::Shared && !self.workspace.reset_on_start {
            warnings.push(
                "workspace.reset_on_start is disabled; output from a previous run stays published"
                    .into(),
            );
        }

        if self.workspace.mode == WorkspaceMode::Isolated && self.workspace.keep_jobs == 0 {
            warnings.push(
                "workspace.keep_jobs is 0; job output is only removed by a reset at startup".into(),
            );
        }

        for (section, timeout) in [
            ("download", self.download.timeout_secs),
            ("extract", self.extract.timeout_secs),
            ("separation", self.separation.timeout_secs),
            ("mux", self.mux.timeout_secs),
        ] {
            if timeout == Some(0) {
                warnings.push(format!(
                    "{section}.timeout_secs is 0; every invocation will time out immediately"
                ));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL advertised in result links. When unset, the base is derived
    /// from each request's `Host` header.
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            public_url: None,
        }
    }
}

/// How jobs share the staging directories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceMode {
    /// One set of fixed directories, reset at the start of every job. Jobs are
    /// serialized by a global lock.
    #[default]
    Shared,
    /// Every job works in its own id-scoped subtree and may run concurrently.
    Isolated,
}

/// Staging area settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
    pub mode: WorkspaceMode,
    pub reset_on_start: bool,
    /// Isolated mode only: how many finished jobs keep their published
    /// output. `0` keeps everything.
    pub keep_jobs: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            mode: WorkspaceMode::Shared,
            reset_on_start: true,
            keep_jobs: 20,
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ytdlp_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    pub spleeter_path: Option<PathBuf>,
    pub aria2c_path: Option<PathBuf>,
}

/// Downloader settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub user_agent: String,
    pub socket_timeout_secs: u64,
    /// Multi-connection transfer helper handed to the downloader.
    pub external_downloader: Option<String>,
    pub connections: u32,
    pub chunk_size: String,
    /// Upper bound for the whole download call. Unset means no limit.
    pub timeout_secs: Option<u64>,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:141.0) Gecko/20100101 Firefox/141.0".into()
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            socket_timeout_secs: 10,
            external_downloader: Some("aria2c".into()),
            connections: 8,
            chunk_size: "1M".into(),
            timeout_secs: None,
        }
    }
}

impl DownloadConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Audio extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u32,
    pub timeout_secs: Option<u64>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            codec: "pcm_s16le".into(),
            sample_rate: 44_100,
            channels: 2,
            timeout_secs: None,
        }
    }
}

impl ExtractConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// The separated stem that ends up on the final video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stem {
    #[default]
    Vocals,
    Accompaniment,
}

impl Stem {
    /// File name the separation model writes for this stem.
    pub fn file_name(self) -> &'static str {
        match self {
            Stem::Vocals => "vocals.wav",
            Stem::Accompaniment => "accompaniment.wav",
        }
    }
}

impl std::str::FromStr for Stem {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vocals" => Ok(Stem::Vocals),
            "accompaniment" | "instrumental" => Ok(Stem::Accompaniment),
            _ => Err(format!("Unknown stem: {s}")),
        }
    }
}

/// Source separation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    pub model: String,
    pub stem: Stem,
    pub timeout_secs: Option<u64>,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            model: "spleeter:2stems".into(),
            stem: Stem::Vocals,
            timeout_secs: None,
        }
    }
}

impl SeparationConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Final multiplexing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxConfig {
    pub audio_codec: String,
    pub audio_bitrate: Option<String>,
    pub container: String,
    pub timeout_secs: Option<u64>,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            audio_codec: "aac".into(),
            audio_bitrate: None,
            container: "mp4".into(),
            timeout_secs: None,
        }
    }
}

impl MuxConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
