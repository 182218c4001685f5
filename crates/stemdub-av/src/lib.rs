//! # stemdub-av
//!
//! External tool orchestration for the stemdub pipeline.
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to yt-dlp,
//!   ffmpeg, spleeter and aria2c.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout and
//!   cancellation support for running external processes.
//! - **Workspace management** ([`Workspace`]) -- the five staging directories
//!   and their reset semantics.
//! - **Credentials** ([`materialize_cookies`]) -- transient Netscape cookie jars.
//! - **Actions** ([`actions`]) -- download, audio extraction, separation,
//!   remux, and playlist probing.

pub mod actions;
pub mod command;
pub mod credentials;
pub mod tools;
pub mod workspace;

pub use command::{ToolCommand, ToolOutput};
pub use credentials::{materialize_cookies, CookieJarFile};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workspace::{StagingDir, Workspace};

pub use actions::{
    download_sources, extract_audio, probe_playlist, remux_with_stem, separate_stems,
    PlaylistEntry, ProbeOutcome,
};
