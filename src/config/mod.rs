pub use stemdub_core::config::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Container extensions the muxer is allowed to write.
const KNOWN_CONTAINERS: &[&str] = &["mp4", "mkv", "mov", "webm"];

const WEBM_AUDIO_CODECS: &[&str] = &["libopus", "opus", "libvorbis", "vorbis"];
const MP4_AUDIO_CODECS: &[&str] = &["aac", "libfdk_aac", "mp3", "libmp3lame", "ac3", "eac3", "alac"];

/// Audio encoders each container accepts. Matroska takes anything.
fn container_audio_codecs(container: &str) -> Option<&'static [&'static str]> {
    match container {
        "webm" => Some(WEBM_AUDIO_CODECS),
        "mp4" | "mov" => Some(MP4_AUDIO_CODECS),
        _ => None,
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    for warning in config.validate() {
        tracing::warn!("{warning}");
    }

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./stemdub.toml",
        "~/.config/stemdub/config.toml",
        "/etc/stemdub/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Reject configurations the pipeline cannot run with.
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.separation.model.trim().is_empty() {
        anyhow::bail!("separation.model must not be empty");
    }

    if !KNOWN_CONTAINERS.contains(&config.mux.container.as_str()) {
        anyhow::bail!(
            "Unknown mux.container '{}' (expected one of {})",
            config.mux.container,
            KNOWN_CONTAINERS.join(", ")
        );
    }

    if let Some(codecs) = container_audio_codecs(&config.mux.container) {
        if !codecs.contains(&config.mux.audio_codec.as_str()) {
            anyhow::bail!(
                "mux.audio_codec '{}' cannot be written to a {} container (use one of {})",
                config.mux.audio_codec,
                config.mux.container,
                codecs.join(", ")
            );
        }
    }

    if config.workspace.root.as_os_str().is_empty() {
        anyhow::bail!("workspace.root must not be empty");
    }

    Ok(())
}
