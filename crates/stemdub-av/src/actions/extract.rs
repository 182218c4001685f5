//! Audio extraction to an uncompressed waveform.

use std::path::{Path, PathBuf};

use stemdub_core::config::ExtractConfig;
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::tools::{ToolRegistry, FFMPEG};
use crate::workspace::{StagingDir, Workspace};

/// ffmpeg arguments that drop the picture and decode the audio track to PCM.
pub fn extract_args(cfg: &ExtractConfig, video: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        video.to_string_lossy().into_owned(),
        "-vn".into(),
        "-acodec".into(),
        cfg.codec.clone(),
        "-ar".into(),
        cfg.sample_rate.to_string(),
        "-ac".into(),
        cfg.channels.to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Extract the audio track of `video` to `<audio dir>/<base name>.wav`.
///
/// Fails when the input has no audio stream, since ffmpeg refuses to write
/// an empty output.
pub async fn extract_audio(
    workspace: &Workspace,
    tools: &ToolRegistry,
    cfg: &ExtractConfig,
    video: &Path,
    cancel: &CancellationToken,
) -> stemdub_core::Result<PathBuf> {
    let ffmpeg = tools.require(FFMPEG)?;
    let stem = video
        .file_stem()
        .ok_or_else(|| stemdub_core::Error::not_found("video", video.display()))?;

    let audio_dir = workspace.path(StagingDir::Audio);
    std::fs::create_dir_all(&audio_dir)?;
    let output = audio_dir.join(format!("{}.wav", stem.to_string_lossy()));

    tracing::info!("extract audio {} -> {}", video.display(), output.display());

    let mut cmd = ToolCommand::new(ffmpeg.path.clone());
    cmd.args(extract_args(cfg, video, &output))
        .timeout_opt(cfg.timeout())
        .cancel_on(cancel);
    cmd.execute().await?;

    if !output.is_file() {
        return Err(stemdub_core::Error::tool(
            FFMPEG,
            format!("no audio written for {}", video.display()),
        ));
    }

    Ok(output)
}
