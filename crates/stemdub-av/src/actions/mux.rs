//! Remux the original picture with a separated audio stem.

use std::path::{Path, PathBuf};

use stemdub_core::config::MuxConfig;
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::tools::{ToolRegistry, FFMPEG};
use crate::workspace::{StagingDir, Workspace};

/// ffmpeg arguments: copy video stream 0, encode audio stream 1, stop at the
/// shorter input.
pub fn mux_args(cfg: &MuxConfig, video: &Path, stem: &Path, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-i".into(),
        video.to_string_lossy().into_owned(),
        "-i".into(),
        stem.to_string_lossy().into_owned(),
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "1:a:0".into(),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        cfg.audio_codec.clone(),
    ];
    if let Some(ref bitrate) = cfg.audio_bitrate {
        args.push("-b:a".into());
        args.push(bitrate.clone());
    }
    args.push("-shortest".into());
    args.push(output.to_string_lossy().into_owned());
    args
}

/// Write `<output dir>/<video base name>.<container>`.
///
/// A failed or cancelled run deletes whatever partial file ffmpeg left.
pub async fn remux_with_stem(
    workspace: &Workspace,
    tools: &ToolRegistry,
    cfg: &MuxConfig,
    video: &Path,
    stem: &Path,
    cancel: &CancellationToken,
) -> stemdub_core::Result<PathBuf> {
    let ffmpeg = tools.require(FFMPEG)?;
    let base = video
        .file_stem()
        .ok_or_else(|| stemdub_core::Error::not_found("video", video.display()))?;

    let output_dir = workspace.path(StagingDir::Output);
    std::fs::create_dir_all(&output_dir)?;
    let output = output_dir.join(format!("{}.{}", base.to_string_lossy(), cfg.container));

    tracing::info!("remux {} + {} -> {}", video.display(), stem.display(), output.display());

    let mut cmd = ToolCommand::new(ffmpeg.path.clone());
    cmd.args(mux_args(cfg, video, stem, &output))
        .timeout_opt(cfg.timeout())
        .cancel_on(cancel);

    if let Err(e) = cmd.execute().await {
        if output.exists() {
            if let Err(rm) = std::fs::remove_file(&output) {
                tracing::warn!("could not remove partial output {}: {rm}", output.display());
            }
        }
        return Err(e);
    }

    Ok(output)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::actions::testing::fake_tool;

    #[test]
    fn args_copy_video_and_truncate() {
        let cfg = MuxConfig {
            audio_bitrate: Some("192k".into()),
            ..Default::default()
        };
        let args = mux_args(&cfg, Path::new("v.mp4"), Path::new("vocals.wav"), Path::new("out.mp4"));

        let joined = args.join(" ");
        assert!(joined.contains("-map 0:v:0 -map 1:a:0"));
        assert!(joined.contains("-c:v copy -c:a aac -b:a 192k"));
        assert_eq!(&args[args.len() - 2..], ["-shortest", "out.mp4"]);
    }

    fn fixture(script: &str) -> (tempfile::TempDir, Workspace, ToolRegistry, PathBuf, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let ffmpeg = fake_tool(tmp.path(), "ffmpeg", script);
        let ws = Workspace::new(tmp.path().join("root"));
        ws.ensure_all().unwrap();
        let video = ws.path(StagingDir::SourceVideo).join("sample_video.webm");
        std::fs::write(&video, b"v").unwrap();
        let stem = ws.path(StagingDir::Separated).join("sample_video/vocals.wav");
        std::fs::create_dir_all(stem.parent().unwrap()).unwrap();
        std::fs::write(&stem, b"s").unwrap();
        let tools = ToolRegistry::default().with_tool(FFMPEG, ffmpeg);
        (tmp, ws, tools, video, stem)
    }

    #[tokio::test]
    async fn output_uses_fixed_container() {
        let (_tmp, ws, tools, video, stem) =
            fixture(r#"for last; do :; done; echo mp4 > "$last""#);
        let out = remux_with_stem(
            &ws,
            &tools,
            &MuxConfig::default(),
            &video,
            &stem,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(out, ws.path(StagingDir::Output).join("sample_video.mp4"));
        assert!(out.is_file());
    }

    #[tokio::test]
    async fn failure_removes_partial_output() {
        let (_tmp, ws, tools, video, stem) = fixture(
            r#"for last; do :; done; echo partial > "$last"; echo 'codec not supported' >&2; exit 1"#,
        );
        let err = remux_with_stem(
            &ws,
            &tools,
            &MuxConfig::default(),
            &video,
            &stem,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("codec not supported"));
        assert!(ws.list_files(StagingDir::Output).unwrap().is_empty());
    }
}
