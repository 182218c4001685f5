//! Two-stem source separation with spleeter.

use std::path::{Path, PathBuf};

use stemdub_core::config::SeparationConfig;
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::tools::{ToolRegistry, SPLEETER};
use crate::workspace::{StagingDir, Workspace};

/// Separate `audio` into stems and return the path of the configured stem.
///
/// spleeter writes `<separated dir>/<audio base name>/{vocals,accompaniment}.wav`.
pub async fn separate_stems(
    workspace: &Workspace,
    tools: &ToolRegistry,
    cfg: &SeparationConfig,
    audio: &Path,
    cancel: &CancellationToken,
) -> stemdub_core::Result<PathBuf> {
    let spleeter = tools.require(SPLEETER)?;
    let base = audio
        .file_stem()
        .ok_or_else(|| stemdub_core::Error::not_found("audio", audio.display()))?;

    let out_root = workspace.path(StagingDir::Separated);
    std::fs::create_dir_all(&out_root)?;

    tracing::info!("separate {} with {}", audio.display(), cfg.model);

    let mut cmd = ToolCommand::new(spleeter.path.clone());
    cmd.args(["separate", "-p"])
        .arg(cfg.model.as_str())
        .arg("-o")
        .arg(out_root.to_string_lossy())
        .arg(audio.to_string_lossy())
        .timeout_opt(cfg.timeout())
        .cancel_on(cancel);
    cmd.execute().await?;

    let stem = out_root.join(base).join(cfg.stem.file_name());
    if !stem.is_file() {
        return Err(stemdub_core::Error::tool(
            SPLEETER,
            format!("expected stem missing: {}", stem.display()),
        ));
    }
    Ok(stem)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::actions::testing::fake_tool;
    use stemdub_core::config::Stem;

    /// Fake spleeter: `separate -p MODEL -o DIR INPUT`.
    const SPLEETER_SCRIPT: &str = r#"dir="$5"; name=$(basename "$6" .wav)
mkdir -p "$dir/$name"
echo v > "$dir/$name/vocals.wav"
echo a > "$dir/$name/accompaniment.wav""#;

    async fn run(cfg: SeparationConfig, script: &str) -> (tempfile::TempDir, stemdub_core::Result<PathBuf>) {
        let tmp = tempfile::tempdir().unwrap();
        let spleeter = fake_tool(tmp.path(), "spleeter", script);
        let tools = ToolRegistry::default().with_tool(SPLEETER, spleeter);
        let ws = Workspace::new(tmp.path().join("root"));
        ws.ensure_all().unwrap();
        let audio = ws.path(StagingDir::Audio).join("sample_video.wav");
        std::fs::write(&audio, b"pcm").unwrap();

        let result = separate_stems(&ws, &tools, &cfg, &audio, &CancellationToken::new()).await;
        (tmp, result)
    }

    #[tokio::test]
    async fn returns_vocals_stem_by_default() {
        let (tmp, result) = run(SeparationConfig::default(), SPLEETER_SCRIPT).await;
        let stem = result.unwrap();
        assert_eq!(
            stem,
            tmp.path()
                .join("root/temp_audio_converted/sample_video/vocals.wav")
        );
    }

    #[tokio::test]
    async fn returns_configured_stem() {
        let cfg = SeparationConfig {
            stem: Stem::Accompaniment,
            ..Default::default()
        };
        let (_tmp, result) = run(cfg, SPLEETER_SCRIPT).await;
        assert!(result.unwrap().ends_with("sample_video/accompaniment.wav"));
    }

    #[tokio::test]
    async fn missing_stem_is_an_error() {
        let (_tmp, result) = run(SeparationConfig::default(), "exit 0").await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("expected stem missing"), "{err}");
    }
}
