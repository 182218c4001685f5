//! Source acquisition with yt-dlp.

use std::path::{Path, PathBuf};

use stemdub_core::config::DownloadConfig;
use stemdub_core::Cookie;
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::credentials::materialize_cookies;
use crate::tools::{ToolRegistry, YT_DLP};
use crate::workspace::{StagingDir, Workspace};

/// Suffixes of downloader scratch files that never count as sources.
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".aria2", ".temp"];

/// Build the yt-dlp argument list for a single-item download.
///
/// The external accelerator is only requested when the registry knows where
/// it lives and the connection count is non-zero.
pub fn download_args(
    cfg: &DownloadConfig,
    tools: &ToolRegistry,
    cookie_jar: &Path,
    source_dir: &Path,
    url: &str,
) -> Vec<String> {
    let template = source_dir.join("%(title)s.%(ext)s");
    let mut args: Vec<String> = vec![
        "--no-playlist".into(),
        "--no-progress".into(),
        "--cookies".into(),
        cookie_jar.to_string_lossy().into_owned(),
        "--user-agent".into(),
        cfg.user_agent.clone(),
        "--force-ipv4".into(),
        "--source-address".into(),
        "0.0.0.0".into(),
        "--socket-timeout".into(),
        cfg.socket_timeout_secs.to_string(),
        "--no-check-certificates".into(),
        "--no-cache-dir".into(),
        "--restrict-filenames".into(),
        "-o".into(),
        template.to_string_lossy().into_owned(),
    ];

    match cfg.external_downloader.as_deref() {
        Some(name) if cfg.connections > 0 => match tools.require(name) {
            Ok(helper) => {
                args.push("--downloader".into());
                args.push(helper.path.to_string_lossy().into_owned());
                args.push("--downloader-args".into());
                args.push(format!(
                    "{name}:-x {} -k {}",
                    cfg.connections, cfg.chunk_size
                ));
            }
            Err(_) => {
                tracing::warn!("{name} not available; downloading without an accelerator");
            }
        },
        _ => {}
    }

    args.push("--".into());
    args.push(url.to_string());
    args
}

/// Download `url` into the workspace's source-video directory.
///
/// Cookies are written to a transient jar that is removed when this function
/// returns, whatever the outcome. Returns the downloaded files in name order.
///
/// # Errors
///
/// - [`stemdub_core::Error::NotFound`] if the downloader finished without
///   leaving any file behind.
/// - Tool, I/O and cancellation failures from the downloader invocation.
pub async fn download_sources(
    workspace: &Workspace,
    tools: &ToolRegistry,
    cfg: &DownloadConfig,
    url: &str,
    cookies: &[Cookie],
    cancel: &CancellationToken,
) -> stemdub_core::Result<Vec<PathBuf>> {
    let ytdlp = tools.require(YT_DLP)?;
    let source_dir = workspace.path(StagingDir::SourceVideo);
    std::fs::create_dir_all(&source_dir)?;

    let jar = materialize_cookies(&workspace.path(StagingDir::Cookies), cookies)?;

    tracing::info!("download {url} ({} cookie(s))", jar.len());

    let mut cmd = ToolCommand::new(ytdlp.path.clone());
    cmd.args(download_args(cfg, tools, jar.path(), &source_dir, url))
        .timeout_opt(cfg.timeout())
        .cancel_on(cancel);
    let result = cmd.execute().await;

    if let Err(e) = jar.close() {
        tracing::warn!("failed to remove cookie jar: {e}");
    }
    result?;

    let sources: Vec<PathBuf> = workspace
        .list_files(StagingDir::SourceVideo)?
        .into_iter()
        .filter(|name| !PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s)))
        .map(|name| source_dir.join(name))
        .collect();

    if sources.is_empty() {
        return Err(stemdub_core::Error::not_found("video", url));
    }

    tracing::info!("downloaded {} file(s) for {url}", sources.len());
    Ok(sources)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::actions::testing::fake_tool;
    use crate::tools::ARIA2C;

    /// Fake yt-dlp: records the cookie jar path, then writes the named files
    /// next to the `-o` template.
    fn fake_ytdlp(dir: &Path, files: &[&str]) -> PathBuf {
        let touch: String = files
            .iter()
            .map(|f| format!("echo data > \"$(dirname \"$out\")/{f}\"\n"))
            .collect();
        fake_tool(
            dir,
            "yt-dlp",
            &format!(
                r#"while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift ;;
    --cookies) jar="$2"; shift ;;
  esac
  shift
done
echo "$jar" > "{log}"
{touch}"#,
                log = dir.join("jar.log").display()
            ),
        )
    }

    fn setup(files: &[&str]) -> (tempfile::TempDir, Workspace, ToolRegistry) {
        let tmp = tempfile::tempdir().unwrap();
        let bin = tmp.path().join("bin");
        std::fs::create_dir(&bin).unwrap();
        let ytdlp = fake_ytdlp(&bin, files);
        let ws = Workspace::new(tmp.path().join("root"));
        ws.reset_for_job(true).unwrap();
        (tmp, ws, ToolRegistry::default().with_tool(YT_DLP, ytdlp))
    }

    #[test]
    fn args_carry_network_options() {
        let cfg = DownloadConfig::default();
        let args = download_args(
            &cfg,
            &ToolRegistry::default(),
            Path::new("/w/temp_cookie/cookies_x.txt"),
            Path::new("/w/temp_video"),
            "https://example.com/watch?v=XYZ",
        );

        for flag in [
            "--no-playlist",
            "--force-ipv4",
            "--no-check-certificates",
            "--no-cache-dir",
            "--restrict-filenames",
        ] {
            assert!(args.iter().any(|a| a == flag), "missing {flag}");
        }
        let pos = args.iter().position(|a| a == "--socket-timeout").unwrap();
        assert_eq!(args[pos + 1], "10");
        let pos = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[pos + 1], "/w/temp_video/%(title)s.%(ext)s");
        assert_eq!(args.last().unwrap(), "https://example.com/watch?v=XYZ");
        assert!(!args.iter().any(|a| a == "--downloader"));
    }

    #[test]
    fn args_use_accelerator_when_available() {
        let cfg = DownloadConfig::default();
        let tools = ToolRegistry::default().with_tool(ARIA2C, "/usr/bin/aria2c");
        let args = download_args(&cfg, &tools, Path::new("c.txt"), Path::new("v"), "u");

        let pos = args.iter().position(|a| a == "--downloader").unwrap();
        assert_eq!(args[pos + 1], "/usr/bin/aria2c");
        assert_eq!(args[pos + 2], "--downloader-args");
        assert_eq!(args[pos + 3], "aria2c:-x 8 -k 1M");
    }

    #[tokio::test]
    async fn download_returns_sorted_sources_and_removes_jar() {
        let (tmp, ws, tools) = setup(&["b_clip.webm", "a_clip.mp4", "a_clip.mp4.part"]);
        let cookies = vec![Cookie::new("session", "abc", ".example.com")];

        let sources = download_sources(
            &ws,
            &tools,
            &DownloadConfig::default(),
            "https://example.com/watch?v=XYZ",
            &cookies,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let names: Vec<_> = sources
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_clip.mp4", "b_clip.webm"]);

        let jar_path = std::fs::read_to_string(tmp.path().join("bin/jar.log")).unwrap();
        assert!(jar_path.trim().contains("temp_cookie"));
        assert!(ws.list_files(StagingDir::Cookies).unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_download_is_not_found() {
        let (_tmp, ws, tools) = setup(&[]);
        let err = download_sources(
            &ws,
            &tools,
            &DownloadConfig::default(),
            "https://example.com/watch?v=XYZ",
            &[],
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.http_status(), 404);
    }

    #[tokio::test]
    async fn failed_download_still_removes_jar() {
        let tmp = tempfile::tempdir().unwrap();
        let ytdlp = fake_tool(tmp.path(), "yt-dlp", "echo 'ERROR: Unsupported URL' >&2; exit 1");
        let tools = ToolRegistry::default().with_tool(YT_DLP, ytdlp);
        let ws = Workspace::new(tmp.path().join("root"));
        ws.reset_for_job(true).unwrap();

        let err = download_sources(
            &ws,
            &tools,
            &DownloadConfig::default(),
            "https://example.com/nothing",
            &[Cookie::new("a", "1", "example.com")],
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("Unsupported URL"), "{err}");
        assert!(ws.list_files(StagingDir::Cookies).unwrap().is_empty());
    }
}
