//! Playlist listing without downloading.

use serde::{Deserialize, Serialize};

use crate::command::ToolCommand;
use crate::tools::{ToolRegistry, YT_DLP};

/// Title used when the listing omits one.
const UNTITLED: &str = "Untitled";

/// One entry of a flattened playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub title: String,
    pub id: Option<String>,
}

/// Result of a playlist probe.
///
/// A failed probe is a value, not an error, so callers can tell "no entries"
/// apart from "could not ask".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Entries(Vec<PlaylistEntry>),
    Unavailable { reason: String },
}

impl ProbeOutcome {
    /// Entries, or an empty slice when unavailable.
    pub fn entries(&self) -> &[PlaylistEntry] {
        match self {
            ProbeOutcome::Entries(entries) => entries,
            ProbeOutcome::Unavailable { .. } => &[],
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ProbeOutcome::Entries(_))
    }
}

#[derive(Deserialize)]
struct RawListing {
    #[serde(default)]
    entries: Vec<RawEntry>,
}

#[derive(Deserialize)]
struct RawEntry {
    title: Option<String>,
    id: Option<String>,
}

/// Parse `yt-dlp -J --flat-playlist` output.
///
/// A single video (no `entries` array) lists as empty.
pub fn parse_playlist(json: &str) -> serde_json::Result<Vec<PlaylistEntry>> {
    let raw: RawListing = serde_json::from_str(json)?;
    Ok(raw
        .entries
        .into_iter()
        .map(|e| PlaylistEntry {
            title: e.title.unwrap_or_else(|| UNTITLED.to_string()),
            id: e.id,
        })
        .collect())
}

/// List the entries behind `url`. Never touches the workspace.
pub async fn probe_playlist(tools: &ToolRegistry, url: &str) -> ProbeOutcome {
    let ytdlp = match tools.require(YT_DLP) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!("probe unavailable for {url}: {e}");
            return ProbeOutcome::Unavailable {
                reason: e.to_string(),
            };
        }
    };

    let mut cmd = ToolCommand::new(ytdlp.path.clone());
    cmd.args(["--flat-playlist", "-J", "--"]).arg(url);

    let output = match cmd.execute().await {
        Ok(o) => o,
        Err(e) => {
            tracing::warn!("probe failed for {url}: {e}");
            return ProbeOutcome::Unavailable {
                reason: e.to_string(),
            };
        }
    };

    match parse_playlist(&output.stdout) {
        Ok(entries) => {
            tracing::debug!("probe of {url} listed {} entries", entries.len());
            ProbeOutcome::Entries(entries)
        }
        Err(e) => {
            tracing::warn!("unparseable probe output for {url}: {e}");
            ProbeOutcome::Unavailable {
                reason: format!("invalid listing: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_entries_with_default_title() {
        let json = r#"{"_type":"playlist","entries":[
            {"id":"a1","title":"First"},
            {"id":"b2"}
        ]}"#;
        let entries = parse_playlist(json).unwrap();
        assert_eq!(
            entries,
            vec![
                PlaylistEntry { title: "First".into(), id: Some("a1".into()) },
                PlaylistEntry { title: "Untitled".into(), id: Some("b2".into()) },
            ]
        );
    }

    #[test]
    fn single_video_lists_empty() {
        let entries = parse_playlist(r#"{"id":"xyz","title":"Solo"}"#).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(parse_playlist("WARNING: not json").is_err());
    }

    #[tokio::test]
    async fn missing_tool_is_unavailable() {
        let outcome = probe_playlist(&ToolRegistry::default(), "https://example.com/list").await;
        assert!(!outcome.is_available());
        assert!(outcome.entries().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_listing_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let ytdlp = crate::actions::testing::fake_tool(tmp.path(), "yt-dlp", "echo boom >&2; exit 2");
        let tools = ToolRegistry::default().with_tool(YT_DLP, ytdlp);
        match probe_playlist(&tools, "https://example.com/list").await {
            ProbeOutcome::Unavailable { reason } => assert!(reason.contains("boom"), "{reason}"),
            other => panic!("expected unavailable, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn listing_is_parsed() {
        let tmp = tempfile::tempdir().unwrap();
        let ytdlp = crate::actions::testing::fake_tool(
            tmp.path(),
            "yt-dlp",
            r#"echo '{"entries":[{"id":"x","title":"One"}]}'"#,
        );
        let tools = ToolRegistry::default().with_tool(YT_DLP, ytdlp);
        let outcome = probe_playlist(&tools, "https://example.com/list").await;
        assert_eq!(outcome.entries().len(), 1);
        assert_eq!(outcome.entries()[0].title, "One");
    }
}
