//! Job request, result and status types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use stemdub_core::{Cookie, JobId};

/// One conversion request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JobRequest {
    pub url: String,
    #[serde(default)]
    pub cookies: Vec<Cookie>,
}

impl JobRequest {
    pub fn new(url: impl Into<String>, cookies: Vec<Cookie>) -> Self {
        Self {
            url: url.into(),
            cookies,
        }
    }

    /// Key under which concurrent requests for the same resource collide.
    pub fn resource_key(&self) -> &str {
        self.url.trim()
    }
}

/// A published file in the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputVideo {
    /// File name without its extension.
    pub filename: String,
    /// File name on disk.
    pub file_name: String,
    /// Path below `/files/`, e.g. `clip.mp4` or `<job>/clip.mp4`.
    pub route: String,
}

impl OutputVideo {
    /// Describe `file_name`, optionally nested under a job directory.
    pub fn new(file_name: &str, prefix: Option<&str>) -> Self {
        let filename = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());
        let route = match prefix {
            Some(p) => format!("{p}/{file_name}"),
            None => file_name.to_string(),
        };
        Self {
            filename,
            file_name: file_name.to_string(),
            route,
        }
    }

    /// Retrieval URL: `base` (ending in `/`) + `files/` + encoded route.
    pub fn url(&self, base: &str) -> String {
        let encoded: Vec<_> = self
            .route
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{base}files/{}", encoded.join("/"))
    }
}

/// What a finished job produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub id: JobId,
    pub outputs: Vec<OutputVideo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting for a superseded job or the workspace lock.
    Pending,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Reset,
    Download,
    Extract,
    Separate,
    Remux,
    Publish,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Reset => "reset",
            Stage::Download => "download",
            Stage::Extract => "extract",
            Stage::Separate => "separate",
            Stage::Remux => "remux",
            Stage::Publish => "publish",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of an in-flight job.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: JobId,
    pub url: String,
    pub state: JobState,
    pub stage: Option<Stage>,
    pub started_at: DateTime<Utc>,
}
