//! `POST /convert` and `GET /probe`.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode, Uri},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use stemdub_av::PlaylistEntry;
use stemdub_core::{Cookie, Error};

use super::error::AppError;
use super::AppContext;
use crate::pipeline::JobRequest;

pub fn convert_routes() -> Router<AppContext> {
    Router::new()
        .route("/convert", post(convert))
        .route("/probe", get(probe))
}

#[derive(Debug, Deserialize)]
struct UrlQuery {
    url: Option<String>,
}

/// Object form of the `POST /convert` body. A bare JSON array is read as
/// the cookie list alone.
#[derive(Debug, Deserialize)]
struct ConvertBody {
    url: Option<String>,
    #[serde(default)]
    cookies: Vec<Cookie>,
}

#[derive(Debug, Serialize)]
pub struct VideoLink {
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub videos: Vec<VideoLink>,
    pub error: Option<String>,
}

/// Base URL of this server as seen by the caller, always ending in `/`.
pub fn request_base_url(public_url: Option<&str>, headers: &HeaderMap) -> String {
    let mut base = match public_url {
        Some(url) => url.to_string(),
        None => {
            let host = headers
                .get(header::HOST)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("localhost");
            let scheme = headers
                .get("x-forwarded-proto")
                .and_then(|h| h.to_str().ok())
                .unwrap_or("http");
            format!("{scheme}://{host}/")
        }
    };
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}

/// Host and effective port of an absolute http(s) URL, host lowercased.
fn authority_of(url: &str) -> Option<(String, u16)> {
    let uri: Uri = url.trim().parse().ok()?;
    let scheme = uri.scheme_str()?;
    let host = uri.host()?.trim_end_matches('.').to_ascii_lowercase();
    let port = match uri.port_u16() {
        Some(port) => port,
        None if scheme.eq_ignore_ascii_case("https") => 443,
        None if scheme.eq_ignore_ascii_case("http") => 80,
        None => return None,
    };
    Some((host, port))
}

/// Whether `url` points at the server reachable under `base`.
pub fn targets_server(url: &str, base: &str) -> bool {
    match (authority_of(url), authority_of(base)) {
        (Some(target), Some(server)) => target == server,
        _ => {
            let url = url.trim().to_ascii_lowercase();
            let base = base.trim_end_matches('/').to_ascii_lowercase();
            url.strip_prefix(&base)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?', '#']))
        }
    }
}

fn parse_body(body: &[u8]) -> Result<(Option<String>, Vec<Cookie>), Error> {
    let invalid = |e: serde_json::Error| Error::Validation(format!("invalid request body: {e}"));
    match body.iter().find(|b| !b.is_ascii_whitespace()) {
        None => Ok((None, Vec::new())),
        Some(b'[') => {
            let cookies: Vec<Cookie> = serde_json::from_slice(body).map_err(invalid)?;
            Ok((None, cookies))
        }
        Some(_) => {
            let parsed: ConvertBody = serde_json::from_slice(body).map_err(invalid)?;
            Ok((parsed.url, parsed.cookies))
        }
    }
}

async fn convert(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Query(query): Query<UrlQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<ConvertResponse>), AppError> {
    let (body_url, cookies) = parse_body(&body)?;
    let url = query
        .url
        .or(body_url)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| Error::Validation("url is required".into()))?;

    let base = request_base_url(ctx.config.server.public_url.as_deref(), &headers);
    if targets_server(&url, &base) {
        return Err(Error::Validation("Url must not be server".into()).into());
    }

    for cookie in &cookies {
        cookie.validate()?;
    }

    tracing::info!("Convert request for {url} with {} cookie(s)", cookies.len());

    let runner = ctx.runner.clone();
    let report = tokio::spawn(async move { runner.run(JobRequest::new(url, cookies)).await })
        .await
        .map_err(|e| Error::Internal(format!("job task failed: {e}")))??;

    let videos = report
        .outputs
        .iter()
        .map(|out| VideoLink {
            filename: out.filename.clone(),
            url: out.url(&base),
        })
        .collect();

    Ok((
        StatusCode::CREATED,
        Json(ConvertResponse {
            videos,
            error: None,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct ProbeResponse {
    pub available: bool,
    pub entries: Vec<PlaylistEntry>,
    pub error: Option<String>,
}

async fn probe(
    State(ctx): State<AppContext>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<ProbeResponse>, AppError> {
    let url = query
        .url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| Error::Validation("url is required".into()))?;

    let outcome = ctx.runner.toolchain().probe(&url).await;
    Ok(Json(match outcome {
        stemdub_av::ProbeOutcome::Entries(entries) => ProbeResponse {
            available: true,
            entries,
            error: None,
        },
        stemdub_av::ProbeOutcome::Unavailable { reason } => ProbeResponse {
            available: false,
            entries: Vec::new(),
            error: Some(reason),
        },
    }))
}
