use crate::{
    error::{ProxyError, Result},
    hls::rewrite_manifest,
    server::{state::AppState, upstream_headers::upstream_headers},
};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::fmt::Write;
use tracing::{error, info};

/// Playlist fetched when no `path` is given
const DEFAULT_DIAG_PATH: &str = "/hls/live/playlist.m3u8";

/// Lines shown from each side of the report
const REPORT_LINES: usize = 40;

#[derive(Debug, Deserialize)]
pub struct DiagParams {
    /// Origin path to fetch, e.g. `/hls/live/playlist.m3u8`
    path: Option<String>,
}

/// Fetch a playlist and show it before and after rewriting
pub async fn diag(State(state): State<AppState>, Query(params): Query<DiagParams>) -> Response {
    let path = params
        .path
        .unwrap_or_else(|| DEFAULT_DIAG_PATH.to_string());

    match build_report(&state, &path).await {
        Ok(report) => report.into_response(),
        Err(e) => {
            error!("Diag failed for {}: {}", path, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "diag error").into_response()
        }
    }
}

async fn build_report(state: &AppState, path: &str) -> Result<String> {
    if !path.starts_with('/') {
        return Err(ProxyError::InvalidTarget(path.to_string()));
    }

    let config = &state.config;
    let target = config
        .upstream_target(path)
        .map_err(|e| ProxyError::InvalidTarget(format!("{path}: {e}")))?;
    let headers = upstream_headers(&config.origin_base, &HeaderMap::new(), &config.default_user_agent);

    info!("Diag fetch for {}", target);

    let upstream = state
        .transport
        .fetch(target, headers, config.max_redirects)
        .await?;
    let status = upstream.status();
    let final_url = upstream.final_url().clone();
    let raw = upstream.text().await.map_err(ProxyError::UpstreamBody)?;
    let rewritten = rewrite_manifest(&raw, &final_url);

    let mut report = String::with_capacity(raw.len() + rewritten.len() + 128);
    let _ = writeln!(report, "=== UPSTREAM ({final_url}, {status}) ===");
    let _ = writeln!(report, "{}", head(&raw, REPORT_LINES));
    let _ = writeln!(report);
    let _ = writeln!(report, "=== REWRITTEN ===");
    let _ = writeln!(report, "{}", head(&rewritten, REPORT_LINES));

    Ok(report)
}

fn head(text: &str, lines: usize) -> String {
    text.split('\n').take(lines).collect::<Vec<_>>().join("\n")
}
