use crate::{
    error::{ProxyError, Result},
    hls::{ResourceKind, resource::resource_headers, rewrite_manifest},
    metrics,
    server::{state::AppState, upstream_headers::upstream_headers},
};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::info;

/// Upstream headers copied onto streamed responses.
const PASSTHROUGH_HEADERS: [header::HeaderName; 3] = [
    header::CONTENT_TYPE,
    header::ACCEPT_RANGES,
    header::CONTENT_RANGE,
];

/// Bytes of a rewritten manifest logged when `debug_hls` is on.
const DEBUG_MANIFEST_BYTES: usize = 800;

/// Proxy everything under `/hls/` to the origin
///
/// Playlists are buffered and rewritten so every reference routes back
/// through this proxy. Everything else is streamed through unmodified; if the
/// player disconnects, the body is dropped and the upstream connection with it.
pub async fn serve_hls(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let start = Instant::now();
    let kind = ResourceKind::from_path(uri.path());

    let response = proxy(&state, &uri, &headers, kind).await.into_response();

    metrics::record_request(kind.label(), response.status().as_u16());
    metrics::record_duration(kind.label(), start);

    response
}

async fn proxy(
    state: &AppState,
    uri: &Uri,
    player_headers: &HeaderMap,
    kind: ResourceKind,
) -> Result<Response> {
    let config = &state.config;
    let path_and_query = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |pq| pq.as_str());

    info!("Proxying {} {}", kind.label(), path_and_query);

    let target = config
        .upstream_target(path_and_query)
        .map_err(|e| ProxyError::InvalidTarget(format!("{path_and_query}: {e}")))?;
    let headers = upstream_headers(&config.origin_base, player_headers, &config.default_user_agent);

    let upstream = state
        .transport
        .fetch(target, headers, config.max_redirects)
        .await
        .inspect_err(|e| metrics::record_upstream_error(e.kind()))?;

    let status = upstream.status();
    if status.is_client_error() || status.is_server_error() {
        upstream.drain().await;
        return Err(ProxyError::UpstreamStatus(status));
    }

    if kind.is_playlist() && status.is_success() {
        let final_url = upstream.final_url().clone();
        let raw = upstream.text().await.map_err(ProxyError::UpstreamBody)?;
        let rewritten = rewrite_manifest(&raw, &final_url);

        if config.debug_hls {
            info!(
                "Manifest from {}:\n{}",
                final_url,
                truncate_on_char_boundary(&rewritten, DEBUG_MANIFEST_BYTES)
            );
        }

        return Ok((
            StatusCode::OK,
            resource_headers(kind, config.segment_max_age_secs),
            rewritten,
        )
            .into_response());
    }

    let mut response_headers = resource_headers(kind, config.segment_max_age_secs);
    for name in PASSTHROUGH_HEADERS {
        if let Some(value) = upstream.headers().get(&name) {
            response_headers.insert(name, value.clone());
        }
    }
    // A 3xx only reaches here when its Location could not be followed
    if status.is_redirection()
        && let Some(location) = upstream.headers().get(header::LOCATION)
    {
        response_headers.insert(header::LOCATION, location.clone());
    }

    Ok((
        status,
        response_headers,
        Body::from_stream(upstream.into_stream()),
    )
        .into_response())
}

fn truncate_on_char_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
