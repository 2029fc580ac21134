//! Header policy for upstream requests.
//!
//! The proxy presents itself to the origin as a direct client: nothing from
//! the player is forwarded except `User-Agent` and `Range`. `Origin`,
//! `Referer`, cookies and forwarded-for headers are dropped because many
//! origins reject requests that look cross-origin.

use crate::upstream::authority;
use axum::http::{HeaderMap, HeaderValue, header};
use url::Url;

/// Build the upstream request headers for one proxied request.
///
/// `player` is the inbound request's header map.
pub fn upstream_headers(origin: &Url, player: &HeaderMap, default_user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(host) = authority(origin)
        && let Ok(value) = HeaderValue::from_str(&host)
    {
        headers.insert(header::HOST, value);
    }
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
    // Plain bytes only: manifests are rewritten as text and segments pass through
    headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    let user_agent = player
        .get(header::USER_AGENT)
        .cloned()
        .or_else(|| HeaderValue::from_str(default_user_agent).ok());
    if let Some(user_agent) = user_agent {
        headers.insert(header::USER_AGENT, user_agent);
    }

    if let Some(range) = player.get(header::RANGE) {
        headers.insert(header::RANGE, range.clone());
    }

    headers
}
