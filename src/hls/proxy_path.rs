//! Reference-to-proxy-path conversion.
//!
//! Every reference found in a playlist is turned into a path under
//! [`ROUTING_PREFIX`] on the proxy's own origin. The upstream origin is
//! assumed to mirror that layout, so the proxy path doubles as the upstream
//! path when the player requests it.

use tracing::debug;
use url::Url;

/// Path prefix under which all upstream content is exposed.
pub const ROUTING_PREFIX: &str = "/hls";

/// Strip one leading occurrence of [`ROUTING_PREFIX`] (ASCII case-insensitive).
///
/// Only a single occurrence is removed, so `/hls/hls/a.ts` becomes
/// `/hls/a.ts` and re-prefixing restores the original string.
pub fn strip_routing_prefix(path: &str) -> &str {
    match path.get(..ROUTING_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(ROUTING_PREFIX) => &path[ROUTING_PREFIX.len()..],
        _ => path,
    }
}

/// Assemble `{prefix}{path}{?query}`. An empty query emits no `?`.
fn assemble(path: &str, query: Option<&str>) -> String {
    let path = strip_routing_prefix(path);
    match query {
        Some(q) if !q.is_empty() => format!("{ROUTING_PREFIX}{path}?{q}"),
        _ => format!("{ROUTING_PREFIX}{path}"),
    }
}

/// Rewrite a playlist reference into a proxy-local path.
///
/// The reference is resolved against `base` (the URL the playlist was actually
/// served from), so relative, root-relative, scheme-relative and absolute
/// references all land on the same canonical `/hls/...` form. Scheme, host and
/// fragment are discarded; the query string is kept.
///
/// Never fails:
/// - references resolving to a non-HTTP scheme (`skd://`, `data:`) are
///   returned unchanged because the player handles them itself
/// - unresolvable references starting with `/` are prefixed textually
/// - anything else unresolvable is returned unchanged
pub fn ref_to_proxy_path(reference: &str, base: &Url) -> String {
    match base.join(reference) {
        Ok(resolved) if matches!(resolved.scheme(), "http" | "https") => {
            assemble(resolved.path(), resolved.query())
        }
        Ok(resolved) => {
            debug!(
                "Leaving {} reference untouched: {}",
                resolved.scheme(),
                reference
            );
            reference.to_string()
        }
        Err(e) if reference.starts_with('/') => {
            debug!("Textual rewrite for unresolvable reference {}: {}", reference, e);
            format!("{ROUTING_PREFIX}{}", strip_routing_prefix(reference))
        }
        Err(e) => {
            debug!("Rewrite degraded, keeping reference {}: {}", reference, e);
            reference.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://origin.example.com/hls/live/index.m3u8").unwrap()
    }

    #[test]
    fn strip_removes_single_prefix() {
        assert_eq!(strip_routing_prefix("/hls/live/a.ts"), "/live/a.ts");
        assert_eq!(strip_routing_prefix("/hls/hls/a.ts"), "/hls/a.ts");
        assert_eq!(strip_routing_prefix("/HLS/live/a.ts"), "/live/a.ts");
        assert_eq!(strip_routing_prefix("/live/a.ts"), "/live/a.ts");
        assert_eq!(strip_routing_prefix("/hl"), "/hl");
        assert_eq!(strip_routing_prefix(""), "");
    }

    #[test]
    fn relative_reference_resolves_against_base_directory() {
        assert_eq!(ref_to_proxy_path("chunk1.ts", &base()), "/hls/live/chunk1.ts");
    }

    #[test]
    fn root_relative_reference_keeps_single_prefix() {
        assert_eq!(
            ref_to_proxy_path("/hls/other/chunk2.ts", &base()),
            "/hls/other/chunk2.ts"
        );
    }

    #[test]
    fn root_relative_reference_without_prefix_gains_one() {
        assert_eq!(ref_to_proxy_path("/video/seg.ts", &base()), "/hls/video/seg.ts");
    }

    #[test]
    fn parent_segments_are_resolved() {
        assert_eq!(
            ref_to_proxy_path("../audio/en/index.m3u8", &base()),
            "/hls/audio/en/index.m3u8"
        );
    }

    #[test]
    fn absolute_reference_drops_scheme_host_and_fragment() {
        assert_eq!(
            ref_to_proxy_path("https://cdn.example.net/hls/abc/seg.ts?token=1#t=3", &base()),
            "/hls/abc/seg.ts?token=1"
        );
    }

    #[test]
    fn scheme_relative_reference_is_resolved() {
        assert_eq!(
            ref_to_proxy_path("//cdn.example.net/video/seg.ts", &base()),
            "/hls/video/seg.ts"
        );
    }

    #[test]
    fn query_on_base_is_not_inherited() {
        let base = Url::parse("https://origin.example.com/hls/live/index.m3u8?token=abc").unwrap();
        assert_eq!(ref_to_proxy_path("chunk.ts", &base), "/hls/live/chunk.ts");
    }

    #[test]
    fn empty_query_emits_no_question_mark() {
        assert_eq!(ref_to_proxy_path("chunk.ts?", &base()), "/hls/live/chunk.ts");
    }

    #[test]
    fn already_rewritten_path_is_stable() {
        let once = ref_to_proxy_path("seg-1.ts?part=2", &base());
        assert_eq!(ref_to_proxy_path(&once, &base()), once);
    }

    #[test]
    fn non_http_schemes_pass_through() {
        assert_eq!(ref_to_proxy_path("skd://key-42", &base()), "skd://key-42");
        assert_eq!(
            ref_to_proxy_path("data:text/plain;base64,AAAA", &base()),
            "data:text/plain;base64,AAAA"
        );
    }

    #[test]
    fn unresolvable_root_relative_reference_is_prefixed_textually() {
        assert_eq!(ref_to_proxy_path("//[bad", &base()), "/hls//[bad");
    }

    #[test]
    fn unresolvable_reference_is_returned_unchanged() {
        assert_eq!(ref_to_proxy_path("http://[::1", &base()), "http://[::1");
    }
}
