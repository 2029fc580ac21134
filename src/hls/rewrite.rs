//! Line-oriented HLS manifest rewriting.
//!
//! The playlist is never parsed into a structured model: unknown tags, vendor
//! extensions and LL-HLS lines must survive untouched, so each line is
//! classified on its own and only lines that carry references are changed.

use super::proxy_path::ref_to_proxy_path;
use url::Url;

/// Tags whose `URI="..."` attributes name resources fetched by the player.
pub const URI_TAGS: [&str; 6] = [
    "EXT-X-KEY",
    "EXT-X-SESSION-KEY",
    "EXT-X-MAP",
    "EXT-X-MEDIA",
    "EXT-X-I-FRAME-STREAM-INF",
    "EXT-X-SESSION-DATA",
];

/// Classification of a single playlist line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistLine<'a> {
    /// One of [`URI_TAGS`]; holds the raw line.
    TaggedAttribute(&'a str),
    /// Any other `#` line; holds the raw line.
    Comment(&'a str),
    /// Empty or whitespace-only; holds the raw line.
    Blank(&'a str),
    /// Sub-playlist or segment reference; holds the trimmed reference.
    Reference(&'a str),
}

/// Classify one line (without its `\n` terminator).
pub fn classify_line(line: &str) -> PlaylistLine<'_> {
    let trimmed = line.trim();

    if trimmed.is_empty() {
        PlaylistLine::Blank(line)
    } else if is_uri_tag(trimmed) {
        PlaylistLine::TaggedAttribute(line)
    } else if trimmed.starts_with('#') {
        PlaylistLine::Comment(line)
    } else {
        PlaylistLine::Reference(trimmed)
    }
}

/// `#TAG:` match against [`URI_TAGS`], ASCII case-insensitive.
fn is_uri_tag(trimmed: &str) -> bool {
    let Some(rest) = trimmed.strip_prefix('#') else {
        return false;
    };

    URI_TAGS.iter().any(|tag| {
        rest.get(..tag.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(tag))
            && rest[tag.len()..].starts_with(':')
    })
}

/// Rewrite every resource reference in `text` into a proxy-local path.
///
/// `base` must be the URL the playlist was actually served from (after
/// redirects), since relative references resolve against it. Line
/// separators are preserved exactly, including `\r` before `\n`.
///
/// The result is a fixed point: rewriting it again with the same base
/// returns it unchanged.
pub fn rewrite_manifest(text: &str, base: &Url) -> String {
    let mut output = String::with_capacity(text.len() + text.len() / 4);

    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            output.push('\n');
        }

        match classify_line(line) {
            PlaylistLine::TaggedAttribute(raw) => {
                output.push_str(&rewrite_uri_attributes(raw, base));
            }
            PlaylistLine::Comment(raw) | PlaylistLine::Blank(raw) => output.push_str(raw),
            PlaylistLine::Reference(reference) => {
                output.push_str(&ref_to_proxy_path(reference, base));
                if line.ends_with('\r') {
                    output.push('\r');
                }
            }
        }
    }

    output
}

const URI_MARKER: &[u8] = b"URI=\"";

/// Rewrite each non-empty `URI="..."` value in a tag line, keeping every
/// other byte of the line verbatim. The attribute name is emitted as `URI`
/// whatever its case in the input.
pub fn rewrite_uri_attributes(line: &str, base: &Url) -> String {
    let mut result = String::with_capacity(line.len() + 16);
    let mut rest = line;

    while let Some((value_start, value_end)) = find_quoted_uri(rest) {
        let value = &rest[value_start..value_end];

        // URI="" names nothing and is kept as-is
        if value.is_empty() {
            result.push_str(&rest[..value_start]);
        } else {
            result.push_str(&rest[..value_start - URI_MARKER.len()]);
            result.push_str("URI=\"");
            result.push_str(&ref_to_proxy_path(value, base));
        }
        result.push('"');

        // Skip past the closing quote
        rest = &rest[value_end + 1..];
    }

    result.push_str(rest);
    result
}

/// Locate the next `URI="value"` in `line` (marker case-insensitive).
///
/// Returns the byte range of `value`, excluding both quotes. Returns `None`
/// if no marker is found or the value is never closed.
fn find_quoted_uri(line: &str) -> Option<(usize, usize)> {
    let marker_pos = line
        .as_bytes()
        .windows(URI_MARKER.len())
        .position(|window| window.eq_ignore_ascii_case(URI_MARKER))?;
    let value_start = marker_pos + URI_MARKER.len();
    let closing_quote = line[value_start..].find('"')?;

    Some((value_start, value_start + closing_quote))
}
