//! Resource classification by path extension and the per-class response
//! header policy.

use axum::http::{HeaderMap, HeaderValue, header};

/// Content type for HLS playlists.
pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Default `max-age` for media segments, in seconds.
pub const DEFAULT_SEGMENT_MAX_AGE_SECS: u64 = 15;

/// Kind of resource a proxied path names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// `.m3u8`
    Playlist,
    /// `.ts`
    TransportStream,
    /// `.m4s`
    FragmentedMedia,
    /// `.mp4`
    Container,
    /// `.key`
    Key,
    Other,
}

impl ResourceKind {
    /// Classify a request path. Any query string is ignored and the
    /// extension match is ASCII case-insensitive.
    pub fn from_path(path: &str) -> Self {
        let path = path.split_once('?').map_or(path, |(p, _)| p);
        let file_name = path.rsplit('/').next().unwrap_or(path);

        let Some((_, extension)) = file_name.rsplit_once('.') else {
            return Self::Other;
        };

        [
            ("m3u8", Self::Playlist),
            ("ts", Self::TransportStream),
            ("m4s", Self::FragmentedMedia),
            ("mp4", Self::Container),
            ("key", Self::Key),
        ]
        .into_iter()
        .find(|(ext, _)| extension.eq_ignore_ascii_case(ext))
        .map_or(Self::Other, |(_, kind)| kind)
    }

    pub fn is_playlist(self) -> bool {
        self == Self::Playlist
    }

    pub fn is_segment(self) -> bool {
        matches!(
            self,
            Self::TransportStream | Self::FragmentedMedia | Self::Container
        )
    }

    /// Default `Content-Type` for this kind.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Playlist => PLAYLIST_CONTENT_TYPE,
            Self::TransportStream => "video/mp2t",
            Self::FragmentedMedia => "video/iso.segment",
            Self::Container => "video/mp4",
            Self::Key | Self::Other => "application/octet-stream",
        }
    }

    /// `Cache-Control` for this kind, if any.
    ///
    /// Playlists change at the live edge and are never cached; published
    /// segments are immutable.
    pub fn cache_control(self, segment_max_age_secs: u64) -> Option<String> {
        match self {
            Self::Playlist => Some("no-store, must-revalidate".to_string()),
            Self::Key => Some("no-store".to_string()),
            kind if kind.is_segment() => Some(format!(
                "public, max-age={segment_max_age_secs}, immutable"
            )),
            _ => None,
        }
    }

    /// Short label used in logs and metrics.
    pub fn label(self) -> &'static str {
        match self {
            Self::Playlist => "playlist",
            Self::TransportStream | Self::FragmentedMedia | Self::Container => "segment",
            Self::Key => "key",
            Self::Other => "other",
        }
    }
}

/// Response headers every proxied resource of `kind` starts with.
///
/// Upstream `Content-Type` may later override the default for streamed
/// resources.
pub fn resource_headers(kind: ResourceKind, segment_max_age_secs: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(kind.content_type()),
    );

    if let Some(cache_control) = kind.cache_control(segment_max_age_secs)
        && let Ok(value) = HeaderValue::from_str(&cache_control)
    {
        headers.insert(header::CACHE_CONTROL, value);
    }

    headers
}
