use crate::hls::resource::DEFAULT_SEGMENT_MAX_AGE_SECS;
use crate::upstream::{
    DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT, TransportConfig,
};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// User-Agent sent upstream when the player does not send one.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Upstream origin; inbound `/hls/...` paths are appended verbatim
    pub origin_base: Url,
    pub is_dev: bool,
    /// Accept invalid TLS certificates from the origin (default: false)
    pub allow_insecure_tls: bool,
    /// Per-attempt upstream timeout
    pub proxy_timeout: Duration,
    pub max_redirects: u32,
    /// Bound on concurrent upstream connections
    pub max_upstream_connections: usize,
    /// `max-age` for media segments
    pub segment_max_age_secs: u64,
    pub default_user_agent: String,
    /// Log the head of every rewritten manifest
    pub debug_hls: bool,
    /// Optional directory served for non-proxy routes (e.g. a player page)
    pub static_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    /// In DEV mode, provides sensible defaults. In PROD mode, PORT and ORIGIN_BASE are required.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let is_dev = parse_bool("DEV_MODE", false);

        // Port: required in prod, defaults to 10000 in dev
        let port = if is_dev {
            env::var("PORT")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()?
        } else {
            env::var("PORT")
                .map_err(|_| "PORT is required in production")?
                .parse()?
        };

        // Origin base: required in prod, defaults to a local origin in dev
        let origin_base = if is_dev {
            env::var("ORIGIN_BASE").unwrap_or_else(|_| "http://localhost:8080".to_string())
        } else {
            env::var("ORIGIN_BASE").map_err(|_| "ORIGIN_BASE is required in production")?
        };
        let origin_base = parse_origin(&origin_base)?;

        let proxy_timeout = Duration::from_millis(parse_or(
            "PROXY_TIMEOUT_MS",
            DEFAULT_TIMEOUT.as_millis() as u64,
        ));

        let default_user_agent =
            env::var("DEFAULT_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());

        let static_dir = env::var("STATIC_DIR")
            .ok()
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);

        Ok(Config {
            port,
            origin_base,
            is_dev,
            allow_insecure_tls: parse_bool("ALLOW_INSECURE_TLS", false),
            proxy_timeout,
            max_redirects: parse_or("MAX_REDIRECTS", DEFAULT_MAX_REDIRECTS),
            max_upstream_connections: parse_or("MAX_UPSTREAM_CONNECTIONS", DEFAULT_MAX_CONNECTIONS),
            segment_max_age_secs: parse_or("SEGMENT_MAX_AGE_SECS", DEFAULT_SEGMENT_MAX_AGE_SECS),
            default_user_agent,
            debug_hls: parse_bool("DEBUG_HLS", false),
            static_dir,
        })
    }

    /// Absolute upstream URL for an inbound path and query.
    pub fn upstream_target(&self, path_and_query: &str) -> Result<Url, url::ParseError> {
        let base = self.origin_base.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path_and_query}"))
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.proxy_timeout,
            max_connections: self.max_upstream_connections,
            allow_insecure_tls: self.allow_insecure_tls,
            ..TransportConfig::default()
        }
    }
}

/// Parse an origin base URL, accepting only http(s) with a host.
pub fn parse_origin(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("Invalid ORIGIN_BASE {raw}: {e}"))?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(format!(
                "ORIGIN_BASE scheme '{scheme}' not allowed, only http/https"
            ));
        }
    }

    if url.host_str().is_none() {
        return Err(format!("ORIGIN_BASE has no host: {raw}"));
    }

    Ok(url)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().to_lowercase().parse().ok())
        .unwrap_or(default)
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
