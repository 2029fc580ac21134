//! Upstream fetcher: a single logical GET with manual redirect following.
//!
//! Redirects are followed here rather than by reqwest so that every hop is
//! visible: the body of each 3xx is drained before the next request, the
//! timeout applies per attempt, and the caller learns the URL the payload
//! finally came from (playlists resolve relative references against it).

use axum::body::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::{
    Client, Response, StatusCode,
    header::{HOST, HeaderMap, HeaderValue, LOCATION},
    redirect::Policy,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};
use url::Url;

use crate::metrics;

/// Default redirect budget for one logical fetch.
pub const DEFAULT_MAX_REDIRECTS: u32 = 5;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default bound on concurrent upstream connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 128;

/// Errors from [`Transport::fetch`].
///
/// Upstream 4xx/5xx are not errors here; they come back as a normal
/// [`UpstreamResponse`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream unreachable at {url}: {source}")]
    Unreachable {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("upstream timed out after {timeout:?} at {url}")]
    Timeout { url: Url, timeout: Duration },

    #[error("too many redirects (limit {limit}) starting from {url}")]
    TooManyRedirects { url: Url, limit: u32 },
}

impl FetchError {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unreachable { .. } => "unreachable",
            Self::Timeout { .. } => "timeout",
            Self::TooManyRedirects { .. } => "too_many_redirects",
        }
    }
}

/// Configuration for [`Transport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-attempt timeout: connect plus response headers, then per body read.
    pub timeout: Duration,
    /// Maximum concurrent upstream connections. Further fetches queue.
    pub max_connections: usize,
    /// Accept invalid TLS certificates from the origin.
    pub allow_insecure_tls: bool,
    /// How long an idle pooled connection is kept.
    pub pool_idle_timeout: Duration,
    /// Maximum idle pooled connections per host.
    pub pool_max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            allow_insecure_tls: false,
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 32,
        }
    }
}

/// Owner of the outbound connection pool.
///
/// Cheap to clone; clones share the pool and the connection bound.
#[derive(Clone, Debug)]
pub struct Transport {
    client: Client,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl Transport {
    /// Build a transport. Fails only if the TLS backend cannot initialise.
    pub fn new(config: &TransportConfig) -> Result<Self, reqwest::Error> {
        // HTTP/1.1 only: the request carries explicit Host/Connection headers
        let client = Client::builder()
            .redirect(Policy::none())
            .http1_only()
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .danger_accept_invalid_certs(config.allow_insecure_tls)
            .build()?;

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(config.max_connections.max(1))),
            timeout: config.timeout,
        })
    }

    /// GET `target`, following up to `max_redirects` redirects.
    ///
    /// A 3xx without a usable `Location` is returned as the final response.
    /// If `headers` contains `Host`, it is re-pointed at the new authority
    /// whenever a redirect changes host or port.
    ///
    /// # Errors
    ///
    /// [`FetchError::Unreachable`] on network failure,
    /// [`FetchError::Timeout`] when one attempt exceeds the timeout,
    /// [`FetchError::TooManyRedirects`] when the budget runs out.
    pub async fn fetch(
        &self,
        target: Url,
        mut headers: HeaderMap,
        max_redirects: u32,
    ) -> Result<UpstreamResponse, FetchError> {
        let start_url = target.clone();
        let mut current = target;
        let mut remaining = max_redirects;

        loop {
            // The semaphore is never closed, so acquiring only waits.
            let permit = self
                .permits
                .clone()
                .acquire_owned()
                .await
                .expect("upstream semaphore is never closed");

            let response = self.send_once(&current, &headers).await?;
            let status = response.status();

            if !status.is_redirection() {
                debug!("Upstream {} answered {}", current, status);
                return Ok(UpstreamResponse::new(response, current, permit));
            }

            let Some(next) = redirect_target(&current, &response) else {
                warn!(
                    "Upstream {} answered {} without a usable Location; not following",
                    current, status
                );
                return Ok(UpstreamResponse::new(response, current, permit));
            };

            drain(response).await;
            drop(permit);

            if remaining == 0 {
                warn!(
                    "Redirect budget of {} exhausted at {} (started from {})",
                    max_redirects, current, start_url
                );
                return Err(FetchError::TooManyRedirects {
                    url: start_url,
                    limit: max_redirects,
                });
            }
            remaining -= 1;

            info!("Following {} redirect: {} -> {}", status, current, next);
            metrics::record_redirect();

            retarget_host(&mut headers, &current, &next);
            current = next;
        }
    }

    /// One GET attempt, bounded by the timeout up to response headers.
    async fn send_once(&self, url: &Url, headers: &HeaderMap) -> Result<Response, FetchError> {
        debug!("Upstream GET {}", url);

        let request = self.client.get(url.clone()).headers(headers.clone()).send();

        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) if e.is_timeout() => {
                warn!("Upstream GET timed out for {}: {}", url, e);
                Err(FetchError::Timeout {
                    url: url.clone(),
                    timeout: self.timeout,
                })
            }
            Ok(Err(e)) => {
                warn!("Upstream GET failed for {}: {}", url, e);
                Err(FetchError::Unreachable {
                    url: url.clone(),
                    source: e,
                })
            }
            Err(_) => {
                warn!("Upstream GET exceeded {:?} for {}", self.timeout, url);
                Err(FetchError::Timeout {
                    url: url.clone(),
                    timeout: self.timeout,
                })
            }
        }
    }
}

/// Final response of a fetch, holding its connection slot until the body
/// has been consumed or the value is dropped.
#[derive(Debug)]
pub struct UpstreamResponse {
    response: Response,
    final_url: Url,
    permit: OwnedSemaphorePermit,
}

impl UpstreamResponse {
    fn new(response: Response, final_url: Url, permit: OwnedSemaphorePermit) -> Self {
        Self {
            response,
            final_url,
            permit,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    /// URL the payload actually came from, after redirects.
    pub fn final_url(&self) -> &Url {
        &self.final_url
    }

    /// Buffer the whole body as text.
    pub async fn text(self) -> Result<String, reqwest::Error> {
        let Self {
            response, permit, ..
        } = self;
        let text = response.text().await;
        drop(permit);
        text
    }

    /// Read and discard the body so the connection can return to the pool.
    pub async fn drain(self) {
        let Self {
            response, permit, ..
        } = self;
        drain(response).await;
        drop(permit);
    }

    /// Single-pass body stream. Dropping the stream early aborts the
    /// upstream connection and releases the slot.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static {
        let Self {
            response, permit, ..
        } = self;

        response.bytes_stream().map(move |chunk| {
            let _slot = &permit;
            chunk
        })
    }
}

/// Resolve the `Location` of a redirect against the URL that produced it.
///
/// `None` when the header is missing, not valid text, unresolvable, or points
/// at a non-HTTP scheme.
fn redirect_target(current: &Url, response: &Response) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    let next = current.join(location).ok()?;

    matches!(next.scheme(), "http" | "https").then_some(next)
}

/// `host[:port]` of a URL, as used in a `Host` header.
pub fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn retarget_host(headers: &mut HeaderMap, current: &Url, next: &Url) {
    if !headers.contains_key(HOST) {
        return;
    }

    let next_authority = authority(next);
    if next_authority == authority(current) {
        return;
    }

    match next_authority.and_then(|a| HeaderValue::from_str(&a).ok()) {
        Some(value) => {
            headers.insert(HOST, value);
        }
        None => {
            headers.remove(HOST);
        }
    }
}

async fn drain(response: Response) {
    let url = response.url().clone();
    if let Err(e) = response.bytes().await {
        debug!("Discarding unreadable body from {}: {}", url, e);
    }
}
