//! Errors surfaced at the HTTP boundary.

use crate::upstream::FetchError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, info};

pub type Result<T> = std::result::Result<T, ProxyError>;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Upstream(#[from] FetchError),

    /// Upstream answered >= 400; passed through as-is.
    #[error("upstream returned {0}")]
    UpstreamStatus(StatusCode),

    #[error("failed to read upstream body: {0}")]
    UpstreamBody(#[source] reqwest::Error),

    #[error("invalid upstream target: {0}")]
    InvalidTarget(String),
}

impl ProxyError {
    /// Status returned to the player.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Upstream(FetchError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream(FetchError::Unreachable { .. } | FetchError::TooManyRedirects { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            Self::UpstreamStatus(status) => *status,
            Self::UpstreamBody(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidTarget(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Plaintext body returned to the player. Never carries upstream detail.
    fn public_message(&self) -> &'static str {
        match self {
            Self::Upstream(FetchError::Timeout { .. }) => "Upstream timeout",
            Self::Upstream(FetchError::TooManyRedirects { .. }) => "Too many redirects",
            Self::Upstream(_) => "Upstream unreachable",
            Self::UpstreamStatus(_) => "",
            Self::UpstreamBody(_) => "Upstream error",
            Self::InvalidTarget(_) => "Bad request",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            Self::UpstreamStatus(_) => info!("Passing through {}", self),
            _ => error!("Proxy request failed ({}): {}", status, self),
        }

        (status, self.public_message()).into_response()
    }
}
