use crate::{config::Config, metrics, upstream::Transport};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Upstream connection pool, shared by every request
    pub transport: Transport,
    /// Prometheus render handle, if the recorder was installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new AppState with the given configuration
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let transport = Transport::new(&config.transport_config())?;

        Ok(Self {
            config: Arc::new(config),
            transport,
            metrics: metrics::init(),
        })
    }
}
