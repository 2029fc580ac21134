use hlsgate::{config::Config, server};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Setup logging
    tracing_subscriber::fmt::init();

    info!("Starting hlsgate HLS proxy");

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Running in {} mode, origin {}",
        if config.is_dev { "DEV" } else { "PROD" },
        config.origin_base
    );

    if config.allow_insecure_tls {
        warn!("ALLOW_INSECURE_TLS is set: origin TLS certificates are not verified");
    }

    if let Err(e) = server::start(config).await {
        error!("Failed to start server: {}", e);
        std::process::exit(1);
    }
}
