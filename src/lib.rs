// Site-activity proxy for the onboarding pipeline dashboard.
pub mod error;
pub mod kpi;
pub mod proxy;
pub mod site_activity;
pub mod state;
pub mod types;

use std::sync::Arc;

use proxy::ProxyState;
use site_activity::{BatchFetcher, FetchError, SiteActivityClient};
use types::AppConfig;

/// Build the fetcher from config and serve the proxy routes until Ctrl-C.
pub async fn run(config: AppConfig) -> Result<(), String> {
    config
        .upstream
        .validate()
        .map_err(|e| FetchError::Config(e).to_string())?;

    let client = SiteActivityClient::new(&config.upstream)?;
    let fetcher = BatchFetcher::new(&config.upstream, Arc::new(client));
    let app = proxy::router(Arc::new(ProxyState { fetcher }));

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .map_err(|e| format!("Failed to bind {}: {}", config.server.bind_addr, e))?;

    log::info!(
        "site-activity proxy listening on {} (upstream {}, pageSize {}, maxConcurrent {})",
        config.server.bind_addr,
        config.upstream.base_url,
        config.upstream.page_size,
        config.upstream.max_concurrent
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::warn!("Failed to listen for shutdown signal: {}", e);
            }
            log::info!("Shutdown signal received");
        })
        .await
        .map_err(|e| format!("Server error: {}", e))
}
