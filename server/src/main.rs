use std::sync::Arc;

use anyhow::Context;
use bullhorn_backend_api::{build_router, AppState};
use bullhorn_config::load as load_config;
use bullhorn_platform::bridge::HttpBridgeConnector;
use tokio::{fs, net::TcpListener, signal};
use tower_http::services::ServeDir;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(env_filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("starting Bullhorn backend");

    let config = load_config().context("failed to load configuration")?;

    fs::create_dir_all(&config.storage.uploads_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create uploads directory {}",
                config.storage.uploads_dir.display()
            )
        })?;

    let connector = Arc::new(
        HttpBridgeConnector::new(&config.platform)
            .context("failed to initialise platform bridge client")?,
    );
    info!(bridge = %config.platform.bridge_url, "platform bridge client ready");

    let state = AppState::new(&config, connector);

    let app = build_router(state)
        .nest_service("/uploads", ServeDir::new(&config.storage.uploads_dir))
        .fallback_service(ServeDir::new(&config.storage.public_dir));

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

fn shutdown_signal() -> impl std::future::Future<Output = ()> {
    async {
        if let Err(error) = signal::ctrl_c().await {
            error!(?error, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
    }
}
