#![forbid(unsafe_code)]

//! HTTP backend accepting thumbnail uploads and serving stored assets.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tokio::{fs, signal};
use tracing_subscriber::EnvFilter;
use tubely_tools::{
    api,
    config::load_app_config,
    metadata::MetadataStore,
    upload::ThumbnailUploader,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_app_config().context("loading configuration")?;

    fs::create_dir_all(&config.assets_root)
        .await
        .with_context(|| format!("creating assets root {}", config.assets_root.display()))?;
    let store = MetadataStore::open(&config.db_path).context("initializing metadata store")?;

    let uploader = ThumbnailUploader::from_config(&config, Arc::new(store));
    let app = api::router(uploader, config.max_upload_bytes);

    let addr = SocketAddr::new(
        config
            .host
            .parse()
            .with_context(|| format!("parsing HOST {}", config.host))?,
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    tracing::info!(%addr, assets_root = %config.assets_root.display(), "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl+C handler");
    }
}
