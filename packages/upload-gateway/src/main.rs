mod config;
mod handler;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upload_core::{BucketStorage, ImageProxyClient, LocalStorage, StorageBackend};

use crate::config::{AppConfig, StorageConfig};

const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageBackend>,
    pub proxy: Option<ImageProxyClient>,
    pub http: reqwest::Client,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handler::health))
        .route("/files", post(handler::upload_file))
        .route("/files/fetch", post(handler::fetch_file))
        .route("/images", post(handler::process_image))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "upload_gateway=info,upload_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let storage: Arc<dyn StorageBackend> = match &config.storage {
        StorageConfig::Local { folder, base_url } => {
            tokio::fs::create_dir_all(folder).await?;
            tracing::info!(folder = %folder.display(), "using local storage");
            Arc::new(LocalStorage::new(folder.clone(), base_url))
        }
        StorageConfig::Bucket => {
            tracing::info!("using bucket storage");
            Arc::new(BucketStorage::from_env()?)
        }
    };

    let proxy = config.proxy.map(ImageProxyClient::new).transpose()?;

    let state = AppState {
        storage,
        proxy,
        http: reqwest::Client::new(),
    };

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}
