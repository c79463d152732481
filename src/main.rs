use clap::Parser;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bamtrack::{
    Config, TrackEngine,
    handlers::{AppState, create_router},
    storage::{HttpStorage, LocalStorage, Storage},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Create storage backend
    let storage: Arc<dyn Storage> = match &config.remote_url {
        Some(url) => Arc::new(HttpStorage::new(url)?),
        None => Arc::new(LocalStorage::new(config.data_dir.clone())),
    };

    let settings = config.assembly_settings();
    let engine = TrackEngine::new(storage, settings)?;

    let app = create_router(AppState { engine }).layer(TraceLayer::new_for_http());

    let app = if config.cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };

    let addr = config.bind_address();
    tracing::info!("Starting bamtrack server on {}", addr);
    match &config.remote_url {
        Some(url) => tracing::info!("Remote files: {}", url),
        None => tracing::info!("Data directory: {:?}", config.data_dir),
    }
    tracing::info!(
        "{} workers, batch size {}, split width {}, max window {}",
        settings.workers,
        settings.batch_size,
        settings.min_split_width,
        settings.max_window_width
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
