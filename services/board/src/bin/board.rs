//! services/board/src/bin/board.rs

use board_lib::{
    adapters::{
        pg_feed::spawn_pg_change_source, ChangeFeedDispatcher, DbAdapter, FileStorage,
        LocalBucket, MemoryNoteStore,
    },
    client::BoardClient,
    config::{Config, StoreBackend},
    error::BoardError,
    web::{router, AppState},
};
use secretboard_core::{ports::NoteStore, session::SessionContext};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), BoardError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting board...");

    // --- 2. Session Identity ---
    let local_storage = FileStorage::new(&config.local_storage_path);
    let session = SessionContext::from_storage(&local_storage)?;
    info!(
        "Session identity loaded from {}.",
        config.local_storage_path.display()
    );

    // --- 3. Change Feed & Note Store ---
    let shutdown = CancellationToken::new();
    let (feed, _dispatcher) = ChangeFeedDispatcher::spawn();

    let store: Arc<dyn NoteStore> = match &config.store {
        StoreBackend::Postgres { database_url } => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            spawn_pg_change_source(db_adapter.pool(), feed.clone(), shutdown.clone()).await?;
            Arc::new(db_adapter)
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory note store; notes will not survive a restart.");
            Arc::new(MemoryNoteStore::with_feed(feed.clone()))
        }
    };

    let images = Arc::new(LocalBucket::new(
        config.image_bucket_path.clone(),
        config.public_base_url.clone(),
    ));

    // --- 4. Board Client ---
    let client = BoardClient::new(
        store,
        images,
        Arc::new(feed),
        session,
        config.page_size,
    );
    if let Err(e) = client.refresh_board().await {
        warn!("Initial board fetch failed: {}", e);
    }
    let board_watcher = client.watch_board(shutdown.clone());

    // --- 5. Create the Web Router & Serve ---
    let app_state = Arc::new(AppState {
        client,
        config: config.clone(),
    });
    let app = router(app_state);

    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested.");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    let _ = board_watcher.await;
    Ok(())
}
