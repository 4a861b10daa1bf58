// crates/server/src/main.rs
//! Larder server binary.
//!
//! Opens the job store, settles jobs a previous process left unfinished, then
//! serves the import API until Ctrl-C.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use larder_db::Database;
use larder_observability::{init_tracing, LogFormat};
use larder_server::{
    create_app, init_metrics, recover_interrupted_jobs, AppState, HttpRecipeExtractor,
    ServerConfig,
};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("warn,larder_server=info", LogFormat::from_env());

    let startup_start = Instant::now();

    init_metrics();

    eprintln!("\n larder v{}\n", env!("CARGO_PKG_VERSION"));

    // Step 1: Configuration
    let config = ServerConfig::from_env().context("invalid server configuration")?;

    // Step 2: Open database
    let db = match &config.db_path {
        Some(path) => Database::new(path).await?,
        None => Database::open_default().await?,
    };
    tracing::info!(path = %db.db_path().display(), "Database opened");

    // Step 3: Jobs from a previous run have no processor any more
    let recovered = recover_interrupted_jobs(&db).await?;

    // Step 4: Extraction service client
    let extractor = HttpRecipeExtractor::new(&config.extractor_url, config.extractor_timeout)
        .context("failed to build extraction service client")?;

    let state = AppState::with_fast_path(db, Arc::new(extractor), config.image_fast_path);
    let app = create_app(state);

    // Step 5: Bind and serve
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    eprintln!(
        "  Ready in {}ms ({} interrupted import(s) settled)",
        startup_start.elapsed().as_millis(),
        recovered.failed + recovered.cancelled,
    );
    eprintln!("  -> http://{addr}/api\n");
    tracing::info!(
        %addr,
        extractor = %config.extractor_url,
        image_fast_path = config.image_fast_path,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
