//! Manifold Market Mirror
//!
//! Imports every open binary market with its title embedding, then keeps
//! titles and probabilities fresh from the live update feed until Ctrl-C.

mod config;

use std::sync::Arc;

use anyhow::Context;
use mirror_embedding::{
    BatcherConfig, EmbeddingBatcher, EmbeddingClient, MarketStore, SqliteBackend, StoreConfig,
    TiktokenTokenizer,
};
use mirror_manifold::{ManifoldClient, SessionConfig};
use mirror_services::{MarketImporter, SyncService};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::MirrorConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mirror_cli=debug")),
        )
        .init();

    info!("Starting Manifold Market Mirror");

    let config = MirrorConfig::from_env()?;

    info!("Opening market store at: {}", config.db_path);
    let backend = SqliteBackend::new(&config.db_path).context("Failed to open market store")?;
    let store = Arc::new(MarketStore::new(
        Arc::new(backend),
        StoreConfig {
            index_threshold: config.index_threshold,
            ..StoreConfig::default()
        },
    ));

    if config.skip_import {
        info!("SKIP_IMPORT set, going straight to live sync");
    } else {
        import_markets(&config, store.clone()).await?;
    }

    let stats = store.stats()?;
    info!(
        "Store holds {} markets (index: {})",
        stats.record_count,
        match stats.indexed_count {
            Some(n) => format!("{} indexed", n),
            None => "none".to_string(),
        }
    );

    let service = SyncService::new(store, SessionConfig::default().with_uri(&config.ws_url));

    // Ctrl-C closes the connection and lets `run` return
    let session = service.session().clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Keyboard interrupt received. Disconnecting...");
                session.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    service.run().await?;

    info!("Mirror stopped");
    Ok(())
}

async fn import_markets(config: &MirrorConfig, store: Arc<MarketStore>) -> anyhow::Result<()> {
    let api_key = config
        .openai_api_key
        .clone()
        .context("OPENAI_API_KEY is required for the bulk import (set SKIP_IMPORT=1 to skip)")?;

    let tokenizer = TiktokenTokenizer::cl100k()?;
    let batcher = EmbeddingBatcher::new(
        Arc::new(EmbeddingClient::new(api_key)),
        Arc::new(tokenizer),
        BatcherConfig {
            token_budget: config.token_budget,
            ..BatcherConfig::default()
        },
    );
    let importer = MarketImporter::new(store, batcher);
    let client = ManifoldClient::with_base_url(&config.api_url)?;

    info!("Importing open binary markets from {}", client.base_url());
    let report = importer.import_from(&client).await?;
    info!(
        "Import finished: {} inserted, {} refreshed, {} skipped",
        report.inserted, report.refreshed, report.skipped
    );
    Ok(())
}
