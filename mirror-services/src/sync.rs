//! Live sync: the Manifold session feeding the update dispatcher

use std::sync::Arc;

use mirror_embedding::MarketStore;
use mirror_manifold::{Connector, Session, SessionConfig, SessionError, WsConnector};
use tracing::{info, warn};

use crate::dispatcher::MarketUpdateDispatcher;

/// Keeps the store in sync with contract update broadcasts
pub struct SyncService {
    store: Arc<MarketStore>,
    session: Arc<Session>,
}

impl SyncService {
    /// Sync over a real websocket connection
    pub fn new(store: Arc<MarketStore>, config: SessionConfig) -> Self {
        Self::with_connector(store, config, Arc::new(WsConnector::new()))
    }

    pub fn with_connector(
        store: Arc<MarketStore>,
        config: SessionConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let dispatcher = Arc::new(MarketUpdateDispatcher::new(store.clone()));
        let session = Arc::new(Session::new(config, connector, dispatcher));
        Self { store, session }
    }

    pub fn store(&self) -> &Arc<MarketStore> {
        &self.store
    }

    /// The underlying session, e.g. to watch its state
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Run until [`SyncService::shutdown`] or until the session gives up
    pub async fn run(&self) -> Result<(), SessionError> {
        match self.store.len() {
            Ok(count) => info!("[Sync] Starting live sync for {} markets", count),
            Err(e) => warn!("[Sync] Could not count stored markets: {}", e),
        }
        let result = self.session.run().await;
        info!("[Sync] Live sync stopped");
        result
    }

    pub fn shutdown(&self) {
        self.session.shutdown();
    }
}
