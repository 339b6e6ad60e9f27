//! Applies live contract updates to the market store
//!
//! Every frame the session receives lands here. Nothing that goes wrong with
//! a single frame is propagated: the outcome is logged and returned so callers
//! (and tests) can see what happened.

use std::sync::Arc;

use async_trait::async_trait;
use mirror_core::{ContractUpdate, InboundFrame, MarketRecord, UPDATED_CONTRACT_TOPIC};
use mirror_embedding::{EmbeddingError, MarketStore};
use mirror_manifold::FrameHandler;
use tracing::{debug, error, info, warn};

/// What [`MarketUpdateDispatcher::dispatch`] did with a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A known market was updated
    Updated,
    /// Not a contract update broadcast (acks, other topics)
    Ignored,
    /// Undecodable frame or payload
    Malformed,
    /// Update payload without an `id`
    MissingId,
    /// The market is not mirrored; no record is created
    UnknownMarket,
    StoreFailed,
}

/// Routes `global/updated-contract` broadcasts into the store
pub struct MarketUpdateDispatcher {
    store: Arc<MarketStore>,
}

impl MarketUpdateDispatcher {
    pub fn new(store: Arc<MarketStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MarketStore> {
        &self.store
    }

    /// Decode and apply one inbound frame
    pub fn dispatch(&self, frame: &str) -> DispatchOutcome {
        let inbound: InboundFrame = match serde_json::from_str(frame) {
            Ok(inbound) => inbound,
            Err(e) => {
                error!("[Dispatcher] Failed to decode JSON message: {}", e);
                return DispatchOutcome::Malformed;
            }
        };

        if !inbound.is_broadcast() {
            if inbound.is_ack() {
                debug!(
                    "[Dispatcher] Ack for txid {:?} (success: {:?})",
                    inbound.txid, inbound.success
                );
            } else {
                debug!("[Dispatcher] Ignoring message of type {:?}", inbound.msg_type);
            }
            return DispatchOutcome::Ignored;
        }

        if inbound.topic.as_deref() != Some(UPDATED_CONTRACT_TOPIC) {
            warn!(
                "[Dispatcher] Broadcast with unexpected topic: {:?}",
                inbound.topic
            );
            return DispatchOutcome::Ignored;
        }

        let Some(data) = inbound.data.filter(|d| d.is_object()) else {
            error!("[Dispatcher] Broadcast without a data object");
            return DispatchOutcome::Malformed;
        };

        let update: ContractUpdate = match serde_json::from_value(data) {
            Ok(update) => update,
            Err(e) => {
                error!("[Dispatcher] Failed to decode contract update: {}", e);
                return DispatchOutcome::Malformed;
            }
        };

        self.apply(update)
    }

    fn apply(&self, update: ContractUpdate) -> DispatchOutcome {
        let Some(id) = update.id else {
            error!("[Dispatcher] Contract update without an id");
            return DispatchOutcome::MissingId;
        };

        if let Some(p) = update.probability {
            if !MarketRecord::is_valid_probability(p) {
                warn!("[Dispatcher] Probability {} out of range for {}", p, id);
                return DispatchOutcome::Malformed;
            }
        }

        let mut record = match self.store.get(&id) {
            Ok(record) => record,
            Err(EmbeddingError::NotFound(_)) => {
                info!("[Dispatcher] Market {} not found in store", id);
                return DispatchOutcome::UnknownMarket;
            }
            Err(e) => {
                error!("[Dispatcher] Failed to load market {}: {}", id, e);
                return DispatchOutcome::StoreFailed;
            }
        };

        if let Some(title) = update.question {
            if title != record.title && record.has_embedding() {
                // Embedding keeps describing the old title until re-imported
                debug!("[Dispatcher] Title of {} changed; embedding is stale", id);
            }
            record.title = title;
        }
        if let Some(probability) = update.probability {
            record.probability = probability;
        }

        match self.store.update(&id, record) {
            Ok(()) => {
                info!("[Dispatcher] Updated market {}", id);
                DispatchOutcome::Updated
            }
            Err(e) => {
                error!("[Dispatcher] Failed to update market {}: {}", id, e);
                DispatchOutcome::StoreFailed
            }
        }
    }
}

#[async_trait]
impl FrameHandler for MarketUpdateDispatcher {
    async fn handle(&self, frame: String) {
        self.dispatch(&frame);
    }
}
