//! Core types for the Manifold market mirror
//!
//! This crate defines the shared data structures used across the mirror,
//! including the market record, the streaming wire protocol and the
//! workspace-wide error type.

pub mod error;
pub mod market;
pub mod protocol;

pub use error::{MirrorError, MirrorResult};
pub use market::{MarketId, MarketRecord};
pub use protocol::{ClientMessage, ContractUpdate, InboundFrame, UPDATED_CONTRACT_TOPIC};
