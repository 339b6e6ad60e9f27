//! Sync services for the Manifold market mirror
//!
//! Glue between the Manifold session, the embedding batcher and the market
//! store: the bulk importer, the live update dispatcher and the service that
//! runs them together.

pub mod dispatcher;
pub mod importer;
pub mod sync;

pub use dispatcher::{DispatchOutcome, MarketUpdateDispatcher};
pub use importer::{ImportError, ImportReport, MarketImporter};
pub use sync::SyncService;
