//! Manifold Markets integration for the market mirror
//!
//! - [`ManifoldClient`]: paged HTTP fetch of open binary markets
//! - [`Session`]: the long-lived websocket subscription to contract updates,
//!   with keepalive pings and bounded reconnection
//! - [`transport`]: the connection abstraction the session runs on, with a
//!   `tokio-tungstenite` implementation

pub mod client;
pub mod error;
mod keepalive;
pub mod session;
pub mod transport;
pub mod txid;
pub mod types;

pub use client::ManifoldClient;
pub use error::{SessionError, TransportError};
pub use session::{FrameHandler, Session, SessionConfig, SessionState};
pub use transport::{Connector, FrameSink, FrameStream, WsConnector};
pub use txid::TxidAllocator;
pub use types::LiteMarket;
