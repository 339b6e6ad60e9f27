//! Connection abstraction for the streaming session
//!
//! A connection is split into a [`FrameSink`] (shared, behind the session's
//! writer lock) and a [`FrameStream`] (owned by the single reader), so that
//! receiving never contends with keepalive sends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::TransportError;

/// Opens connections to a streaming endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        uri: &str,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), TransportError>;
}

/// Write half of a connection
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;

    fn is_open(&self) -> bool;
}

/// Read half of a connection
#[async_trait]
pub trait FrameStream: Send {
    /// Next text frame
    async fn receive(&mut self) -> Result<String, TransportError>;
}

// ============================================================================
// tokio-tungstenite transport
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Websocket connector backed by `tokio-tungstenite`
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

fn map_ws_error(e: tungstenite::Error) -> TransportError {
    match e {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportError::Closed
        }
        tungstenite::Error::Io(_) | tungstenite::Error::Protocol(_) => {
            TransportError::Connection(e.to_string())
        }
        other => TransportError::Protocol(other.to_string()),
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        uri: &str,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), TransportError> {
        let (ws_stream, _) = connect_async(uri)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let (write, read) = ws_stream.split();
        let open = Arc::new(AtomicBool::new(true));

        Ok((
            Box::new(WsSink {
                write,
                open: Arc::clone(&open),
            }),
            Box::new(WsFrameStream { read, open }),
        ))
    }
}

struct WsSink {
    write: SplitSink<WsStream, Message>,
    open: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.write
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| {
                let err = map_ws_error(e);
                if err.is_connection_loss() {
                    self.open.store(false, Ordering::SeqCst);
                }
                err
            })
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.open.store(false, Ordering::SeqCst);
        match self.write.close().await {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(map_ws_error(e)),
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

struct WsFrameStream {
    read: SplitStream<WsStream>,
    open: Arc<AtomicBool>,
}

impl WsFrameStream {
    fn closed(&self, err: TransportError) -> TransportError {
        self.open.store(false, Ordering::SeqCst);
        err
    }
}

#[async_trait]
impl FrameStream for WsFrameStream {
    async fn receive(&mut self) -> Result<String, TransportError> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Binary(data))) => {
                    return Err(TransportError::Protocol(format!(
                        "unexpected binary frame ({} bytes)",
                        data.len()
                    )));
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("[Manifold WS] Close frame received: {:?}", frame);
                    return Err(self.closed(TransportError::Closed));
                }
                // Pings are answered by tungstenite itself
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    let err = map_ws_error(e);
                    if err.is_connection_loss() {
                        return Err(self.closed(err));
                    }
                    return Err(err);
                }
                None => return Err(self.closed(TransportError::Closed)),
            }
        }
    }
}
