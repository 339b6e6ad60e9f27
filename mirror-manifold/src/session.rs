//! Long-lived subscription session
//!
//! Drives one logical subscription to the `global/updated-contract` topic:
//! connect, subscribe, wait for the acknowledgment, then listen and hand every
//! frame to a [`FrameHandler`]. Connection loss triggers a bounded reconnect
//! loop; running out of attempts terminates the session.
//!
//! All writes (subscribe, keepalive pings) go through one mutex that also
//! guards transaction id allocation. The receive half is owned by the listen
//! loop and never locked.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mirror_core::ClientMessage;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{SessionError, TransportError};
use crate::keepalive;
use crate::transport::{Connector, FrameSink, FrameStream};
use crate::txid::TxidAllocator;

/// Default Manifold websocket endpoint
pub const DEFAULT_WS_URL: &str = "wss://api.manifold.markets/ws";

/// Session tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub uri: String,
    /// How long a connect attempt may take to complete its handshake
    pub connect_timeout: Duration,
    /// How long to wait for the first frame after subscribing
    pub ack_timeout: Duration,
    /// Pause after each failed reconnect attempt
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub keepalive_interval: Duration,
    /// Pause after a frame-level receive error before reading again
    pub receive_error_pause: Duration,
    /// Upper bound on concurrently running handler tasks
    pub max_in_flight_dispatches: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_WS_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(2),
            max_reconnect_attempts: 5,
            keepalive_interval: Duration::from_secs(30),
            receive_error_pause: Duration::from_secs(1),
            max_in_flight_dispatches: 64,
        }
    }
}

impl SessionConfig {
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }
}

/// Receives every inbound frame, each on its own task
#[async_trait]
pub trait FrameHandler: Send + Sync {
    async fn handle(&self, frame: String);
}

/// Observable lifecycle of a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    AwaitingAck,
    Listening,
    Reconnecting,
    Terminated,
}

/// The write side of the connection together with the txid counter
pub(crate) struct Writer {
    sink: Option<Box<dyn FrameSink>>,
    txids: TxidAllocator,
}

impl Writer {
    fn new() -> Self {
        Self {
            sink: None,
            txids: TxidAllocator::new(),
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.sink.as_ref().is_some_and(|sink| sink.is_open())
    }

    /// Allocate a txid, build the message with it and send it
    pub(crate) async fn send<F>(&mut self, build: F) -> Result<u64, SessionError>
    where
        F: FnOnce(u64) -> ClientMessage + Send,
    {
        let sink = match self.sink.as_mut() {
            Some(sink) if sink.is_open() => sink,
            _ => return Err(TransportError::Closed.into()),
        };

        let txid = self.txids.allocate();
        let text = serde_json::to_string(&build(txid))?;
        sink.send(text).await?;
        Ok(txid)
    }

    async fn close(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if sink.is_open() {
                match sink.close().await {
                    Ok(()) => info!("[Manifold WS] Disconnected"),
                    Err(e) => warn!("[Manifold WS] Error while closing connection: {}", e),
                }
            }
        }
    }
}

/// A single subscription session over a [`Connector`]
pub struct Session {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    handler: Arc<dyn FrameHandler>,
    writer: Arc<Mutex<Writer>>,
    running: Arc<AtomicBool>,
    state_tx: watch::Sender<SessionState>,
    shutdown: CancellationToken,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        handler: Arc<dyn FrameHandler>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        Self {
            config,
            connector,
            handler,
            writer: Arc::new(Mutex::new(Writer::new())),
            running: Arc::new(AtomicBool::new(false)),
            state_tx,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Token cancelled by [`Session::shutdown`]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Ask a running session to close its connection and return `Ok`
    pub fn shutdown(&self) {
        info!("[Manifold WS] Shutdown requested");
        self.shutdown.cancel();
    }

    /// Send a message over the current connection
    ///
    /// The txid handed to `build` is allocated under the same lock as the
    /// send, so ids hit the wire in increasing order.
    pub async fn send<F>(&self, build: F) -> Result<u64, SessionError>
    where
        F: FnOnce(u64) -> ClientMessage + Send,
    {
        self.writer.lock().await.send(build).await
    }

    /// Run the session until shutdown, a fatal startup error, or reconnect
    /// exhaustion
    pub async fn run(&self) -> Result<(), SessionError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("[Manifold WS] Session is already running");
            return Ok(());
        }

        let result = self.run_session().await;

        self.running.store(false, Ordering::SeqCst);
        self.writer.lock().await.close().await;
        self.set_state(SessionState::Terminated);

        match &result {
            Ok(()) => info!("[Manifold WS] Session stopped"),
            Err(e) => error!("[Manifold WS] Session terminated: {}", e),
        }
        result
    }

    async fn run_session(&self) -> Result<(), SessionError> {
        let mut stream = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Ok(()),
            connected = self.connect() => connected?,
        };
        info!(
            "[Manifold WS] Connected to {}. Subscribing to updates...",
            self.config.uri
        );
        self.subscribe().await?;

        self.set_state(SessionState::AwaitingAck);
        let first = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Ok(()),
            received = timeout(self.config.ack_timeout, stream.receive()) => match received {
                Ok(Ok(frame)) => frame,
                Ok(Err(e)) => {
                    return Err(SessionError::Connection(format!(
                        "connection lost before acknowledgment: {e}"
                    )));
                }
                Err(_) => {
                    error!("[Manifold WS] No response received within {:?}", self.config.ack_timeout);
                    return Err(SessionError::AckTimeout(self.config.ack_timeout));
                }
            },
        };

        let keepalive = tokio::spawn(keepalive::run(
            Arc::clone(&self.writer),
            Arc::clone(&self.running),
            self.config.keepalive_interval,
            self.shutdown.child_token(),
        ));
        let permits = Arc::new(Semaphore::new(self.config.max_in_flight_dispatches.max(1)));
        let mut dispatches = JoinSet::new();

        let result = if self.spawn_dispatch(&mut dispatches, &permits, first).await {
            self.listen(stream, &mut dispatches, &permits).await
        } else {
            Ok(())
        };

        keepalive.abort();
        dispatches.abort_all();
        result
    }

    /// Open a fresh connection and install its sink as the writer
    async fn connect(&self) -> Result<Box<dyn FrameStream>, SessionError> {
        self.set_state(SessionState::Connecting);
        let (sink, stream) = timeout(
            self.config.connect_timeout,
            self.connector.connect(&self.config.uri),
        )
        .await
        .map_err(|_| {
            SessionError::Connection(format!(
                "handshake did not complete within {:?}",
                self.config.connect_timeout
            ))
        })?
        .map_err(|e| SessionError::Connection(e.to_string()))?;

        if !sink.is_open() {
            return Err(SessionError::Connection(
                "failed to open websocket connection".to_string(),
            ));
        }

        self.writer.lock().await.sink = Some(sink);
        Ok(stream)
    }

    async fn subscribe(&self) -> Result<u64, SessionError> {
        let txid = self.send(ClientMessage::subscribe_updated_contracts).await?;
        info!("[Manifold WS] Subscription sent (txid {})", txid);
        Ok(txid)
    }

    async fn listen(
        &self,
        mut stream: Box<dyn FrameStream>,
        dispatches: &mut JoinSet<()>,
        permits: &Arc<Semaphore>,
    ) -> Result<(), SessionError> {
        self.set_state(SessionState::Listening);
        info!("[Manifold WS] Listening for contract updates");

        loop {
            while let Some(joined) = dispatches.try_join_next() {
                if let Err(e) = joined {
                    if e.is_panic() {
                        error!("[Manifold WS] Dispatch task panicked: {}", e);
                    }
                }
            }

            let received = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Ok(()),
                received = stream.receive() => received,
            };

            match received {
                Ok(frame) => {
                    debug!("[Manifold WS] Received: {}", frame);
                    if !self.spawn_dispatch(dispatches, permits, frame).await {
                        return Ok(());
                    }
                }
                Err(TransportError::Protocol(reason)) => {
                    error!("[Manifold WS] Error receiving message: {}", reason);
                    tokio::select! {
                        biased;
                        _ = self.shutdown.cancelled() => return Ok(()),
                        _ = sleep(self.config.receive_error_pause) => {}
                    }
                }
                Err(e) => {
                    error!("[Manifold WS] Connection error: {}", e);
                    match self.reconnect().await? {
                        Some(fresh) => stream = fresh,
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    /// Reconnect and re-subscribe; `None` when shutdown interrupted it
    async fn reconnect(&self) -> Result<Option<Box<dyn FrameStream>>, SessionError> {
        self.set_state(SessionState::Reconnecting);
        self.writer.lock().await.close().await;

        let max_attempts = self.config.max_reconnect_attempts;
        for attempt in 1..=max_attempts {
            if self.shutdown.is_cancelled() {
                return Ok(None);
            }

            let connected = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Ok(None),
                connected = self.connect() => connected,
            };
            let outcome = match connected {
                Ok(stream) => self.subscribe().await.map(|_| stream),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(stream) => {
                    info!(
                        "[Manifold WS] Reconnected (attempt {}/{})",
                        attempt, max_attempts
                    );
                    self.set_state(SessionState::Listening);
                    return Ok(Some(stream));
                }
                Err(e) => {
                    error!(
                        "[Manifold WS] Reconnection attempt {}/{} failed: {}",
                        attempt, max_attempts, e
                    );
                    self.set_state(SessionState::Reconnecting);
                    tokio::select! {
                        biased;
                        _ = self.shutdown.cancelled() => return Ok(None),
                        _ = sleep(self.config.reconnect_delay) => {}
                    }
                }
            }
        }

        error!(
            "[Manifold WS] Failed to reconnect after {} attempts",
            max_attempts
        );
        Err(SessionError::ReconnectExhausted {
            attempts: max_attempts,
        })
    }

    /// Spawn a handler task once a permit is free; `false` on shutdown
    async fn spawn_dispatch(
        &self,
        dispatches: &mut JoinSet<()>,
        permits: &Arc<Semaphore>,
        frame: String,
    ) -> bool {
        let permit = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return false,
            permit = Arc::clone(permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return false,
            },
        };

        let handler = Arc::clone(&self.handler);
        dispatches.spawn(async move {
            handler.handle(frame).await;
            drop(permit);
        });
        true
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!("[Manifold WS] {:?} -> {:?}", previous, state);
        }
    }
}
