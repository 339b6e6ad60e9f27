//! Scripted transport and handler doubles for session tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mirror_manifold::{
    Connector, FrameHandler, FrameSink, FrameStream, SessionConfig, TransportError,
};
use parking_lot::Mutex;
use tokio::time::Instant;

pub const ACK: &str = r#"{"type":"ack","txid":1,"success":true}"#;

pub fn update_frame(id: &str, probability: f64) -> String {
    format!(
        r#"{{"type":"broadcast","topic":"global/updated-contract","data":{{"id":"{id}","probability":{probability}}}}}"#
    )
}

/// Session timings short enough for tests
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        uri: "ws://mock.invalid/ws".to_string(),
        connect_timeout: Duration::from_millis(200),
        ack_timeout: Duration::from_millis(200),
        reconnect_delay: Duration::from_millis(10),
        max_reconnect_attempts: 5,
        keepalive_interval: Duration::from_secs(10),
        receive_error_pause: Duration::from_millis(10),
        max_in_flight_dispatches: 8,
    }
}

/// What the next inbound read yields
#[derive(Debug, Clone)]
pub enum Incoming {
    Frame(String),
    /// Peer closes the connection
    Close,
    ProtocolError(String),
    /// Never yields
    Hang,
}

/// Outcome of one connect attempt
#[derive(Debug, Clone)]
pub enum ConnectPlan {
    Fail,
    /// Handshake never completes
    Hang,
    Open(Vec<Incoming>),
}

/// Connector that replays one plan per connect attempt
///
/// Once the script runs out every further attempt fails.
pub struct MockConnector {
    plans: Mutex<VecDeque<ConnectPlan>>,
    attempts: AtomicUsize,
    attempt_times: Mutex<Vec<Instant>>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl MockConnector {
    pub fn new(plans: Vec<ConnectPlan>) -> Arc<Self> {
        Arc::new(Self {
            plans: Mutex::new(plans.into()),
            attempts: AtomicUsize::new(0),
            attempt_times: Mutex::new(Vec::new()),
            sent: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// When each connect attempt started
    pub fn attempt_times(&self) -> Vec<Instant> {
        self.attempt_times.lock().clone()
    }

    /// Every frame written, across all connections
    pub fn sent(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        _uri: &str,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.attempt_times.lock().push(Instant::now());
        let plan = self.plans.lock().pop_front().unwrap_or(ConnectPlan::Fail);

        match plan {
            ConnectPlan::Fail => Err(TransportError::Connection("refused".to_string())),
            ConnectPlan::Hang => std::future::pending().await,
            ConnectPlan::Open(incoming) => {
                let open = Arc::new(AtomicBool::new(true));
                Ok((
                    Box::new(MockSink {
                        open: Arc::clone(&open),
                        sent: Arc::clone(&self.sent),
                    }),
                    Box::new(MockStream {
                        incoming: incoming.into(),
                        open,
                    }),
                ))
            }
        }
    }
}

struct MockSink {
    open: Arc<AtomicBool>,
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.sent.lock().push(text);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

struct MockStream {
    incoming: VecDeque<Incoming>,
    open: Arc<AtomicBool>,
}

#[async_trait]
impl FrameStream for MockStream {
    async fn receive(&mut self) -> Result<String, TransportError> {
        match self.incoming.pop_front() {
            Some(Incoming::Frame(text)) => Ok(text),
            Some(Incoming::Close) => {
                self.open.store(false, Ordering::SeqCst);
                Err(TransportError::Closed)
            }
            Some(Incoming::ProtocolError(reason)) => Err(TransportError::Protocol(reason)),
            Some(Incoming::Hang) | None => std::future::pending().await,
        }
    }
}

/// Handler that records every frame it is given
#[derive(Default)]
pub struct RecordingHandler {
    frames: Mutex<Vec<String>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().clone()
    }
}

#[async_trait]
impl FrameHandler for RecordingHandler {
    async fn handle(&self, frame: String) {
        self.frames.lock().push(frame);
    }
}

/// Poll `condition` until it holds, panicking after two seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not reached within 2s");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
