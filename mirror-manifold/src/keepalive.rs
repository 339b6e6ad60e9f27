//! Periodic ping task sharing the session's writer

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mirror_core::ClientMessage;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{SessionError, TransportError};
use crate::session::Writer;

/// Ping every `period` until the session stops running
///
/// Skips a cycle while the connection is down; reconnecting is left to the
/// session. Send failures are logged and never end the task.
pub(crate) async fn run(
    writer: Arc<Mutex<Writer>>,
    running: Arc<AtomicBool>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("[Keepalive] Cancelled");
                return;
            }
            _ = ticker.tick() => {}
        }

        if !running.load(Ordering::SeqCst) {
            info!("[Keepalive] Session is not running, stopping");
            return;
        }

        let mut writer = writer.lock().await;
        if !writer.is_open() {
            warn!("[Keepalive] Connection is not open, skipping ping");
            continue;
        }

        match writer.send(ClientMessage::ping).await {
            Ok(txid) => debug!("[Keepalive] Ping sent (txid {})", txid),
            Err(SessionError::Transport(TransportError::Closed)) => {
                error!("[Keepalive] Connection closed during ping");
            }
            Err(e) => error!("[Keepalive] Error sending ping: {}", e),
        }
    }
}
