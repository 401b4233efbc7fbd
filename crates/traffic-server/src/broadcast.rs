//! WebSocket broadcast of ledger events
//!
//! Clients subscribe via `/events/subscribe` and receive every event emitted
//! after they connect.
//!
//! ## Protocol
//! 1. Client connects
//! 2. Server sends Hello message (JSON): `{"version":1,"next_seq":12}`
//! 3. Server sends each `EventRecord` as a JSON text message, in `seq` order
//! 4. If client lags behind, server closes with code 4000 and reason "lagged:<seq>";
//!    the client can resume with `GET /events?since=<seq>`

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use traffic_core::EventRecord;

/// Broadcast channel capacity
const BROADCAST_CAPACITY: usize = 256;

/// Close code sent to a subscriber that fell behind
pub const LAGGED_CLOSE_CODE: u16 = 4000;

/// Ledger event broadcast channel
#[derive(Clone)]
pub struct EventBroadcast {
    tx: broadcast::Sender<Arc<EventRecord>>,
}

impl EventBroadcast {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    /// Broadcast an event to all subscribers
    ///
    /// Returns the number of receivers that received the event, 0 if nobody
    /// is subscribed.
    pub fn broadcast(&self, event: EventRecord) -> usize {
        match self.tx.send(Arc::new(event)) {
            Ok(count) => {
                tracing::debug!(receivers = count, "Broadcast ledger event");
                count
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<EventRecord>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

/// Protocol version for WebSocket subscription
pub const PROTOCOL_VERSION: u16 = 1;

/// Hello message sent on WebSocket connect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsHello {
    pub version: u16,
    /// Sequence number of the first event this subscription will deliver
    pub next_seq: u64,
}

/// Serve one event subscription.
///
/// `rx` must have been subscribed while `next_seq` was current, so the
/// stream starts exactly at `next_seq`.
pub async fn handle_event_subscription(
    socket: WebSocket,
    mut rx: broadcast::Receiver<Arc<EventRecord>>,
    next_seq: u64,
) {
    let (mut sender, mut receiver) = socket.split();

    let hello = WsHello {
        version: PROTOCOL_VERSION,
        next_seq,
    };
    if let Ok(json) = serde_json::to_string(&hello) {
        if let Err(e) = sender.send(Message::Text(json)).await {
            tracing::debug!(error = %e, "Failed to send hello");
            return;
        }
    }

    let mut expected_seq = next_seq;

    let (pong_tx, mut pong_rx) = tokio::sync::mpsc::channel::<Vec<u8>>(8);
    let (close_tx, mut close_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(Message::Ping(data)) => {
                    tracing::trace!(len = data.len(), "Received ping");
                    let _ = pong_tx.send(data).await;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
        let _ = close_tx.send(());
    });

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        expected_seq = event.seq + 1;
                        let json = match serde_json::to_string(event.as_ref()) {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::warn!(seq = event.seq, error = %e, "Failed to encode event");
                                continue;
                            }
                        };
                        if let Err(e) = sender.send(Message::Text(json)).await {
                            tracing::debug!(error = %e, "Failed to send event");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, resume_from = expected_seq, "Subscriber lagged, closing");
                        let _ = sender.send(Message::Close(Some(CloseFrame {
                            code: LAGGED_CLOSE_CODE,
                            reason: format!("lagged:{}", expected_seq).into(),
                        }))).await;
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            Some(pong_data) = pong_rx.recv() => {
                if let Err(e) = sender.send(Message::Pong(pong_data)).await {
                    tracing::debug!(error = %e, "Failed to send pong");
                    break;
                }
            }
            _ = &mut close_rx => break,
        }
    }

    tracing::debug!("Event subscription ended");
}
