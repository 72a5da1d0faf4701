//! Dashboard viewer WebSocket.
//!
//! Viewers only listen. Each connection subscribes to the [`BroadcastHub`] and
//! forwards every notification as a text frame until the client goes away or
//! falls behind its buffer.
//!
//! # Architecture
//!
//! ```text
//! Viewer              Pump                    BroadcastHub
//!   │                  │                           │
//!   ├─ Connect ───────>├─ subscribe() ────────────>│
//!   │                  │<── notification ──────────┤
//!   │<─ text frame ────┤                           │
//!   │                  │<── Lagged ────────────────┤  (buffer overflow)
//!   │<─ close ─────────┤                           │
//! ```

use crate::hub::BroadcastHub;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use concourse_runtime::metrics::TopologyMetrics;
use futures::{SinkExt, stream::StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// What the pump does with one receive from the hub.
#[derive(Debug, PartialEq, Eq)]
enum Next {
    Forward(String),
    Disconnect,
}

fn next_step(received: Result<String, RecvError>) -> Next {
    match received {
        Ok(message) => Next::Forward(message),
        Err(RecvError::Lagged(skipped)) => {
            warn!(skipped, "Viewer fell behind its buffer, disconnecting");
            Next::Disconnect
        }
        Err(RecvError::Closed) => Next::Disconnect,
    }
}

/// Upgrade handler for `GET /ws_view`.
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn handle(ws: WebSocketUpgrade, State(hub): State<BroadcastHub>) -> Response {
    ws.on_upgrade(move |socket| pump(socket, hub))
}

/// Forward hub notifications to one viewer until either side stops.
pub async fn pump(socket: WebSocket, hub: BroadcastHub) {
    let (mut sender, mut receiver) = socket.split();
    let mut notifications = hub.subscribe();
    TopologyMetrics::record_viewers(hub.viewer_count());
    info!(viewers = hub.viewer_count(), "Viewer connected");

    let mut send_task = tokio::spawn(async move {
        loop {
            match next_step(notifications.recv().await) {
                Next::Forward(message) => {
                    if sender.send(Message::Text(message)).await.is_err() {
                        break;
                    }
                }
                Next::Disconnect => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        debug!("Viewer send task terminated");
    });

    // Viewers never send anything meaningful; reading only detects the close.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
        debug!("Viewer receive task terminated");
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => {
            send_task.abort();
            // Wait for the receiver to drop so the viewer count is accurate.
            let _ = send_task.await;
        }
    }
    TopologyMetrics::record_viewers(hub.viewer_count());
    info!(viewers = hub.viewer_count(), "Viewer disconnected");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_forwarded() {
        assert_eq!(
            next_step(Ok("{}".to_string())),
            Next::Forward("{}".to_string())
        );
    }

    #[test]
    fn lagging_or_closed_hub_disconnects() {
        assert_eq!(next_step(Err(RecvError::Lagged(3))), Next::Disconnect);
        assert_eq!(next_step(Err(RecvError::Closed)), Next::Disconnect);
    }
}
