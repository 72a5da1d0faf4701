//! Dashboard fan-out.
//!
//! Every viewer gets its own bounded buffer inside a `tokio::sync::broadcast`
//! channel. Sending never waits on a viewer: a viewer that falls further behind
//! than its buffer observes `Lagged` on its next receive and is disconnected
//! by its pump, while everyone else keeps receiving.

use tokio::sync::broadcast;

/// Default per-viewer buffer, in messages.
pub const DEFAULT_VIEWER_BUFFER: usize = 255;

/// Fan-out of JSON notifications to connected dashboard viewers.
///
/// Cloning is cheap; clones share the same set of viewers.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<String>,
}

impl BroadcastHub {
    /// Create a hub whose viewers each buffer up to `capacity` messages.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Deliver `message` to every connected viewer.
    ///
    /// Returns how many viewers were connected. Having none is not an error.
    pub fn broadcast(&self, message: impl Into<String>) -> usize {
        let message = message.into();
        tracing::trace!(%message, "broadcast");
        self.sender.send(message).unwrap_or(0)
    }

    /// Register a new viewer. It receives everything broadcast from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    /// Number of viewers currently registered.
    #[must_use]
    pub fn viewer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_VIEWER_BUFFER)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn every_viewer_receives_each_message() {
        let hub = BroadcastHub::default();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        assert_eq!(hub.broadcast(r#"{"type":"customer","r":0}"#), 2);

        assert_eq!(a.recv().await.unwrap(), r#"{"type":"customer","r":0}"#);
        assert_eq!(b.recv().await.unwrap(), r#"{"type":"customer","r":0}"#);
    }

    #[test]
    fn broadcasting_without_viewers_is_fine() {
        let hub = BroadcastHub::new(4);
        assert_eq!(hub.broadcast("x"), 0);
        assert_eq!(hub.viewer_count(), 0);
    }

    #[tokio::test]
    async fn slow_viewer_lags_without_blocking_others() {
        let hub = BroadcastHub::new(2);
        let mut slow = hub.subscribe();
        let mut fast = hub.subscribe();

        for i in 0..3 {
            hub.broadcast(i.to_string());
            assert_eq!(fast.recv().await.unwrap(), i.to_string());
        }

        assert!(matches!(slow.recv().await, Err(RecvError::Lagged(1))));
    }

    #[test]
    fn dropping_a_receiver_unregisters_the_viewer() {
        let hub = BroadcastHub::new(4);
        let viewer = hub.subscribe();
        assert_eq!(hub.viewer_count(), 1);
        drop(viewer);
        assert_eq!(hub.viewer_count(), 0);
    }
}
