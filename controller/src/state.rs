//! Shared controller handle.
//!
//! [`Controller`] is a cheap clone around the marketplace lock and the
//! controller's outputs. Bus processing, WebSocket sessions and timers all go
//! through it; mutations take the write lock and run an [`Engine`] to
//! completion before releasing it, snapshot reads take the read lock.

use crate::config::Timings;
use crate::customer::ClientSender;
use crate::engine::Engine;
use crate::notice::Notice;
use crate::outbox::Outbox;
use crate::registry::{Marketplace, Size};
use concourse_core::{BusMessage, CONTROLLER_SOURCE, CloudEvent, types};
use concourse_runtime::metrics::EngineMetrics;
use concourse_web::BroadcastHub;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

struct Inner {
    market: RwLock<Marketplace>,
    hub: BroadcastHub,
    outbox: Outbox,
    timings: Timings,
}

/// Handle to the running controller.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("timings", &self.inner.timings)
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Create a controller with an empty marketplace.
    #[must_use]
    pub fn new(hub: BroadcastHub, outbox: Outbox, timings: Timings) -> Self {
        Self {
            inner: Arc::new(Inner {
                market: RwLock::new(Marketplace::new()),
                hub,
                outbox,
                timings,
            }),
        }
    }

    /// Dashboard fan-out.
    #[must_use]
    pub fn hub(&self) -> &BroadcastHub {
        &self.inner.hub
    }

    /// Outbound bus queue.
    #[must_use]
    pub fn outbox(&self) -> &Outbox {
        &self.inner.outbox
    }

    /// Configured delays.
    #[must_use]
    pub fn timings(&self) -> Timings {
        self.inner.timings
    }

    /// Run `f` with exclusive access to the marketplace.
    pub async fn with_engine<R>(&self, f: impl FnOnce(&mut Engine<'_>) -> R) -> R {
        let mut market = self.inner.market.write().await;
        let mut engine = Engine::new(&mut market, self);
        f(&mut engine)
    }

    /// Decode and dispatch one bus message. Undecodable messages are logged
    /// and skipped.
    pub async fn process(&self, message: &BusMessage) {
        match CloudEvent::from_message(message) {
            Ok(event) => {
                self.with_engine(|engine| engine.dispatch(&event, message))
                    .await;
            }
            Err(e) => {
                EngineMetrics::record_malformed();
                warn!(error = %e, "Undecodable bus message, skipping");
            }
        }
    }

    /// Registry snapshot as served at `/data`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub async fn snapshot(&self) -> serde_json::Result<serde_json::Value> {
        let market = self.inner.market.read().await;
        serde_json::to_value(&*market)
    }

    /// Queue a new customer at retailer `retailer_index`, unless `current`
    /// names a customer that is still queued.
    pub async fn join(
        &self,
        retailer_index: usize,
        client: ClientSender,
        current: Option<&str>,
    ) -> Option<String> {
        self.with_engine(|engine| {
            if current.is_some_and(|id| engine.market().locate(id).is_some()) {
                return None;
            }
            engine.join(retailer_index, Some(client))
        })
        .await
    }

    /// Rebind `client` to an existing customer session.
    pub async fn rejoin(&self, customer_id: &str, client: ClientSender) -> bool {
        self.with_engine(|engine| engine.rejoin(customer_id, client))
            .await
    }

    /// Submit the size at `size_index` for a customer. Unknown sizes are ignored.
    pub async fn submit_order(&self, customer_id: &str, size_index: usize) -> bool {
        let Some(size) = Size::from_index(size_index) else {
            return false;
        };
        self.with_engine(|engine| engine.submit_order(customer_id, size))
            .await
    }

    /// Broadcast a customer's queue position to viewers.
    pub async fn jump(&self, customer_id: &str) -> bool {
        let market = self.inner.market.read().await;
        let Some((r, c)) = market.locate(customer_id) else {
            return false;
        };
        self.inner.hub.broadcast(Notice::Jump { r, c }.to_json());
        true
    }

    /// Toggle the administrative disable.
    pub async fn set_disabled(&self, disabled: bool) {
        self.with_engine(|engine| engine.set_disabled(disabled))
            .await;
    }

    /// Ask every participant to reconnect.
    pub fn announce_reset(&self) {
        info!("Announcing reset to participants");
        self.inner
            .outbox
            .publish(CloudEvent::new(types::RESET, CONTROLLER_SOURCE));
    }
}
