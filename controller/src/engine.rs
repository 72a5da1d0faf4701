//! Stateful engine.
//!
//! An [`Engine`] is a view of the [`Marketplace`] while the controller's write
//! lock is held, together with the controller's outputs (dashboard hub,
//! outbox, timers). Every mutation in the crate runs through it, synchronously:
//! nothing here awaits, so the lock is never held across a suspension point.
//!
//! This module holds topology changes. Customer, watchdog, scheduler and
//! dispatch operations are implemented on `Engine` in their own modules.

use crate::config::Timings;
use crate::customer::SatisfyKind;
use crate::notice::Notice;
use crate::registry::{Marketplace, Registration, Removed};
use crate::state::Controller;
use concourse_core::{CONTROLLER_SOURCE, CloudEvent, Role, types};
use concourse_runtime::Deferred;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

/// Display attributes announced in a `Connection` event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Announcement {
    /// Retailer display name
    pub organization: String,
    /// Dashboard logo
    pub logo: String,
}

/// Exclusive access to the marketplace plus the controller's outputs.
pub struct Engine<'a> {
    pub(crate) market: &'a mut Marketplace,
    pub(crate) ctl: &'a Controller,
}

impl<'a> Engine<'a> {
    /// Wrap a locked marketplace.
    pub fn new(market: &'a mut Marketplace, ctl: &'a Controller) -> Self {
        Self { market, ctl }
    }
}

impl Engine<'_> {
    /// Read access to the state.
    #[must_use]
    pub fn market(&self) -> &Marketplace {
        &*self.market
    }

    pub(crate) fn timings(&self) -> Timings {
        self.ctl.timings()
    }

    /// Broadcast a dashboard notice.
    pub(crate) fn notify(&self, notice: &Notice<'_>) {
        self.ctl.hub().broadcast(notice.to_json());
    }

    /// Queue a controller-originated event for publishing.
    pub(crate) fn publish(&self, event: CloudEvent) {
        self.ctl.outbox().publish(event);
    }

    /// Schedule `task` to run against the engine after `delay`.
    ///
    /// The task re-acquires the lock when it fires and must re-check that what
    /// it was armed for still exists.
    pub(crate) fn defer<F>(&self, delay: Duration, task: F) -> Deferred
    where
        F: FnOnce(&mut Engine<'_>) + Send + 'static,
    {
        let ctl = self.ctl.clone();
        Deferred::spawn(delay, async move {
            ctl.with_engine(task).await;
        })
    }

    /// Register a participant, or republish its jobs if it is already known.
    pub fn connect(&mut self, role: Role, name: &str, announcement: &Announcement) {
        let registration = match role {
            Role::Supplier => self.market.register_supplier(name, &announcement.logo),
            Role::Retailer => {
                self.market
                    .register_retailer(name, &announcement.organization, &announcement.logo)
            }
            Role::Carrier => self.market.register_carrier(name, &announcement.logo),
            _ => return,
        };

        match registration {
            Registration::Registered(_) => {
                let logo = announcement.logo.as_str();
                self.notify(&match role {
                    Role::Supplier => Notice::Supplier { logo },
                    Role::Retailer => Notice::Retailer { logo },
                    _ => Notice::Carrier { logo },
                });
                info!(participant = %name, %role, "Participant connected");
                self.recompute_jobs();
            }
            Registration::Reconnected(index) => {
                info!(participant = %name, %role, "Participant reconnected");
                match role {
                    Role::Supplier => self.publish_supplier_jobs(index),
                    Role::Carrier => self.publish_carrier_jobs(index),
                    _ => {}
                }
            }
        }
    }

    /// Remove a participant: notify viewers, recompute jobs and announce the
    /// disconnect on the bus. Customers of a removed retailer are closed.
    ///
    /// Returns `false` if the participant was not registered.
    pub fn disconnect(&mut self, role: Role, name: &str) -> bool {
        let Some(mut removed) = self.market.unregister(role, name) else {
            return false;
        };

        match &mut removed {
            Removed::Supplier(s, _) => self.notify(&Notice::RemoveSupplier { s: *s }),
            Removed::Carrier(c, _) => self.notify(&Notice::RemoveCarrier { c: *c }),
            Removed::Retailer(r, retailer) => {
                for customer in &mut retailer.customers {
                    customer.finish(SatisfyKind::Closed);
                }
                self.notify(&Notice::RemoveRetailer { r: *r });
            }
        }
        drop(removed);

        self.recompute_jobs();
        self.publish(CloudEvent::new(types::DISCONNECT, CONTROLLER_SOURCE).with_subject(name));
        info!(participant = %name, %role, "Participant disconnected");
        true
    }

    /// Global reset requested by a participant.
    ///
    /// Closes every customer, removes every participant, drops pending
    /// expectations and re-announces `Reset` to the bus.
    pub fn reset(&mut self) {
        self.close_all();

        for _ in &self.market.retailers {
            self.notify(&Notice::RemoveRetailer { r: 0 });
        }
        for _ in &self.market.suppliers {
            self.notify(&Notice::RemoveSupplier { s: 0 });
        }
        for _ in &self.market.carriers {
            self.notify(&Notice::RemoveCarrier { c: 0 });
        }

        self.market.clear_participants();
        self.clear_expectations();
        self.recompute_jobs();
        self.publish(CloudEvent::new(types::RESET, CONTROLLER_SOURCE));
        info!("Marketplace reset");
    }
}
