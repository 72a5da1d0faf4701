//! Participant registry.
//!
//! [`Marketplace`] is the single owned value behind the controller's lock. It
//! holds every supplier, retailer (with its customer queue) and carrier, plus
//! the watchdog's pending expectations. Participants are keyed by their full
//! source name and kept in arrival order; that order drives both the job
//! scheduler and the dashboard indices.
//!
//! Operations here are pure state changes. Side effects (dashboard notices,
//! bus publishes, job recompute) are layered on top by [`crate::engine`].

use crate::customer::Customer;
use crate::watchdog::Watchdog;
use concourse_core::Role;
use concourse_runtime::Deferred;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Offer size. Demand is generated per size, in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    /// First size
    Small,
    /// Second size
    Medium,
    /// Third size
    Large,
}

impl Size {
    /// Generation order.
    pub const ALL: [Self; 3] = [Self::Small, Self::Medium, Self::Large];

    /// Size selected by a customer's `o<index>` command.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Parse the wire name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|size| size.as_str() == name)
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

/// Demand a supplier serves for one retailer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierJob {
    /// Retailer source name
    #[serde(rename = "customer")]
    pub retailer: String,
    /// Sizes, in generation order
    #[serde(rename = "offer")]
    pub offers: Vec<Size>,
}

/// One (supplier, retailer) route a carrier serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierJob {
    /// Retailer source name
    #[serde(rename = "toLocation")]
    pub retailer: String,
    /// Supplier source name
    #[serde(rename = "fromLocation")]
    pub supplier: String,
}

/// Registered supplier.
#[derive(Debug, Clone, Serialize)]
pub struct Supplier {
    /// Source name, e.g. `Supplier.acme`
    pub name: String,
    /// Dashboard logo
    pub logo: String,
    /// Current assignment
    pub jobs: Vec<SupplierJob>,
}

/// Registered carrier.
#[derive(Debug, Clone, Serialize)]
pub struct Carrier {
    /// Source name, e.g. `Carrier.van`
    pub name: String,
    /// Dashboard logo
    pub logo: String,
    /// Current assignment
    pub jobs: Vec<CarrierJob>,
}

/// Registered retailer with its customer queue. The front customer is being served.
#[derive(Debug, Serialize)]
pub struct Retailer {
    /// Source name, e.g. `Retailer.north`
    #[serde(skip)]
    pub name: String,
    /// Display name shown on the dashboard
    #[serde(rename = "name")]
    pub organization: String,
    /// Dashboard logo
    pub logo: String,
    /// Queue, front first
    pub customers: VecDeque<Customer>,
}

/// Outcome of a connection announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A new participant was appended at this index
    Registered(usize),
    /// The name was already registered at this index; nothing was created
    Reconnected(usize),
}

/// A participant taken out of the registry, with the index it had.
#[derive(Debug)]
pub enum Removed {
    /// Removed supplier
    Supplier(usize, Supplier),
    /// Removed retailer, customers included
    Retailer(usize, Retailer),
    /// Removed carrier
    Carrier(usize, Carrier),
}

/// All shared controller state.
#[derive(Debug, Default, Serialize)]
pub struct Marketplace {
    /// Customer joins are refused while set
    pub disabled: bool,
    /// Suppliers in arrival order
    pub suppliers: Vec<Supplier>,
    /// Retailers in arrival order
    pub retailers: Vec<Retailer>,
    /// Carriers in arrival order
    pub carriers: Vec<Carrier>,
    #[serde(skip)]
    pub(crate) watchdog: Watchdog,
    #[serde(skip)]
    pub(crate) transits: Vec<Deferred>,
}

impl Marketplace {
    /// Empty marketplace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a supplier, or report a reconnect if the name is known.
    pub fn register_supplier(&mut self, name: &str, logo: &str) -> Registration {
        if let Some(index) = self.suppliers.iter().position(|s| s.name == name) {
            return Registration::Reconnected(index);
        }
        self.suppliers.push(Supplier {
            name: name.to_string(),
            logo: logo.to_string(),
            jobs: Vec::new(),
        });
        Registration::Registered(self.suppliers.len() - 1)
    }

    /// Register a retailer, or report a reconnect if the name is known.
    pub fn register_retailer(&mut self, name: &str, organization: &str, logo: &str) -> Registration {
        if let Some(index) = self.retailers.iter().position(|r| r.name == name) {
            return Registration::Reconnected(index);
        }
        self.retailers.push(Retailer {
            name: name.to_string(),
            organization: organization.to_string(),
            logo: logo.to_string(),
            customers: VecDeque::new(),
        });
        Registration::Registered(self.retailers.len() - 1)
    }

    /// Register a carrier, or report a reconnect if the name is known.
    pub fn register_carrier(&mut self, name: &str, logo: &str) -> Registration {
        if let Some(index) = self.carriers.iter().position(|c| c.name == name) {
            return Registration::Reconnected(index);
        }
        self.carriers.push(Carrier {
            name: name.to_string(),
            logo: logo.to_string(),
            jobs: Vec::new(),
        });
        Registration::Registered(self.carriers.len() - 1)
    }

    /// Remove a participant. Absent names and non-participant roles are a no-op.
    pub fn unregister(&mut self, role: Role, name: &str) -> Option<Removed> {
        let index = self.index_of(role, name)?;
        match role {
            Role::Supplier => Some(Removed::Supplier(index, self.suppliers.remove(index))),
            Role::Retailer => Some(Removed::Retailer(index, self.retailers.remove(index))),
            Role::Carrier => Some(Removed::Carrier(index, self.carriers.remove(index))),
            _ => None,
        }
    }

    /// Dashboard index of a participant.
    #[must_use]
    pub fn index_of(&self, role: Role, name: &str) -> Option<usize> {
        match role {
            Role::Supplier => self.suppliers.iter().position(|s| s.name == name),
            Role::Retailer => self.retailers.iter().position(|r| r.name == name),
            Role::Carrier => self.carriers.iter().position(|c| c.name == name),
            _ => None,
        }
    }

    /// Whether a participant is registered.
    #[must_use]
    pub fn contains(&self, role: Role, name: &str) -> bool {
        self.index_of(role, name).is_some()
    }

    /// Look up a supplier.
    #[must_use]
    pub fn supplier(&self, name: &str) -> Option<&Supplier> {
        self.suppliers.iter().find(|s| s.name == name)
    }

    /// Look up a retailer.
    #[must_use]
    pub fn retailer(&self, name: &str) -> Option<&Retailer> {
        self.retailers.iter().find(|r| r.name == name)
    }

    /// Look up a carrier.
    #[must_use]
    pub fn carrier(&self, name: &str) -> Option<&Carrier> {
        self.carriers.iter().find(|c| c.name == name)
    }

    /// The first supplier holding a job for `retailer`.
    #[must_use]
    pub fn handling_supplier(&self, retailer: &str) -> Option<&Supplier> {
        self.suppliers
            .iter()
            .find(|s| s.jobs.iter().any(|j| j.retailer == retailer))
    }

    /// The first carrier holding the (`retailer`, `supplier`) route.
    #[must_use]
    pub fn handling_carrier(&self, retailer: &str, supplier: &str) -> Option<&Carrier> {
        self.carriers.iter().find(|c| {
            c.jobs
                .iter()
                .any(|j| j.retailer == retailer && j.supplier == supplier)
        })
    }

    /// Queue position `(retailer index, customer index)` of a customer.
    #[must_use]
    pub fn locate(&self, customer_id: &str) -> Option<(usize, usize)> {
        self.retailers.iter().enumerate().find_map(|(ri, r)| {
            r.customers
                .iter()
                .position(|c| c.id == customer_id)
                .map(|ci| (ri, ci))
        })
    }

    /// Look up a customer in any queue.
    #[must_use]
    pub fn customer(&self, customer_id: &str) -> Option<&Customer> {
        let (ri, ci) = self.locate(customer_id)?;
        self.retailers.get(ri)?.customers.get(ci)
    }

    /// Mutable lookup of a customer in any queue.
    pub fn customer_mut(&mut self, customer_id: &str) -> Option<&mut Customer> {
        let (ri, ci) = self.locate(customer_id)?;
        self.retailers.get_mut(ri)?.customers.get_mut(ci)
    }

    /// Number of registered participants of a role.
    #[must_use]
    pub fn count(&self, role: Role) -> usize {
        match role {
            Role::Supplier => self.suppliers.len(),
            Role::Retailer => self.retailers.len(),
            Role::Carrier => self.carriers.len(),
            _ => 0,
        }
    }

    /// Drop every participant and customer. Customer timers are cancelled with them.
    pub fn clear_participants(&mut self) {
        self.suppliers.clear();
        self.retailers.clear();
        self.carriers.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn registering_twice_is_a_reconnect() {
        let mut market = Marketplace::new();
        assert_eq!(
            market.register_supplier("Supplier.a", "a.png"),
            Registration::Registered(0)
        );
        assert_eq!(
            market.register_supplier("Supplier.b", "b.png"),
            Registration::Registered(1)
        );
        assert_eq!(
            market.register_supplier("Supplier.a", "other.png"),
            Registration::Reconnected(0)
        );
        assert_eq!(market.suppliers.len(), 2);
        assert_eq!(market.suppliers[0].logo, "a.png");
    }

    #[test]
    fn unregister_reports_the_prior_index() {
        let mut market = Marketplace::new();
        market.register_carrier("Carrier.a", "");
        market.register_carrier("Carrier.b", "");

        let removed = market.unregister(Role::Carrier, "Carrier.b").unwrap();
        assert!(matches!(removed, Removed::Carrier(1, ref c) if c.name == "Carrier.b"));
        assert!(market.unregister(Role::Carrier, "Carrier.b").is_none());
        assert!(market.unregister(Role::Passenger, "Carrier.a").is_none());
    }

    #[test]
    fn same_name_in_different_roles_is_allowed() {
        let mut market = Marketplace::new();
        market.register_supplier("x", "");
        market.register_carrier("x", "");
        assert!(market.contains(Role::Supplier, "x"));
        assert!(market.contains(Role::Carrier, "x"));
        assert!(!market.contains(Role::Retailer, "x"));
    }

    #[test]
    fn handling_lookups_follow_jobs() {
        let mut market = Marketplace::new();
        market.register_supplier("Supplier.a", "");
        market.register_carrier("Carrier.a", "");
        market.suppliers[0].jobs.push(SupplierJob {
            retailer: "Retailer.r".into(),
            offers: vec![Size::Small],
        });
        market.carriers[0].jobs.push(CarrierJob {
            retailer: "Retailer.r".into(),
            supplier: "Supplier.a".into(),
        });

        assert_eq!(
            market.handling_supplier("Retailer.r").map(|s| s.name.as_str()),
            Some("Supplier.a")
        );
        assert!(market.handling_supplier("Retailer.x").is_none());
        assert!(market.handling_carrier("Retailer.r", "Supplier.a").is_some());
        assert!(market.handling_carrier("Retailer.r", "Supplier.b").is_none());
    }

    #[test]
    fn snapshot_shape() {
        let mut market = Marketplace::new();
        market.register_retailer("Retailer.north", "North Co", "n.png");
        market.register_supplier("Supplier.a", "a.png");

        let json = serde_json::to_value(&market).unwrap();
        assert_eq!(json["disabled"], false);
        assert_eq!(json["retailers"][0]["name"], "North Co");
        assert_eq!(json["retailers"][0]["customers"], serde_json::json!([]));
        assert_eq!(json["suppliers"][0]["name"], "Supplier.a");
        assert_eq!(json["suppliers"][0]["jobs"], serde_json::json!([]));
        assert_eq!(json["carriers"], serde_json::json!([]));
        assert!(json.get("watchdog").is_none());
    }

    #[test]
    fn sizes_parse_by_index_and_name() {
        assert_eq!(Size::from_index(1), Some(Size::Medium));
        assert_eq!(Size::from_index(3), None);
        assert_eq!(Size::parse("large"), Some(Size::Large));
        assert_eq!(Size::parse("huge"), None);
    }
}
