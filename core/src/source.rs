//! Decoding of the `source` attribute.
//!
//! Sources look like `<Role>.<instance>` (`Retailer.north`, `Carrier.fast`) or a
//! bare role (`Controller`). The role is decoded once at ingestion; everything
//! downstream matches on [`Role`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of an event's originator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Shop selling to customers
    Retailer,
    /// Producer of goods
    Supplier,
    /// Transport provider
    Carrier,
    /// A customer acting on the bus
    Passenger,
    /// This controller
    Controller,
    /// Vehicle telemetry, never mirrored to the dashboard
    Truck,
    /// Anything else
    Other,
}

impl Role {
    /// Decode the first segment of a source.
    #[must_use]
    pub fn parse(segment: &str) -> Self {
        match segment {
            "Retailer" => Self::Retailer,
            "Supplier" => Self::Supplier,
            "Carrier" => Self::Carrier,
            "Passenger" => Self::Passenger,
            "Controller" => Self::Controller,
            "Truck" => Self::Truck,
            _ => Self::Other,
        }
    }

    /// Canonical segment text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Retailer => "Retailer",
            Self::Supplier => "Supplier",
            Self::Carrier => "Carrier",
            Self::Passenger => "Passenger",
            Self::Controller => "Controller",
            Self::Truck => "Truck",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded source attribute.
///
/// `name` is the full source string; the registry keys participants by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source<'a> {
    /// Decoded role
    pub role: Role,
    /// Full source, e.g. `Retailer.north`
    pub name: &'a str,
    /// Instance part after the first `.`, if any
    pub instance: Option<&'a str>,
}

impl<'a> Source<'a> {
    /// Split a source into role and instance.
    #[must_use]
    pub fn parse(source: &'a str) -> Self {
        let (role, instance) = match source.split_once('.') {
            Some((role, instance)) => (role, Some(instance)),
            None => (source, None),
        };
        Self {
            role: Role::parse(role),
            name: source,
            instance,
        }
    }

    /// Whether this source names a concrete participant instance.
    #[must_use]
    pub const fn is_instance(&self) -> bool {
        self.instance.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_role_and_instance() {
        let source = Source::parse("Retailer.north.gate-3");
        assert_eq!(source.role, Role::Retailer);
        assert_eq!(source.instance, Some("north.gate-3"));
        assert_eq!(source.name, "Retailer.north.gate-3");
    }

    #[test]
    fn bare_role_has_no_instance() {
        let source = Source::parse("Controller");
        assert_eq!(source.role, Role::Controller);
        assert!(!source.is_instance());
    }

    #[test]
    fn unknown_roles_decode_as_other() {
        assert_eq!(Source::parse("Drone.x").role, Role::Other);
        assert_eq!(Source::parse("").role, Role::Other);
    }

    #[test]
    fn role_text_round_trips() {
        for role in [
            Role::Retailer,
            Role::Supplier,
            Role::Carrier,
            Role::Passenger,
            Role::Controller,
            Role::Truck,
        ] {
            assert_eq!(Role::parse(role.as_str()), role);
        }
    }
}
