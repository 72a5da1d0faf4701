//! Property tests for the registry, the scheduler and customer state.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use concourse_controller::customer::{Customer, CustomerState};
use concourse_controller::registry::{Marketplace, Size};
use concourse_controller::scheduler::compute_jobs;
use concourse_core::Role;
use proptest::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Op {
    Register(Role, u8),
    Unregister(Role, u8),
}

fn role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Supplier), Just(Role::Retailer), Just(Role::Carrier)]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (role(), 0..6_u8).prop_map(|(role, n)| Op::Register(role, n)),
        (role(), 0..6_u8).prop_map(|(role, n)| Op::Unregister(role, n)),
    ]
}

fn state() -> impl Strategy<Value = CustomerState> {
    prop_oneof![
        Just(CustomerState::Walking),
        Just(CustomerState::Inline),
        Just(CustomerState::Ordering),
        Just(CustomerState::Ordered),
        Just(CustomerState::Satisfied),
    ]
}

fn names(market: &Marketplace, role: Role) -> Vec<String> {
    match role {
        Role::Supplier => market.suppliers.iter().map(|s| s.name.clone()).collect(),
        Role::Retailer => market.retailers.iter().map(|r| r.name.clone()).collect(),
        _ => market.carriers.iter().map(|c| c.name.clone()).collect(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    /// Names stay unique per role whatever the connect/disconnect sequence.
    #[test]
    fn registry_names_stay_unique(ops in prop::collection::vec(op(), 0..64)) {
        let mut market = Marketplace::new();
        for op in ops {
            match op {
                Op::Register(role, n) => {
                    let name = format!("{role}.{n}");
                    match role {
                        Role::Supplier => { market.register_supplier(&name, ""); }
                        Role::Retailer => { market.register_retailer(&name, "", ""); }
                        _ => { market.register_carrier(&name, ""); }
                    }
                }
                Op::Unregister(role, n) => {
                    market.unregister(role, &format!("{role}.{n}"));
                }
            }
            for role in [Role::Supplier, Role::Retailer, Role::Carrier] {
                let names = names(&market, role);
                let unique: HashSet<_> = names.iter().collect();
                prop_assert_eq!(unique.len(), names.len());
            }
        }
    }

    /// The same registry always yields the same assignment, and every unit
    /// of demand is assigned exactly once.
    #[test]
    fn scheduling_is_deterministic_and_complete(
        suppliers in 1..5_usize,
        retailers in 0..6_usize,
        carriers in 0..4_usize,
    ) {
        let supplier_names: Vec<String> = (0..suppliers).map(|i| format!("Supplier.{i}")).collect();
        let retailer_names: Vec<String> = (0..retailers).map(|i| format!("Retailer.{i}")).collect();
        let s: Vec<&str> = supplier_names.iter().map(String::as_str).collect();
        let r: Vec<&str> = retailer_names.iter().map(String::as_str).collect();

        let first = compute_jobs(&s, &r, carriers).unwrap();
        let second = compute_jobs(&s, &r, carriers).unwrap();
        prop_assert_eq!(&first, &second);

        let units: usize = first
            .suppliers
            .iter()
            .flatten()
            .map(|job| job.offers.len())
            .sum();
        prop_assert_eq!(units, Size::ALL.len() * retailers);

        let supplier_jobs: usize = first.suppliers.iter().map(Vec::len).sum();
        let carrier_jobs: usize = first.carriers.iter().map(Vec::len).sum();
        if carriers > 0 {
            prop_assert_eq!(carrier_jobs, supplier_jobs);
        } else {
            prop_assert!(first.carriers.is_empty());
        }
    }

    /// Customer state never moves backwards, and nothing leaves `Satisfied`.
    #[test]
    fn customer_state_is_monotonic(targets in prop::collection::vec(state(), 0..32)) {
        let mut customer = Customer::new("c".to_string(), None);
        for target in targets {
            let before = customer.state();
            let moved = customer.advance(target);
            let after = customer.state();

            prop_assert!(after >= before);
            prop_assert_eq!(moved, after != before);
            if before == CustomerState::Satisfied {
                prop_assert_eq!(after, CustomerState::Satisfied);
            }
            if moved && after != CustomerState::Satisfied {
                prop_assert_eq!(after as u8, before as u8 + 1);
            }
        }
    }
}
