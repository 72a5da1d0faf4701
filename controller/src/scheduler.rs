//! Job scheduler.
//!
//! Demand is one unit per (size, retailer), generated size-major in registry
//! order. Units go to suppliers round-robin; repeat (supplier, retailer) pairs
//! coalesce into one job carrying several sizes. Each resulting supplier job
//! is then handed to a carrier round-robin, with one counter across all
//! suppliers. Every recompute starts both counters from zero, so identical
//! registries always produce identical assignments.

use crate::engine::Engine;
use crate::registry::{CarrierJob, Size, SupplierJob};
use concourse_core::{CONTROLLER_SOURCE, CloudEvent, Role, types};
use concourse_runtime::metrics::TopologyMetrics;
use serde_json::json;
use tracing::debug;

/// Result of one scheduling pass, indexed like the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Jobs per supplier
    pub suppliers: Vec<Vec<SupplierJob>>,
    /// Jobs per carrier
    pub carriers: Vec<Vec<CarrierJob>>,
}

/// Compute a full assignment. `None` when there are no suppliers.
#[must_use]
pub fn compute_jobs(suppliers: &[&str], retailers: &[&str], carrier_count: usize) -> Option<Assignment> {
    if suppliers.is_empty() {
        return None;
    }

    let mut supplier_jobs: Vec<Vec<SupplierJob>> = vec![Vec::new(); suppliers.len()];
    let mut unit = 0;
    for size in Size::ALL {
        for retailer in retailers {
            let jobs = &mut supplier_jobs[unit % suppliers.len()];
            match jobs.iter_mut().find(|job| job.retailer == *retailer) {
                Some(job) => job.offers.push(size),
                None => jobs.push(SupplierJob {
                    retailer: (*retailer).to_string(),
                    offers: vec![size],
                }),
            }
            unit += 1;
        }
    }

    let mut carrier_jobs: Vec<Vec<CarrierJob>> = vec![Vec::new(); carrier_count];
    if carrier_count > 0 {
        let routes = suppliers
            .iter()
            .zip(&supplier_jobs)
            .flat_map(|(supplier, jobs)| jobs.iter().map(move |job| (*supplier, job)));
        for (route, (supplier, job)) in routes.enumerate() {
            carrier_jobs[route % carrier_count].push(CarrierJob {
                retailer: job.retailer.clone(),
                supplier: supplier.to_string(),
            });
        }
    }

    Some(Assignment {
        suppliers: supplier_jobs,
        carriers: carrier_jobs,
    })
}

impl Engine<'_> {
    /// Recompute every job list from scratch and publish the result.
    ///
    /// With no suppliers nothing is published. With no carriers only supplier
    /// lists go out. Empty lists are published too.
    pub fn recompute_jobs(&mut self) {
        TopologyMetrics::record_participants("supplier", self.market.count(Role::Supplier));
        TopologyMetrics::record_participants("retailer", self.market.count(Role::Retailer));
        TopologyMetrics::record_participants("carrier", self.market.count(Role::Carrier));

        let assignment = {
            let suppliers: Vec<&str> = self.market.suppliers.iter().map(|s| s.name.as_str()).collect();
            let retailers: Vec<&str> = self.market.retailers.iter().map(|r| r.name.as_str()).collect();
            compute_jobs(&suppliers, &retailers, self.market.carriers.len())
        };

        let Some(assignment) = assignment else {
            for carrier in &mut self.market.carriers {
                carrier.jobs.clear();
            }
            debug!("No suppliers, skipping job publish");
            return;
        };

        for (supplier, jobs) in self.market.suppliers.iter_mut().zip(assignment.suppliers) {
            supplier.jobs = jobs;
        }
        for (carrier, jobs) in self.market.carriers.iter_mut().zip(assignment.carriers) {
            carrier.jobs = jobs;
        }

        for index in 0..self.market.suppliers.len() {
            self.publish_supplier_jobs(index);
        }
        for index in 0..self.market.carriers.len() {
            self.publish_carrier_jobs(index);
        }
    }

    /// Publish the current job list of the supplier at `index`.
    pub fn publish_supplier_jobs(&self, index: usize) {
        if let Some(supplier) = self.market.suppliers.get(index) {
            self.publish(
                CloudEvent::new(types::OFFER_PRODUCT, CONTROLLER_SOURCE)
                    .with_subject(supplier.name.clone())
                    .with_data(json!(supplier.jobs)),
            );
        }
    }

    /// Publish the current job list of the carrier at `index`.
    pub fn publish_carrier_jobs(&self, index: usize) {
        if let Some(carrier) = self.market.carriers.get(index) {
            self.publish(
                CloudEvent::new(types::OFFER_TRANSPORT, CONTROLLER_SOURCE)
                    .with_subject(carrier.name.clone())
                    .with_data(json!(carrier.jobs)),
            );
        }
    }
}
