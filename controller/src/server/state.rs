//! Application state for the controller HTTP server.

use crate::state::Controller;
use axum::extract::FromRef;
use concourse_web::BroadcastHub;
use metrics_exporter_prometheus::PrometheusHandle;

/// State shared by every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// The running controller
    pub controller: Controller,

    /// Prometheus exposition, absent when no recorder could be installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create application state.
    #[must_use]
    pub const fn new(controller: Controller, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            controller,
            metrics,
        }
    }
}

impl FromRef<AppState> for Controller {
    fn from_ref(state: &AppState) -> Self {
        state.controller.clone()
    }
}

impl FromRef<AppState> for BroadcastHub {
    fn from_ref(state: &AppState) -> Self {
        state.controller.hub().clone()
    }
}
