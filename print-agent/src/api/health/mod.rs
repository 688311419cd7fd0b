//! Health check
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | /health | GET | Agent identity, configured printer roles, USB capability, worker state |
//!
//! ```json
//! {
//!   "status": "ok",
//!   "version": "0.1.0",
//!   "agent_id": "print-agent-counter",
//!   "printer_roles": ["counter", "kitchen"],
//!   "usb_available": true,
//!   "push_enabled": true,
//!   "in_flight": 0
//! }
//! ```

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use shared::models::PrinterRole;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// ok | degraded
    status: &'static str,
    version: &'static str,
    agent_id: String,
    /// Roles with at least one active printer
    printer_roles: Vec<PrinterRole>,
    usb_available: bool,
    /// Whether the store pushes inserts (otherwise poll only)
    push_enabled: bool,
    in_flight: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    store_error: Option<String>,
    /// Workers that exited or panicked
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stopped_workers: Vec<String>,
}

/// Plain JSON (no envelope) so probes can read it directly
pub async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let dispatcher = state.dispatcher.status();

    let (printer_roles, store_error) = match state.store.list_printers().await {
        Ok(printers) => {
            let mut roles: Vec<_> = printers
                .iter()
                .filter(|p| p.is_active)
                .map(|p| p.role)
                .collect();
            roles.sort();
            roles.dedup();
            (roles, None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not read printers");
            (Vec::new(), Some(e.to_string()))
        }
    };

    let stopped_workers = state.tasks.failed_workers();
    let healthy = store_error.is_none() && stopped_workers.is_empty();

    Json(HealthResponse {
        status: if healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        agent_id: dispatcher.agent_id,
        printer_roles,
        usb_available: state.usb.is_available(),
        push_enabled: dispatcher.push_enabled,
        in_flight: dispatcher.in_flight,
        store_error,
        stopped_workers,
    })
}
