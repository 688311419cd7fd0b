//! Printer handlers

use std::time::Duration;

use axum::{
    Json,
    extract::{Path, State},
};
use crab_printer::{
    DEFAULT_PORT, DiscoveredNetworkPrinter, UsbDiscovery, probe_network, split_host_port,
    subnet_candidates,
};
use serde::Deserialize;
use shared::models::PrinterConfig;

use crate::core::ServerState;
use crate::utils::{AppError, AppResponse, AppResult, ok, ok_with_message};

const DEFAULT_PROBE_TIMEOUT_MS: u64 = 500;
const MAX_PROBE_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Default, Deserialize)]
pub struct NetworkDiscoveryRequest {
    /// Explicit hosts, `"ip"` or `"ip:port"`
    #[serde(default)]
    pub candidates: Vec<String>,
    /// /24 to sweep, e.g. `"192.168.1"`
    #[serde(default)]
    pub subnet: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// GET /printers
pub async fn list(
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<Vec<PrinterConfig>>>> {
    let printers = state.store.list_printers().await?;
    Ok(ok(printers))
}

/// POST /printers
pub async fn save(
    State(state): State<ServerState>,
    Json(printer): Json<PrinterConfig>,
) -> AppResult<Json<AppResponse<PrinterConfig>>> {
    let saved = state.store.save_printer(printer).await?;
    tracing::info!(printer_id = %saved.id, name = %saved.name, role = %saved.role, "Printer saved");
    Ok(ok_with_message(saved, "Printer saved"))
}

/// DELETE /printers/{id}
pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<bool>>> {
    state.store.delete_printer(&id).await?;
    tracing::info!(printer_id = %id, "Printer deleted");
    Ok(ok(true))
}

/// GET /printers/discover/usb
///
/// Enumeration failures are reported in the body, not as an HTTP error.
pub async fn discover_usb(
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<UsbDiscovery>>> {
    let usb = state.usb.clone();
    let discovery = tokio::task::spawn_blocking(move || usb.discover())
        .await
        .map_err(|e| AppError::Internal(format!("USB discovery task failed: {}", e)))?;
    Ok(ok(discovery))
}

/// POST /printers/discover/network
pub async fn discover_network(
    Json(req): Json<NetworkDiscoveryRequest>,
) -> AppResult<Json<AppResponse<Vec<DiscoveredNetworkPrinter>>>> {
    let port = req.port.unwrap_or(DEFAULT_PORT);
    let mut candidates = req
        .candidates
        .iter()
        .map(|c| parse_candidate(c, port))
        .collect::<AppResult<Vec<_>>>()?;

    if let Some(subnet) = &req.subnet {
        let swept =
            subnet_candidates(subnet, port).map_err(|e| AppError::Validation(e.to_string()))?;
        candidates.extend(swept);
    }
    if candidates.is_empty() {
        return Err(AppError::Validation(
            "candidates or subnet is required".into(),
        ));
    }
    candidates.sort();
    candidates.dedup();

    let timeout = Duration::from_millis(
        req.timeout_ms
            .unwrap_or(DEFAULT_PROBE_TIMEOUT_MS)
            .clamp(1, MAX_PROBE_TIMEOUT_MS),
    );
    let found = probe_network(candidates, timeout).await;
    Ok(ok(found))
}

/// `"ip"`, `"ip:port"` or `"[ipv6]:port"`
fn parse_candidate(raw: &str, default_port: u16) -> AppResult<(String, u16)> {
    let raw = raw.trim();
    let invalid = || AppError::Validation(format!("Invalid candidate: {}", raw));
    let (host, port) = split_host_port(raw).ok_or_else(invalid)?;
    if host.is_empty() {
        return Err(AppError::Validation("Empty candidate".into()));
    }
    let port = match port {
        Some(port) => port.parse().map_err(|_| invalid())?,
        None => default_port,
    };
    Ok((host.to_string(), port))
}
