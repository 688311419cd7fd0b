//! Direct print handlers

use std::future::Future;

use axum::{Json, extract::State};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use crab_printer::{DrawerPin, plain_text_job};
use serde::{Deserialize, Serialize};
use shared::models::{JobType, PrinterRole};

use crate::core::ServerState;
use crate::printing::DispatchError;
use crate::utils::{AppError, AppResponse, AppResult, ok_with_message};

/// Lines fed after a plain text job, before the cut
const PLAIN_TEXT_FEED: u8 = 3;

#[derive(Debug, Deserialize)]
pub struct DirectPrintRequest {
    pub job_type: JobType,
    pub printer_role: PrinterRole,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct RawPrintRequest {
    pub printer_role: PrinterRole,
    /// Base64 printer bytes; wins over `text`
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DrawerRequest {
    #[serde(default = "default_drawer_role")]
    pub printer_role: PrinterRole,
    /// Kick connector pin, 2 (default) or 5
    #[serde(default)]
    pub pin: Option<u8>,
}

fn default_drawer_role() -> PrinterRole {
    PrinterRole::Counter
}

#[derive(Debug, Serialize)]
pub struct DirectPrintResponse {
    /// Name of the printer that received the data
    pub printer: String,
}

/// Run a direct print operation within the interactive timeout
async fn bounded<F>(state: &ServerState, operation: F) -> AppResult<String>
where
    F: Future<Output = Result<String, DispatchError>>,
{
    let limit = state.config.interactive_timeout();
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(AppError::Timeout(format!(
            "printer did not respond within {} ms",
            limit.as_millis()
        ))),
    }
}

/// POST /print - render and print immediately
pub async fn print(
    State(state): State<ServerState>,
    Json(req): Json<DirectPrintRequest>,
) -> AppResult<Json<AppResponse<DirectPrintResponse>>> {
    let printer = bounded(
        &state,
        state
            .dispatcher
            .print_direct(req.job_type, req.printer_role, &req.payload),
    )
    .await?;

    Ok(ok_with_message(
        DirectPrintResponse { printer },
        format!("{} printed", req.job_type),
    ))
}

/// POST /print/raw - raw bytes or plain text
pub async fn print_raw(
    State(state): State<ServerState>,
    Json(req): Json<RawPrintRequest>,
) -> AppResult<Json<AppResponse<DirectPrintResponse>>> {
    let data = match (&req.data, &req.text) {
        (Some(encoded), _) => STANDARD
            .decode(encoded.trim())
            .map_err(|e| AppError::Validation(format!("data is not valid base64: {}", e)))?,
        (None, Some(text)) => plain_text_job(text, PLAIN_TEXT_FEED),
        (None, None) => {
            return Err(AppError::Validation("either data or text is required".into()));
        }
    };
    if data.is_empty() {
        return Err(AppError::Validation("nothing to print".into()));
    }

    let printer = bounded(&state, state.dispatcher.send_raw(req.printer_role, &data)).await?;
    Ok(ok_with_message(DirectPrintResponse { printer }, "Data sent"))
}

/// POST /drawer - cash drawer kick
pub async fn open_drawer(
    State(state): State<ServerState>,
    Json(req): Json<DrawerRequest>,
) -> AppResult<Json<AppResponse<DirectPrintResponse>>> {
    let pin = match req.pin {
        None => DrawerPin::default(),
        Some(n) => DrawerPin::from_number(n)
            .ok_or_else(|| AppError::Validation(format!("Drawer pin must be 2 or 5, got {}", n)))?,
    };
    let printer = bounded(&state, state.dispatcher.open_drawer(req.printer_role, pin)).await?;
    Ok(ok_with_message(DirectPrintResponse { printer }, "Drawer opened"))
}
