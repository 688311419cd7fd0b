//! Print job handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shared::models::{JobPayload, PrintJob, PrintJobCreate};

use crate::core::ServerState;
use crate::utils::{AppError, AppResponse, AppResult, ok, ok_with_message};

/// GET /jobs - pending jobs
pub async fn list_pending(
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<Vec<PrintJob>>>> {
    let jobs = state.store.list_pending().await?;
    Ok(ok(jobs))
}

/// GET /jobs/{id}
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<PrintJob>>> {
    let job = state
        .store
        .get_job(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;
    Ok(ok(job))
}

/// POST /jobs - enqueue
///
/// The payload is checked against its job type up front so a malformed
/// document is rejected here instead of failing later in the queue.
pub async fn enqueue(
    State(state): State<ServerState>,
    Json(input): Json<PrintJobCreate>,
) -> AppResult<Json<AppResponse<PrintJob>>> {
    JobPayload::decode(input.job_type, &input.payload)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let job = state.store.insert_job(PrintJob::from(input)).await?;
    tracing::info!(job_id = %job.id, job_type = %job.job_type, role = %job.printer_role, "Job enqueued");
    Ok(ok_with_message(job, "Job queued"))
}

/// POST /jobs/{id}/resubmit
pub async fn resubmit(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<PrintJob>>> {
    let job = state.dispatcher.resubmit(&id).await?;
    Ok(ok_with_message(job, "Job resubmitted"))
}
