//! Print job API
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | /jobs | GET | Pending jobs, oldest first |
//! | /jobs | POST | Enqueue a job |
//! | /jobs/{id} | GET | Job status |
//! | /jobs/{id}/resubmit | POST | Queue a fresh copy of a failed job |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/jobs", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list_pending).post(handler::enqueue))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/resubmit", post(handler::resubmit))
}
