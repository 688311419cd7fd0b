//! Direct print API
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | /print | POST | Render and print a document now, bypassing the queue |
//! | /print/raw | POST | Send raw bytes (base64) or plain text |
//! | /drawer | POST | Kick the cash drawer |
//!
//! All three are bounded by the interactive timeout.

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/print", post(handler::print))
        .route("/print/raw", post(handler::print_raw))
        .route("/drawer", post(handler::open_drawer))
}
