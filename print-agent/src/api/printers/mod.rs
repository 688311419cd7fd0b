//! Printer API
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | /printers | GET | Configured printers |
//! | /printers | POST | Save a printer (create, update or promote a discovered one) |
//! | /printers/{id} | DELETE | Remove a printer |
//! | /printers/discover/usb | GET | Attached USB printers |
//! | /printers/discover/network | POST | Probe hosts for an open raw-print port |

mod handler;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/printers", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::save))
        .route("/{id}", delete(handler::delete))
        .route("/discover/usb", get(handler::discover_usb))
        .route("/discover/network", post(handler::discover_network))
}
