//! Crab print agent - restaurant print job pipeline
//!
//! # Overview
//!
//! Consumes print jobs (kitchen order tickets, bills, test pages) from a
//! shared job store, renders them to ESC/POS and delivers them to thermal
//! printers over USB or raw TCP. A small local HTTP API covers direct
//! printing, job status and printer setup.
//!
//! # Module structure
//!
//! ```text
//! print-agent/src/
//! ├── core/          # config, state, background tasks, server
//! ├── printing/      # store, renderer, executor, dispatcher
//! ├── api/           # HTTP routes and handlers
//! └── utils/         # error envelope, logging
//! ```

pub mod api;
pub mod core;
pub mod printing;
pub mod utils;

pub use crate::core::{Config, Server, ServerState};
pub use printing::{JobStore, PrintDispatcher, PrintExecutor, PrintSink, RedbJobStore, RestJobStore};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{cleanup_old_logs, init_logger_with_file};

/// Load `.env`, create the work dir and initialize logging
///
/// Reads `WORK_DIR`, `LOG_LEVEL`, `LOG_JSON` and `LOG_DIR`.
pub fn setup_environment() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let work_dir = std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/crab/print-agent".into());
    std::fs::create_dir_all(&work_dir)?;

    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into());
    let json = std::env::var("LOG_JSON")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    let log_dir = std::env::var("LOG_DIR").ok().filter(|d| !d.trim().is_empty());

    init_logger_with_file(&level, json, log_dir.as_deref())?;
    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
   ______           __
  / ____/________ _/ /_
 / /   / ___/ __ `/ __ \
/ /___/ /  / /_/ / /_/ /
\____/_/   \__,_/_.___/
    ____       _       __
   / __ \_____(_)___  / /_
  / /_/ / ___/ / __ \/ __/
 / ____/ /  / / / / / /_
/_/   /_/  /_/_/ /_/\__/
    "#
    );
}
