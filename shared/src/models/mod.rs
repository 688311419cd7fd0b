//! Data models
//!
//! Shared between the print agent and the UI collaborators (via API and the job store).
//! Job records use snake_case keys; job payloads and printer configs use camelCase,
//! matching what the billing UI writes.

pub mod payload;
pub mod print_job;
pub mod printer;

// Re-exports
pub use payload::*;
pub use print_job::*;
pub use printer::*;
