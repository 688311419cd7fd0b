//! Shared types for the Crab print pipeline
//!
//! Print job records, typed job payloads and printer configuration used by
//! both the printer library consumers and the print agent.

pub mod models;

// Re-exports
pub use models::*;
pub use serde::{Deserialize, Serialize};
