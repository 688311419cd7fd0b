//! Job store abstraction
//!
//! The print queue lives in a durable table shared with the billing UI. The
//! dispatcher only needs row-level reads and conditional writes, plus an
//! optional push channel for newly inserted jobs.

use async_trait::async_trait;
use shared::models::{JobStatus, PrintJob, PrinterConfig, PrinterConfigError};
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Printer not found: {0}")]
    PrinterNotFound(String),

    /// Terminal jobs are never written again
    #[error("Job {id} is already {status}")]
    Terminal { id: String, status: JobStatus },

    #[error("Invalid printer config: {0}")]
    InvalidPrinter(#[from] PrinterConfigError),

    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Remote store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote store returned {status}: {body}")]
    Remote { status: u16, body: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Terminal result of one print attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Printed,
    Failed(String),
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Printed => JobStatus::Printed,
            JobOutcome::Failed(_) => JobStatus::Failed,
        }
    }

    /// Apply to a job that is still pending or printing
    pub(crate) fn apply(self, job: &mut PrintJob) {
        match self {
            JobOutcome::Printed => {
                job.status = JobStatus::Printed;
                job.printed_at = Some(chrono::Utc::now());
                job.error_message = None;
            }
            JobOutcome::Failed(message) => {
                job.status = JobStatus::Failed;
                job.error_message = Some(message);
            }
        }
    }
}

/// Durable print queue and printer settings
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job; pending jobs are announced to subscribers
    async fn insert_job(&self, job: PrintJob) -> StoreResult<PrintJob>;

    async fn get_job(&self, id: &str) -> StoreResult<Option<PrintJob>>;

    /// All pending jobs, oldest first
    async fn list_pending(&self) -> StoreResult<Vec<PrintJob>>;

    /// Atomically move a job from `pending` to `printing`
    ///
    /// Returns `None` when the job does not exist or is no longer pending,
    /// i.e. someone else got there first.
    async fn claim_job(&self, id: &str, agent_id: &str) -> StoreResult<Option<PrintJob>>;

    /// Record the terminal status; fails with [`StoreError::Terminal`] if
    /// the job already has one
    async fn finish_job(&self, id: &str, outcome: JobOutcome) -> StoreResult<PrintJob>;

    async fn list_printers(&self) -> StoreResult<Vec<PrinterConfig>>;

    /// Insert or replace a printer; saving a default clears the other
    /// defaults of the same role
    async fn save_printer(&self, printer: PrinterConfig) -> StoreResult<PrinterConfig>;

    async fn delete_printer(&self, id: &str) -> StoreResult<()>;

    /// Push channel of inserted jobs, if the store has one
    fn subscribe(&self) -> Option<broadcast::Receiver<PrintJob>>;
}
