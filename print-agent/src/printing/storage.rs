//! redb-based embedded job store
//!
//! Used when no remote store is configured, and by tests. redb serializes
//! write transactions, so the read-check-write in [`JobStore::claim_job`]
//! is atomic for every dispatcher sharing one `RedbJobStore`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use shared::models::{JobStatus, PrintJob, PrinterConfig};
use tokio::sync::broadcast;
use tracing::debug;

use super::store::{JobOutcome, JobStore, StoreError, StoreResult};

/// Jobs table: key = job id, value = JSON
const PRINT_JOBS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("print_jobs");

/// Pending index: (created_at millis, job id) -> ()
///
/// Key order is FIFO order.
const PENDING_JOBS_TABLE: TableDefinition<(i64, &str), ()> = TableDefinition::new("pending_jobs");

/// Printers table: key = printer id, value = JSON
const PRINTERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("printers");

/// Buffered insert events per subscriber
const EVENT_CAPACITY: usize = 256;

/// Embedded print queue
#[derive(Clone)]
pub struct RedbJobStore {
    db: Arc<Database>,
    events: broadcast::Sender<PrintJob>,
}

impl RedbJobStore {
    /// Open or create database
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::init(Database::create(path)?)
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PRINT_JOBS_TABLE)?;
            let _ = write_txn.open_table(PENDING_JOBS_TABLE)?;
            let _ = write_txn.open_table(PRINTERS_TABLE)?;
        }
        write_txn.commit()?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            db: Arc::new(db),
            events,
        })
    }

    fn pending_key(job: &PrintJob) -> (i64, &str) {
        (job.created_at.timestamp_millis(), job.id.as_str())
    }

    fn read_job(&self, id: &str) -> StoreResult<Option<PrintJob>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRINT_JOBS_TABLE)?;

        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Load, update and store a job inside one write transaction
    ///
    /// `update` returns `Ok(None)` to leave the job untouched.
    fn modify_job<F>(&self, id: &str, update: F) -> StoreResult<Option<PrintJob>>
    where
        F: FnOnce(PrintJob) -> StoreResult<Option<PrintJob>>,
    {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut jobs = write_txn.open_table(PRINT_JOBS_TABLE)?;
            let current: PrintJob = match jobs.get(id)? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Err(StoreError::NotFound(id.to_string())),
            };
            let was_pending = current.is_pending();

            match update(current)? {
                Some(job) => {
                    let value = serde_json::to_vec(&job)?;
                    jobs.insert(id, value.as_slice())?;

                    if was_pending && !job.is_pending() {
                        let mut pending = write_txn.open_table(PENDING_JOBS_TABLE)?;
                        pending.remove(Self::pending_key(&job))?;
                    }
                    Some(job)
                }
                None => None,
            }
        };
        write_txn.commit()?;
        Ok(updated)
    }

    fn read_printers(&self) -> StoreResult<Vec<PrinterConfig>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRINTERS_TABLE)?;

        let mut printers = Vec::new();
        for result in table.iter()? {
            let (_, guard) = result?;
            printers.push(serde_json::from_slice::<PrinterConfig>(guard.value())?);
        }
        printers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(printers)
    }
}

#[async_trait]
impl JobStore for RedbJobStore {
    async fn insert_job(&self, job: PrintJob) -> StoreResult<PrintJob> {
        let write_txn = self.db.begin_write()?;
        {
            let mut jobs = write_txn.open_table(PRINT_JOBS_TABLE)?;
            let value = serde_json::to_vec(&job)?;
            jobs.insert(job.id.as_str(), value.as_slice())?;

            if job.is_pending() {
                let mut pending = write_txn.open_table(PENDING_JOBS_TABLE)?;
                pending.insert(Self::pending_key(&job), ())?;
            }
        }
        write_txn.commit()?;

        if job.is_pending() {
            // No subscribers is fine; the backlog scan picks the job up
            let _ = self.events.send(job.clone());
        }
        debug!(job_id = %job.id, job_type = %job.job_type, "Job stored");
        Ok(job)
    }

    async fn get_job(&self, id: &str) -> StoreResult<Option<PrintJob>> {
        self.read_job(id)
    }

    async fn list_pending(&self) -> StoreResult<Vec<PrintJob>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(PENDING_JOBS_TABLE)?;
        let jobs = read_txn.open_table(PRINT_JOBS_TABLE)?;

        let mut pending = Vec::new();
        for result in index.iter()? {
            let (key, _) = result?;
            let (_, id) = key.value();
            if let Some(guard) = jobs.get(id)? {
                let job: PrintJob = serde_json::from_slice(guard.value())?;
                if job.is_pending() {
                    pending.push(job);
                }
            }
        }
        Ok(pending)
    }

    async fn claim_job(&self, id: &str, agent_id: &str) -> StoreResult<Option<PrintJob>> {
        let result = self.modify_job(id, |mut job| {
            if job.status != JobStatus::Pending {
                return Ok(None);
            }
            job.status = JobStatus::Printing;
            job.claimed_by = Some(agent_id.to_string());
            Ok(Some(job))
        });

        match result {
            Err(StoreError::NotFound(_)) => Ok(None),
            other => other,
        }
    }

    async fn finish_job(&self, id: &str, outcome: JobOutcome) -> StoreResult<PrintJob> {
        let updated = self.modify_job(id, |mut job| {
            if job.status.is_terminal() {
                return Err(StoreError::Terminal {
                    id: job.id,
                    status: job.status,
                });
            }
            outcome.apply(&mut job);
            Ok(Some(job))
        })?;

        updated.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_printers(&self) -> StoreResult<Vec<PrinterConfig>> {
        self.read_printers()
    }

    async fn save_printer(&self, mut printer: PrinterConfig) -> StoreResult<PrinterConfig> {
        printer.validate()?;
        if printer.id.trim().is_empty() {
            printer.id = uuid::Uuid::new_v4().to_string();
        }

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PRINTERS_TABLE)?;

            if printer.is_default {
                // Read first, then clear competing defaults
                let mut demoted = Vec::new();
                for result in table.iter()? {
                    let (_, guard) = result?;
                    let other: PrinterConfig = serde_json::from_slice(guard.value())?;
                    if other.id != printer.id && other.role == printer.role && other.is_default {
                        demoted.push(other);
                    }
                }
                for mut other in demoted {
                    other.is_default = false;
                    let value = serde_json::to_vec(&other)?;
                    table.insert(other.id.as_str(), value.as_slice())?;
                }
            }

            let value = serde_json::to_vec(&printer)?;
            table.insert(printer.id.as_str(), value.as_slice())?;
        }
        write_txn.commit()?;

        Ok(printer)
    }

    async fn delete_printer(&self, id: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(PRINTERS_TABLE)?;
            table.remove(id)?.is_some()
        };
        write_txn.commit()?;

        if removed {
            Ok(())
        } else {
            Err(StoreError::PrinterNotFound(id.to_string()))
        }
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<PrintJob>> {
        Some(self.events.subscribe())
    }
}
