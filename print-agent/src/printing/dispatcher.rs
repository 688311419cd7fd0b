//! Job dispatcher
//!
//! Consumes pending jobs from the store and drives one print attempt per
//! job: resolve the printer, decode the payload, render, send, then write
//! the terminal status back.
//!
//! Two feeds reach the same guarded routine: the store's insert events and
//! a backlog scan (at startup, on every poll tick, and whenever the event
//! channel lags). Within one dispatcher the processing set keeps a job id
//! from being attempted twice at the same time; across dispatchers sharing
//! a store, the store's conditional claim does.

use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use crab_printer::{DrawerPin, EscPosBuilder, PrintError};
use dashmap::DashSet;
use serde::Serialize;
use shared::models::{
    JobPayload, JobStatus, JobType, PayloadError, PrintJob, PrinterConfig, PrinterRole,
    select_printer,
};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::executor::PrintSink;
use super::renderer::{RenderOptions, encode};
use super::store::{JobOutcome, JobStore, StoreError};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// No usable printer for the job's role
    #[error("No printer available: {0}")]
    Precondition(String),

    /// Payload does not fit its job type
    #[error("Bad payload: {0}")]
    Encoding(#[from] PayloadError),

    #[error("Print failed: {0}")]
    Transport(#[from] PrintError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Precondition(_) => "precondition",
            DispatchError::Encoding(_) => "encoding",
            DispatchError::Transport(_) => "transport",
            DispatchError::Store(_) => "store",
        }
    }
}

/// What happened to one job handed to [`PrintDispatcher::process_job`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Printed,
    /// Attempted and marked failed with this message
    Failed(String),
    /// Not attempted: already in flight here, or no longer pending
    Skipped,
}

/// Membership in the processing set for the lifetime of the guard
struct ProcessingGuard<'a> {
    set: &'a DashSet<String>,
    id: String,
}

impl<'a> ProcessingGuard<'a> {
    fn acquire(set: &'a DashSet<String>, id: &str) -> Option<Self> {
        set.insert(id.to_string()).then(|| Self {
            set,
            id: id.to_string(),
        })
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

/// Dispatcher context: store, transports and the in-flight set
pub struct PrintDispatcher {
    store: Arc<dyn JobStore>,
    sink: Arc<dyn PrintSink>,
    processing: DashSet<String>,
    agent_id: String,
    timezone: Tz,
    poll_interval: Duration,
}

/// Snapshot for /health
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatus {
    pub agent_id: String,
    pub in_flight: usize,
    pub push_enabled: bool,
}

impl PrintDispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        sink: Arc<dyn PrintSink>,
        agent_id: impl Into<String>,
        timezone: Tz,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            sink,
            processing: DashSet::new(),
            agent_id: agent_id.into(),
            timezone,
            poll_interval,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn sink(&self) -> &Arc<dyn PrintSink> {
        &self.sink
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn status(&self) -> DispatcherStatus {
        DispatcherStatus {
            agent_id: self.agent_id.clone(),
            in_flight: self.processing.len(),
            push_enabled: self.store.subscribe().is_some(),
        }
    }

    /// Whether `id` is being processed right now
    pub fn is_processing(&self, id: &str) -> bool {
        self.processing.contains(id)
    }

    /// Claim, attempt and finish one job
    ///
    /// Failures of the attempt itself end as a `failed` job, never as an
    /// `Err`. `Err` means the store could not be read or written; the job
    /// may then be left in a non-terminal status.
    #[instrument(skip(self, job), fields(job_id = %job.id, job_type = %job.job_type))]
    pub async fn process_job(&self, job: &PrintJob) -> Result<ProcessOutcome, DispatchError> {
        let Some(_guard) = ProcessingGuard::acquire(&self.processing, &job.id) else {
            debug!("Job already in flight, skipping");
            return Ok(ProcessOutcome::Skipped);
        };

        let Some(claimed) = self.store.claim_job(&job.id, &self.agent_id).await? else {
            debug!("Job no longer pending, skipping");
            return Ok(ProcessOutcome::Skipped);
        };

        let (outcome, result) = match self.attempt(&claimed).await {
            Ok(printer) => {
                info!(printer = %printer, "Job printed");
                (JobOutcome::Printed, ProcessOutcome::Printed)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(kind = e.kind(), error = %message, "Job failed");
                (
                    JobOutcome::Failed(message.clone()),
                    ProcessOutcome::Failed(message),
                )
            }
        };

        self.store.finish_job(&claimed.id, outcome).await?;
        Ok(result)
    }

    /// One attempt for a claimed job; returns the printer name on success
    async fn attempt(&self, job: &PrintJob) -> Result<String, DispatchError> {
        let printer = self.resolve_printer(job.printer_role).await?;
        let payload = JobPayload::decode(job.job_type, &job.payload)?;
        let options = RenderOptions::new(printer.format.columns(), job.created_at, self.timezone);
        let data = encode(&payload, &options);

        self.sink.send(&printer, &data).await?;
        Ok(printer.name)
    }

    /// Printer serving `role`, checked for usability on this host
    async fn resolve_printer(&self, role: PrinterRole) -> Result<PrinterConfig, DispatchError> {
        let printers = self.store.list_printers().await?;
        let printer = select_printer(&printers, role)
            .ok_or_else(|| {
                DispatchError::Precondition(format!("no active {} printer configured", role))
            })?
            .clone();

        self.sink
            .check(&printer)
            .await
            .map_err(|e| DispatchError::Precondition(format!("{}: {}", printer.name, e)))?;
        Ok(printer)
    }

    /// Process every pending job, oldest first; returns how many were attempted
    pub async fn drain_backlog(&self) -> usize {
        let pending = match self.store.list_pending().await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "Backlog scan failed");
                return 0;
            }
        };
        if pending.is_empty() {
            return 0;
        }

        debug!(count = pending.len(), "Draining backlog");
        let mut attempted = 0;
        for job in &pending {
            if self.handle(job).await {
                attempted += 1;
            }
        }
        attempted
    }

    /// Process one job and log the result; true if it was attempted
    async fn handle(&self, job: &PrintJob) -> bool {
        match self.process_job(job).await {
            Ok(ProcessOutcome::Skipped) => false,
            Ok(_) => true,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Status write-back failed");
                true
            }
        }
    }

    /// Consumer loop; returns when `shutdown` is cancelled
    ///
    /// An in-progress send is never interrupted: cancellation is observed
    /// between jobs.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        // Subscribe before the first scan so no insert falls in between
        let mut events = self.store.subscribe();
        info!(
            agent_id = %self.agent_id,
            push = events.is_some(),
            poll_secs = self.poll_interval.as_secs(),
            "Print dispatcher started"
        );

        self.drain_backlog().await;

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Print dispatcher received shutdown signal");
                    break;
                }
                event = next_event(&mut events) => match event {
                    Ok(job) if job.status == JobStatus::Pending => {
                        self.handle(&job).await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Insert events lagged, scanning backlog");
                        self.drain_backlog().await;
                    }
                    Err(RecvError::Closed) => {
                        warn!("Insert event channel closed, falling back to polling");
                        events = None;
                    }
                },
                _ = ticker.tick() => {
                    self.drain_backlog().await;
                }
            }
        }
    }

    /// Print immediately without going through the queue
    #[instrument(skip(self, payload))]
    pub async fn print_direct(
        &self,
        job_type: JobType,
        role: PrinterRole,
        payload: &serde_json::Value,
    ) -> Result<String, DispatchError> {
        let job = PrintJob::new(job_type, role, payload.clone());
        self.attempt(&job).await
    }

    /// Send raw bytes to the printer serving `role`
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn send_raw(&self, role: PrinterRole, data: &[u8]) -> Result<String, DispatchError> {
        let printer = self.resolve_printer(role).await?;
        self.sink.send(&printer, data).await?;
        Ok(printer.name)
    }

    /// Pulse the cash drawer attached to the printer serving `role`
    pub async fn open_drawer(
        &self,
        role: PrinterRole,
        pin: DrawerPin,
    ) -> Result<String, DispatchError> {
        let mut builder = EscPosBuilder::default();
        builder.open_drawer_on(pin);
        self.send_raw(role, &builder.build()).await
    }

    /// Queue a fresh pending copy of a failed job
    ///
    /// The failed job itself is left untouched.
    pub async fn resubmit(&self, id: &str) -> Result<PrintJob, DispatchError> {
        let job = self
            .store
            .get_job(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if job.status != JobStatus::Failed {
            return Err(DispatchError::Precondition(format!(
                "only failed jobs can be resubmitted, job {} is {}",
                id, job.status
            )));
        }

        let fresh = self.store.insert_job(job.resubmitted()).await?;
        info!(original = %id, job_id = %fresh.id, "Job resubmitted");
        Ok(fresh)
    }
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<PrintJob>>,
) -> Result<PrintJob, RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
