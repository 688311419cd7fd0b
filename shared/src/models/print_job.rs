//! Print Job Model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::printer::PrinterRole;

/// Kind of document a job prints; selects the payload shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    /// Kitchen order ticket
    Kot,
    /// Customer bill
    Bill,
    /// Printer test page
    Test,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Kot => "kot",
            JobType::Bill => "bill",
            JobType::Test => "test",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kot" => Ok(JobType::Kot),
            "bill" => Ok(JobType::Bill),
            "test" => Ok(JobType::Test),
            other => Err(format!("Unknown job type: {}", other)),
        }
    }
}

/// Job lifecycle status
///
/// ```text
/// pending ──▶ printing ──▶ printed | failed
///    └────────────────────▶ printed | failed
/// ```
///
/// `printed` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Printing,
    Printed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Printing => "printing",
            JobStatus::Printed => "printed",
            JobStatus::Failed => "failed",
        }
    }

    /// Terminal states never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Printed | JobStatus::Failed)
    }

    /// Whether a status write from `self` to `next` keeps the lifecycle monotonic
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Printing)
                | (JobStatus::Pending, JobStatus::Printed)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Printing, JobStatus::Printed)
                | (JobStatus::Printing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the shared print queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    /// Raw payload as written by the UI; decoded with [`JobPayload::decode`](super::JobPayload::decode)
    pub payload: serde_json::Value,
    pub printer_role: PrinterRole,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub printed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Agent that claimed the job (diagnostics only; not every store has the column)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
}

impl PrintJob {
    /// Create a new pending job
    pub fn new(job_type: JobType, printer_role: PrinterRole, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_type,
            status: JobStatus::Pending,
            payload,
            printer_role,
            created_at: Utc::now(),
            printed_at: None,
            error_message: None,
            claimed_by: None,
        }
    }

    /// Copy of this job's document as a fresh pending job (manual resubmit)
    pub fn resubmitted(&self) -> Self {
        Self::new(self.job_type, self.printer_role, self.payload.clone())
    }

    pub fn is_pending(&self) -> bool {
        self.status == JobStatus::Pending
    }
}

/// Enqueue payload (create job)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJobCreate {
    pub job_type: JobType,
    pub printer_role: PrinterRole,
    /// May be omitted for test jobs
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl From<PrintJobCreate> for PrintJob {
    fn from(input: PrintJobCreate) -> Self {
        PrintJob::new(input.job_type, input.printer_role, input.payload)
    }
}
