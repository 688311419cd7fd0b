//! Hosted job store over a PostgREST-style HTTP API
//!
//! Rows are filtered with `column=op.value` query parameters and written
//! with `Prefer: return=representation`, so every write tells us which rows
//! it actually touched. That turns the claim into a single conditional
//! `PATCH ... status=eq.pending`: an empty response means another agent won.
//!
//! There is no push channel; the dispatcher's periodic scan covers it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use shared::models::{JobStatus, PrintJob, PrinterConfig};
use tokio::sync::broadcast;
use tracing::{debug, instrument};

use super::store::{JobOutcome, JobStore, StoreError, StoreResult};
use crate::core::config::StoreEndpoint;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote print queue
#[derive(Clone)]
pub struct RestJobStore {
    client: Client,
    endpoint: StoreEndpoint,
}

impl RestJobStore {
    pub fn new(endpoint: StoreEndpoint) -> StoreResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, endpoint })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.endpoint.url, table)
    }

    fn jobs(&self) -> String {
        self.table_url(&self.endpoint.jobs_table)
    }

    fn printers(&self) -> String {
        self.table_url(&self.endpoint.printers_table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.endpoint.key)
            .bearer_auth(&self.endpoint.key)
    }

    /// Claim update; the agent id is written only where the table has a column for it
    fn claim_body(&self, agent_id: &str) -> serde_json::Value {
        let mut body = json!({ "status": JobStatus::Printing });
        if let Some(column) = &self.endpoint.claimed_by_column {
            body[column.as_str()] = json!(agent_id);
        }
        body
    }

    /// Send and decode the returned rows
    async fn rows<T: DeserializeOwned>(&self, request: RequestBuilder) -> StoreResult<Vec<T>> {
        let response = Self::check(self.authorized(request).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn check(response: Response) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Remote {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl JobStore for RestJobStore {
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn insert_job(&self, job: PrintJob) -> StoreResult<PrintJob> {
        let request = self
            .client
            .post(self.jobs())
            .header("Prefer", "return=representation")
            .json(&job);
        let mut rows: Vec<PrintJob> = self.rows(request).await?;
        Ok(rows.pop().unwrap_or(job))
    }

    async fn get_job(&self, id: &str) -> StoreResult<Option<PrintJob>> {
        let request = self
            .client
            .get(self.jobs())
            .query(&[("id", format!("eq.{}", id)), ("limit", "1".into())]);
        let mut rows: Vec<PrintJob> = self.rows(request).await?;
        Ok(rows.pop())
    }

    async fn list_pending(&self) -> StoreResult<Vec<PrintJob>> {
        let request = self.client.get(self.jobs()).query(&[
            ("status", "eq.pending"),
            ("order", "created_at.asc"),
        ]);
        self.rows(request).await
    }

    #[instrument(skip(self))]
    async fn claim_job(&self, id: &str, agent_id: &str) -> StoreResult<Option<PrintJob>> {
        let request = self
            .client
            .patch(self.jobs())
            .query(&[("id", format!("eq.{}", id)), ("status", "eq.pending".into())])
            .header("Prefer", "return=representation")
            .json(&self.claim_body(agent_id));
        let mut rows: Vec<PrintJob> = self.rows(request).await?;
        debug!(claimed = !rows.is_empty(), "Conditional claim");
        Ok(rows.pop())
    }

    #[instrument(skip(self, outcome))]
    async fn finish_job(&self, id: &str, outcome: JobOutcome) -> StoreResult<PrintJob> {
        let body = match &outcome {
            JobOutcome::Printed => json!({
                "status": JobStatus::Printed,
                "printed_at": chrono::Utc::now(),
                "error_message": null,
            }),
            JobOutcome::Failed(message) => json!({
                "status": JobStatus::Failed,
                "error_message": message,
            }),
        };

        // Only non-terminal rows may change
        let request = self
            .client
            .patch(self.jobs())
            .query(&[
                ("id", format!("eq.{}", id)),
                ("status", "in.(pending,printing)".into()),
            ])
            .header("Prefer", "return=representation")
            .json(&body);
        let mut rows: Vec<PrintJob> = self.rows(request).await?;

        if let Some(job) = rows.pop() {
            return Ok(job);
        }
        match self.get_job(id).await? {
            Some(job) => Err(StoreError::Terminal {
                id: job.id,
                status: job.status,
            }),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn list_printers(&self) -> StoreResult<Vec<PrinterConfig>> {
        let request = self.client.get(self.printers()).query(&[("order", "name.asc")]);
        self.rows(request).await
    }

    async fn save_printer(&self, mut printer: PrinterConfig) -> StoreResult<PrinterConfig> {
        printer.validate()?;
        if printer.id.trim().is_empty() {
            printer.id = uuid::Uuid::new_v4().to_string();
        }

        if printer.is_default {
            let request = self
                .client
                .patch(self.printers())
                .query(&[
                    ("role", format!("eq.{}", printer.role)),
                    ("id", format!("neq.{}", printer.id)),
                    ("isDefault", "eq.true".into()),
                ])
                .json(&json!({ "isDefault": false }));
            Self::check(self.authorized(request).send().await?).await?;
        }

        let request = self
            .client
            .post(self.printers())
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&printer);
        let mut rows: Vec<PrinterConfig> = self.rows(request).await?;
        Ok(rows.pop().unwrap_or(printer))
    }

    async fn delete_printer(&self, id: &str) -> StoreResult<()> {
        let request = self
            .client
            .delete(self.printers())
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation");
        let rows: Vec<PrinterConfig> = self.rows(request).await?;
        if rows.is_empty() {
            return Err(StoreError::PrinterNotFound(id.to_string()));
        }
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<PrintJob>> {
        None
    }
}
