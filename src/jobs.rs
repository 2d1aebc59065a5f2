//! Job-status store for asynchronous front-ends.
//!
//! Long extractions are fronted by a submit-then-poll wrapper. That
//! wrapper owns job lifecycles through this store; the extraction core
//! itself never touches it. Records are looked up by an opaque id.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Lifecycle state of one extraction job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Ok,
    Error,
}

/// One tracked extraction job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Opaque identifier handed back to the submitting client.
    pub id: String,
    pub status: JobStatus,
    /// Rendered document, for finished jobs.
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Fresh pending job with a random id.
    pub fn pending() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            status: JobStatus::Pending,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the job finished with its rendered result.
    pub fn finish(mut self, result: impl Into<String>) -> Self {
        self.status = JobStatus::Ok;
        self.result = Some(result.into());
        self.error = None;
        self.updated_at = Utc::now();
        self
    }

    /// Mark the job failed.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.status = JobStatus::Error;
        self.error = Some(error.into());
        self.result = None;
        self.updated_at = Utc::now();
        self
    }
}

/// Store abstraction the polling wrapper works against.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or replace a job record under its id.
    async fn put(&self, record: JobRecord) -> Result<()>;

    /// Look up a job record. `None` for unknown ids.
    async fn get(&self, id: &str) -> Result<Option<JobRecord>>;
}

/// In-memory job store. Jobs do not survive a process restart; a
/// deployment that needs durable jobs swaps in another `JobStore`.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn put(&self, record: JobRecord) -> Result<()> {
        self.jobs.write().insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<JobRecord>> {
        Ok(self.jobs.read().get(id).cloned())
    }
}
