//! Dual-tier task status store.
//!
//! The in-memory map answers polls on the hot path; the persistent
//! key-value tier gives records a TTL-bounded afterlife across restarts.
//! Writes hit memory first and the store best-effort: a store outage
//! never fails a status transition.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use casalink_core::error::{Error, Result};
use casalink_core::kv::KvStore;

use crate::record::{TaskRecord, TaskStatus};

const TASK_PREFIX: &str = "task:";
const DEFAULT_TASK_TTL: Duration = Duration::from_secs(10 * 60);

fn task_key(task_id: &str) -> String {
    format!("{}{}", TASK_PREFIX, task_id)
}

/// Tracks task records across the memory and persistent tiers.
pub struct TaskTracker<T> {
    tasks: RwLock<HashMap<String, TaskRecord<T>>>,
    store: Arc<dyn KvStore>,
    default_ttl: Duration,
}

impl<T> TaskTracker<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            store,
            default_ttl: DEFAULT_TASK_TTL,
        }
    }

    /// Override the TTL applied to freshly created records.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Register a new pending task in both tiers.
    pub async fn create(&self, task_id: &str, trigger: &str) -> TaskRecord<T> {
        let record = TaskRecord::pending(task_id, trigger);
        self.tasks
            .write()
            .await
            .insert(task_id.to_string(), record.clone());
        match serde_json::to_vec(&record) {
            Ok(bytes) => {
                if let Err(e) = self.store.set(&task_key(task_id), &bytes, Some(self.default_ttl))
                {
                    warn!(task_id = %task_id, "task record persist failed: {}", e);
                }
            }
            Err(e) => warn!(task_id = %task_id, "task record encode failed: {}", e),
        }
        debug!(task_id = %task_id, trigger = %trigger, "task created");
        record
    }

    /// Finalize a task as completed.
    pub async fn complete(
        &self,
        task_id: &str,
        result: Option<T>,
        http_status_code: Option<u16>,
    ) -> Result<TaskRecord<T>> {
        self.finalize(task_id, TaskStatus::Completed, result, None, http_status_code)
            .await
    }

    /// Finalize a task as failed.
    pub async fn fail(
        &self,
        task_id: &str,
        error: impl Into<String>,
        http_status_code: Option<u16>,
    ) -> Result<TaskRecord<T>> {
        self.finalize(
            task_id,
            TaskStatus::Failed,
            None,
            Some(error.into()),
            http_status_code,
        )
        .await
    }

    /// Poll a task record.
    ///
    /// Memory wins; the expiry instant is augmented from the store's
    /// remaining TTL when available. A record found only in the store is
    /// promoted back into memory on the way out.
    pub async fn read(&self, task_id: &str) -> Result<TaskRecord<T>> {
        let key = task_key(task_id);
        let memory_hit = self.tasks.read().await.get(task_id).cloned();
        if let Some(mut record) = memory_hit {
            match self.store.get_with_ttl(&key) {
                Ok(Some((_, remaining))) => {
                    record.expires_at = remaining.and_then(expiry_from_remaining);
                }
                // TTL expiry is authoritative for finished tasks: the
                // memory copy goes with the store entry. A pending task
                // outlives a lost store entry so its outcome is not
                // dropped mid-flight.
                Ok(None) if record.status.is_terminal() => {
                    self.tasks.write().await.remove(task_id);
                    return Err(Error::NotFound(format!("task {}", task_id)));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(key = %key, "task TTL read failed: {}", e);
                }
            }
            return Ok(record);
        }

        match self.store.get_with_ttl(&key)? {
            Some((bytes, remaining)) => {
                let mut record: TaskRecord<T> = serde_json::from_slice(&bytes)?;
                record.expires_at = remaining.and_then(expiry_from_remaining);
                self.tasks
                    .write()
                    .await
                    .insert(task_id.to_string(), record.clone());
                Ok(record)
            }
            None => Err(Error::NotFound(format!("task {}", task_id))),
        }
    }

    /// Apply the terminal transition. The existing record supplies
    /// `started_at` and `trigger`; the persistent write keeps the entry's
    /// remaining TTL so finalization never restarts the eviction clock.
    async fn finalize(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Option<T>,
        error: Option<String>,
        http_status_code: Option<u16>,
    ) -> Result<TaskRecord<T>> {
        let mut record = self.current(task_id).await?;
        if record.status.is_terminal() {
            warn!(
                task_id = %task_id,
                status = %record.status,
                "ignoring second finalization of a terminal task"
            );
            return Ok(record);
        }

        record.status = status;
        record.result = result;
        record.error = error;
        record.http_status_code = http_status_code;
        let elapsed_ms = (Utc::now() - record.started_at).num_milliseconds().max(0);
        record.duration_seconds = Some(elapsed_ms as f64 / 1000.0);

        self.tasks
            .write()
            .await
            .insert(task_id.to_string(), record.clone());
        match serde_json::to_vec(&record) {
            Ok(bytes) => {
                if let Err(e) =
                    self.store
                        .set_keeping_ttl(&task_key(task_id), &bytes, Some(self.default_ttl))
                {
                    warn!(task_id = %task_id, "task record persist failed: {}", e);
                }
            }
            Err(e) => warn!(task_id = %task_id, "task record encode failed: {}", e),
        }
        debug!(task_id = %task_id, status = %record.status, "task finalized");
        Ok(record)
    }

    /// Current record from either tier, memory first.
    async fn current(&self, task_id: &str) -> Result<TaskRecord<T>> {
        if let Some(record) = self.tasks.read().await.get(task_id).cloned() {
            return Ok(record);
        }
        match self.store.get(&task_key(task_id))? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(Error::NotFound(format!("task {}", task_id))),
        }
    }

}

fn expiry_from_remaining(remaining: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(remaining)
        .ok()
        .and_then(|d| Utc::now().checked_add_signed(d))
}
