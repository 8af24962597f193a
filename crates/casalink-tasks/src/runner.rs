//! Fire-and-forget execution with a pollable handle.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use casalink_core::error::Result;

use crate::tracker::TaskTracker;

/// Runs units of work in the background, recording their outcome in a
/// [`TaskTracker`]. Every unit runs behind a catch boundary: a panic
/// finalizes the task as failed instead of losing it.
pub struct TaskRunner<T> {
    tracker: Arc<TaskTracker<T>>,
}

impl<T> TaskRunner<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(tracker: Arc<TaskTracker<T>>) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &Arc<TaskTracker<T>> {
        &self.tracker
    }

    /// Start `work` in the background and return its task id immediately.
    ///
    /// The caller polls the tracker with the returned id. The work's
    /// `Ok` value becomes the record's result; an `Err` or a panic
    /// finalizes the record as failed.
    pub async fn submit<F>(&self, trigger: &str, work: F) -> String
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let task_id = Uuid::new_v4().to_string();
        self.tracker.create(&task_id, trigger).await;

        let tracker = Arc::clone(&self.tracker);
        let id = task_id.clone();
        tokio::spawn(async move {
            // The inner spawn turns a panic into a join error instead of
            // unwinding through this supervisor.
            let outcome = match tokio::spawn(work).await {
                Ok(Ok(result)) => tracker.complete(&id, Some(result), None).await,
                Ok(Err(e)) => tracker.fail(&id, e.to_string(), None).await,
                Err(join) if join.is_panic() => {
                    tracker.fail(&id, "internal error: task panicked", None).await
                }
                Err(_) => tracker.fail(&id, "internal error: task cancelled", None).await,
            };
            if let Err(e) = outcome {
                warn!(task_id = %id, "task finalization failed: {}", e);
            }
        });

        task_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TaskStatus;
    use casalink_core::error::Error;
    use casalink_storage::MemoryKvStore;
    use std::time::Duration;

    fn runner() -> TaskRunner<String> {
        let store = Arc::new(MemoryKvStore::new());
        TaskRunner::new(Arc::new(TaskTracker::new(store)))
    }

    async fn wait_terminal(
        tracker: &TaskTracker<String>,
        task_id: &str,
    ) -> crate::record::TaskRecord<String> {
        for _ in 0..200 {
            let record = tracker.read(task_id).await.unwrap();
            if record.status.is_terminal() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task {} never reached a terminal state", task_id);
    }

    #[tokio::test]
    async fn test_submit_returns_immediately_and_completes() {
        let runner = runner();
        let task_id = runner
            .submit("fast-work", async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok("payload".to_string())
            })
            .await;

        let pending = runner.tracker().read(&task_id).await.unwrap();
        assert_eq!(pending.status, TaskStatus::Pending);

        let done = wait_terminal(runner.tracker(), &task_id).await;
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.result.as_deref(), Some("payload"));
    }

    #[tokio::test]
    async fn test_submit_records_failure() {
        let runner = runner();
        let task_id = runner
            .submit("failing-work", async {
                Err(Error::Transport("socket closed".to_string()))
            })
            .await;

        let failed = wait_terminal(runner.tracker(), &task_id).await;
        assert_eq!(failed.status, TaskStatus::Failed);
        assert!(failed.error.unwrap().contains("socket closed"));
        assert!(failed.result.is_none());
    }

    #[tokio::test]
    async fn test_panic_is_contained_and_recorded() {
        let runner = runner();
        let task_id = runner
            .submit("panicking-work", async { panic!("boom") })
            .await;

        let failed = wait_terminal(runner.tracker(), &task_id).await;
        assert_eq!(failed.status, TaskStatus::Failed);
        assert!(failed.error.unwrap().contains("internal error"));
    }
}
