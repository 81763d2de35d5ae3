//! Scheduler (§4.F): a paced emitter that pushes tasks into a bounded
//! channel at a configured cadence, terminating with a sentinel that is
//! pushed unconditionally — even when the stop signal fires mid-route.

use chrono::Utc;
use routecast_checkpoint::CheckpointStore;
use routecast_types::Task;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

/// An item flowing through the scheduler -> orchestrator channel: either a
/// stamped task, or the one terminating sentinel.
#[derive(Debug, Clone)]
pub enum QueueItem {
    Task(Task),
    Sentinel,
}

pub struct Scheduler {
    checkpoint: CheckpointStore,
}

impl Scheduler {
    pub fn new(checkpoint: CheckpointStore) -> Self {
        Self { checkpoint }
    }

    /// Emits `tasks` in order at `interval`, stamping each with
    /// `emit_timestamp` just before the put. Stops emitting as soon as
    /// `cancel` fires, but always pushes the sentinel before returning, and
    /// always records whatever was actually emitted to
    /// `01_scheduler_queue.json`.
    pub async fn run(
        &self,
        tasks: Vec<Task>,
        interval: Duration,
        sender: Sender<QueueItem>,
        cancel: CancellationToken,
    ) {
        let mut emitted = Vec::with_capacity(tasks.len());

        for mut task in tasks {
            if cancel.is_cancelled() {
                break;
            }
            task.emit_timestamp = Some(Utc::now());
            emitted.push(task.clone());
            if sender.send(QueueItem::Task(task)).await.is_err() {
                break;
            }
            tokio::time::sleep(interval).await;
        }

        let _ = sender.send(QueueItem::Sentinel).await;

        if let Some(transaction_id) = emitted.first().map(|t| t.transaction_id.clone()) {
            self.checkpoint
                .write_scheduler_queue(&transaction_id, &emitted)
                .await;
        }
    }
}
