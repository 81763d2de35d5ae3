//! Result aggregator (§4.J): collects `StepOutput`s as the orchestrator
//! produces them, exposes a push-as-you-go view for progress printing, and
//! on `finish()` sorts by `step_number` and writes
//! `05_final_output.json` keyed by the first step's `transaction_id`.

mod emit;

pub use emit::{to_csv, to_json_array, to_markdown};

use std::sync::Arc;

use routecast_checkpoint::CheckpointStore;
use routecast_types::StepOutput;
use tokio::sync::Mutex;

pub struct ResultAggregator {
    checkpoint: CheckpointStore,
    steps: Mutex<Vec<StepOutput>>,
}

impl ResultAggregator {
    pub fn new(checkpoint: CheckpointStore) -> Self {
        Self {
            checkpoint,
            steps: Mutex::new(Vec::new()),
        }
    }

    /// Appends one step. Safe to call concurrently from several worker
    /// tasks; no ordering is assumed until `finish()`.
    pub async fn push(&self, step: StepOutput) {
        self.steps.lock().await.push(step);
    }

    /// A point-in-time, step_number-sorted snapshot for progress printing.
    pub async fn snapshot(&self) -> Vec<StepOutput> {
        let mut steps = self.steps.lock().await.clone();
        steps.sort_by_key(|s| s.step_number);
        steps
    }

    /// Sorts the collected steps by `step_number`, writes the final
    /// checkpoint, and returns the sorted vector for the caller's emitters.
    pub async fn finish(self: &Arc<Self>) -> Vec<StepOutput> {
        let mut steps = self.steps.lock().await.clone();
        steps.sort_by_key(|s| s.step_number);
        if let Some(transaction_id) = steps.first().map(|s| s.transaction_id.clone()) {
            self.checkpoint.write_final_output(&transaction_id, &steps).await;
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use routecast_types::JudgeDecision;
    use std::collections::HashMap;

    fn step(step_number: u32) -> StepOutput {
        StepOutput {
            transaction_id: "tx-1".to_string(),
            step_number,
            location: format!("step {step_number}"),
            instructions: "go".to_string(),
            agents: HashMap::new(),
            judge: JudgeDecision::from_scores(
                "tx-1".to_string(),
                HashMap::new(),
                HashMap::new(),
                &HashMap::new(),
                "no agents".to_string(),
            ),
            timestamp: Utc::now(),
            emit_timestamp: None,
        }
    }

    #[tokio::test]
    async fn finish_sorts_out_of_order_pushes_by_step_number() {
        let dir = tempfile::tempdir().unwrap();
        let aggregator = Arc::new(ResultAggregator::new(CheckpointStore::new(dir.path())));
        aggregator.push(step(3)).await;
        aggregator.push(step(1)).await;
        aggregator.push(step(2)).await;

        let sorted = aggregator.finish().await;
        assert_eq!(sorted.iter().map(|s| s.step_number).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn finish_writes_the_final_output_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let aggregator = Arc::new(ResultAggregator::new(CheckpointStore::new(dir.path())));
        aggregator.push(step(1)).await;
        aggregator.finish().await;

        let path = dir.path().join("tx-1").join("05_final_output.json");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn empty_aggregator_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let aggregator = Arc::new(ResultAggregator::new(CheckpointStore::new(dir.path())));
        let sorted = aggregator.finish().await;
        assert!(sorted.is_empty());
        assert!(!dir.path().join("tx-1").exists());
    }
}
