//! Orchestrator (§4.I): a bounded worker pool pulling tasks off the
//! scheduler's channel. Each task fans out to every enabled agent
//! concurrently, collects their results (a panicking agent becomes
//! `status=error`, never an orchestrator failure), invokes the judge,
//! assembles a `StepOutput`, and pushes it to the aggregator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use routecast_aggregator::ResultAggregator;
use routecast_agents::Agent;
use routecast_judge::Judge;
use routecast_metrics::MetricsSink;
use routecast_scheduler::QueueItem;
use routecast_types::{AgentKind, AgentResult, StepOutput, Task};
use tokio::sync::mpsc::Receiver;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub struct Orchestrator {
    agents: HashMap<AgentKind, Arc<dyn Agent>>,
    judge: Arc<Judge>,
    aggregator: Arc<ResultAggregator>,
    metrics: Arc<MetricsSink>,
    max_workers: usize,
}

impl Orchestrator {
    pub fn new(
        agents: HashMap<AgentKind, Arc<dyn Agent>>,
        judge: Arc<Judge>,
        aggregator: Arc<ResultAggregator>,
        metrics: Arc<MetricsSink>,
        max_workers: usize,
    ) -> Self {
        Self {
            agents,
            judge,
            aggregator,
            metrics,
            max_workers: max_workers.max(1),
        }
    }

    /// Drains `receiver` until the sentinel arrives, running up to
    /// `max_workers` steps concurrently. Outstanding in-flight steps are
    /// awaited before returning, even though no more tasks are accepted
    /// once the sentinel is seen.
    pub async fn run(&self, mut receiver: Receiver<QueueItem>) {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut in_flight = JoinSet::new();

        while let Some(item) = receiver.recv().await {
            let task = match item {
                QueueItem::Sentinel => break,
                QueueItem::Task(task) => task,
            };

            self.metrics.set_gauge("orchestrator.queue_depth", receiver.len() as f64);
            tracing::info!(step = task.step_number, queue_depth = receiver.len(), "task_start");

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("worker semaphore is never closed while run() holds it");
            let agents = self.agents.clone();
            let judge = self.judge.clone();
            let aggregator = self.aggregator.clone();
            let metrics = self.metrics.clone();

            in_flight.spawn(async move {
                let _permit = permit;
                run_step(task, agents, judge, aggregator, metrics).await;
            });
        }

        while in_flight.join_next().await.is_some() {}
    }
}

async fn run_step(
    task: Task,
    agents: HashMap<AgentKind, Arc<dyn Agent>>,
    judge: Arc<Judge>,
    aggregator: Arc<ResultAggregator>,
    metrics: Arc<MetricsSink>,
) {
    let start = Instant::now();

    let mut handles = Vec::with_capacity(agents.len());
    for (kind, agent) in agents.iter() {
        let agent = Arc::clone(agent);
        let kind = *kind;
        let task = task.clone();
        handles.push((kind, tokio::spawn(async move { agent.run(&task).await })));
    }

    let mut results = HashMap::with_capacity(handles.len());
    for (kind, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(join_err) => {
                tracing::warn!(step = task.step_number, agent = kind.as_str(), error = %join_err, "agent task panicked");
                AgentResult::error(kind, join_err.to_string())
            }
        };
        results.insert(kind, result);
    }

    let decision = judge.decide(&task, &results).await;

    let step = StepOutput {
        transaction_id: task.transaction_id.clone(),
        step_number: task.step_number,
        location: task.location_name.clone(),
        instructions: task.instructions.clone(),
        agents: results.into_iter().map(|(k, v)| (k.as_str().to_string(), v)).collect(),
        judge: decision,
        timestamp: Utc::now(),
        emit_timestamp: task.emit_timestamp,
    };

    metrics.record_latency("orchestrator.step", start.elapsed().as_secs_f64() * 1000.0);
    aggregator.push(step).await;
}
