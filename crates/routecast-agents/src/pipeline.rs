//! The generic agent pipeline (§4.G): search across a handful of queries,
//! merge and rank the results, fetch the top candidate, and assemble an
//! `AgentResult`. Video/song/knowledge agents are this pipeline wired up
//! with a kind and a pair of `Search`/`Fetch` implementations.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use routecast_breaker::BreakerRegistry;
use routecast_checkpoint::CheckpointStore;
use routecast_llm::LlmClient;
use routecast_metrics::MetricsSink;
use routecast_types::{AgentKind, AgentResult, Candidate, Task};
use serde_json::{Map, Value};

use crate::query::{extract_queries, heuristic_queries, render_prompt};
use crate::rank::{query_terms, rank, VideoDurationBounds};
use crate::retry::{call_with_resilience, BackoffPolicy};

/// One upstream search call for a given kind: returns whatever candidates
/// it could find for `query`, or an error the retry/breaker layer handles.
#[async_trait]
pub trait Search: Send + Sync {
    async fn search(&self, query: &str, task: &Task) -> anyhow::Result<Vec<Candidate>>;
}

/// Fetches the full payload for a chosen candidate: video embed metadata,
/// song streaming links, article summary, whatever the kind needs.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, candidate: &Candidate, task: &Task) -> anyhow::Result<Map<String, Value>>;
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub search_limit: usize,
    pub retry_attempts: u32,
    pub backoff: BackoffPolicy,
    pub timeout: Duration,
    pub video_duration_bounds: VideoDurationBounds,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            search_limit: 3,
            retry_attempts: 3,
            backoff: BackoffPolicy::Exponential,
            timeout: Duration::from_secs(10),
            video_duration_bounds: VideoDurationBounds::default(),
        }
    }
}

#[async_trait]
pub trait Agent: Send + Sync {
    async fn run(&self, task: &Task) -> AgentResult;
}

pub struct RetrievalAgent<S, F> {
    kind: AgentKind,
    search_impl: S,
    fetch_impl: F,
    breakers: BreakerRegistry,
    llm: Option<Arc<LlmClient>>,
    checkpoint: CheckpointStore,
    metrics: Arc<MetricsSink>,
    config: AgentConfig,
}

impl<S, F> RetrievalAgent<S, F>
where
    S: Search,
    F: Fetch,
{
    pub fn new(
        kind: AgentKind,
        search_impl: S,
        fetch_impl: F,
        breakers: BreakerRegistry,
        llm: Option<Arc<LlmClient>>,
        checkpoint: CheckpointStore,
        metrics: Arc<MetricsSink>,
        config: AgentConfig,
    ) -> Self {
        Self {
            kind,
            search_impl,
            fetch_impl,
            breakers,
            llm,
            checkpoint,
            metrics,
            config,
        }
    }

    async fn generate_queries(&self, task: &Task) -> Vec<String> {
        if let Some(llm) = &self.llm {
            let prompt = render_prompt(self.kind, task);
            if let Ok(response) = llm.query(&prompt).await {
                if let Some(queries) = extract_queries(&response.text) {
                    return queries.into_iter().take(self.config.search_limit).collect();
                }
            }
            self.metrics.inc(&format!("agent.{}.query_generation.fallback", self.kind.as_str()));
        }
        heuristic_queries(self.kind, task)
            .into_iter()
            .take(self.config.search_limit)
            .collect()
    }

    async fn search_merged(&self, queries: &[String], task: &Task) -> Vec<Candidate> {
        let breaker = self.breakers.get(&format!("{}.search", self.kind.as_str())).await;
        let mut merged = Vec::new();
        let mut seen = HashSet::new();
        for query in queries {
            let candidates = call_with_resilience(
                &breaker,
                self.config.retry_attempts,
                self.config.backoff,
                self.config.timeout,
                || self.search_impl.search(query, task),
            )
            .await;
            let Some(candidates) = candidates else {
                continue;
            };
            for candidate in candidates {
                if seen.insert(candidate.dedup_key().to_string()) {
                    merged.push(candidate);
                }
            }
        }
        merged
    }
}

#[async_trait]
impl<S, F> Agent for RetrievalAgent<S, F>
where
    S: Search,
    F: Fetch,
{
    async fn run(&self, task: &Task) -> AgentResult {
        let start = std::time::Instant::now();
        let queries = self.generate_queries(task).await;
        let merged = self.search_merged(&queries, task).await;

        self.checkpoint
            .write_agent_search(&task.transaction_id, self.kind.as_str(), task.step_number, &merged)
            .await;

        if merged.is_empty() {
            self.metrics.inc(&format!("agent.{}.unavailable", self.kind.as_str()));
            return AgentResult::unavailable(self.kind, "no candidates found");
        }

        let terms = query_terms(&queries);
        let ranked = rank(self.kind, merged.clone(), &terms, Utc::now(), self.config.video_duration_bounds);
        let (top, _score) = &ranked[0];

        let breaker = self.breakers.get(&format!("{}.fetch", self.kind.as_str())).await;
        let fetched = call_with_resilience(
            &breaker,
            self.config.retry_attempts,
            self.config.backoff,
            self.config.timeout,
            || self.fetch_impl.fetch(top, task),
        )
        .await;

        self.metrics
            .record_latency(&format!("agent.{}.run", self.kind.as_str()), start.elapsed().as_secs_f64() * 1000.0);

        let Some(mut payload) = fetched else {
            self.metrics.inc(&format!("agent.{}.fetch_failed", self.kind.as_str()));
            return AgentResult::unavailable(self.kind, "failed to fetch the selected candidate");
        };

        payload
            .entry("title".to_string())
            .or_insert_with(|| Value::String(top.title.clone()));
        payload
            .entry("url".to_string())
            .or_insert_with(|| Value::String(top.url.clone()));

        let reasoning = payload
            .get("reasoning")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!(
                    "Selected \"{}\" for {} after ranking {} candidate(s).",
                    top.title,
                    self.kind.as_str(),
                    merged.len()
                )
            });

        self.checkpoint
            .write_agent_fetch(&task.transaction_id, self.kind.as_str(), task.step_number, &payload)
            .await;
        self.metrics.inc(&format!("agent.{}.ok", self.kind.as_str()));

        AgentResult::ok(self.kind, payload, reasoning)
    }
}
