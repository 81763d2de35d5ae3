//! Process-wide metrics sink (§4.B): thread-safe counters, latency samples
//! and gauges, with a periodic flush to a snapshot file. Built as an
//! explicit handle injected into every component rather than a singleton,
//! per the design note in §9: create once at pipeline startup, share the
//! `Arc`, shut down after the aggregator drains.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Default)]
pub struct LatencyStats {
    pub count: u64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub counters: HashMap<String, u64>,
    pub gauges: HashMap<String, f64>,
    pub latencies: HashMap<String, LatencyStats>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    counters: HashMap<String, u64>,
    gauges: HashMap<String, f64>,
    latencies: HashMap<String, Vec<f64>>,
}

/// Shared, thread-safe metrics handle. Every mutation is serialized behind
/// a single `Mutex`; none of `inc`/`record_latency`/`set_gauge` perform I/O,
/// so holding the lock is never a suspension point.
pub struct MetricsSink {
    state: Mutex<State>,
    file: Option<PathBuf>,
}

impl MetricsSink {
    pub fn new(file: Option<PathBuf>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            file,
        }
    }

    pub fn inc(&self, name: &str) {
        self.inc_by(name, 1);
    }

    pub fn inc_by(&self, name: &str, delta: u64) {
        let mut state = self.state.lock().expect("metrics mutex poisoned");
        *state.counters.entry(name.to_string()).or_insert(0) += delta;
    }

    pub fn record_latency(&self, name: &str, ms: f64) {
        let mut state = self.state.lock().expect("metrics mutex poisoned");
        state.latencies.entry(name.to_string()).or_default().push(ms);
    }

    pub fn set_gauge(&self, name: &str, value: f64) {
        let mut state = self.state.lock().expect("metrics mutex poisoned");
        state.gauges.insert(name.to_string(), value);
    }

    pub fn counter(&self, name: &str) -> u64 {
        let state = self.state.lock().expect("metrics mutex poisoned");
        state.counters.get(name).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.lock().expect("metrics mutex poisoned");
        let latencies = state
            .latencies
            .iter()
            .map(|(name, samples)| (name.clone(), summarize(samples)))
            .collect();
        MetricsSnapshot {
            counters: state.counters.clone(),
            gauges: state.gauges.clone(),
            latencies,
            generated_at: Utc::now(),
        }
    }

    /// Serializes the current snapshot to the configured file. Failures are
    /// logged and swallowed: a metrics sink must never fail a caller.
    pub async fn flush(&self) {
        let Some(path) = self.file.as_ref() else {
            return;
        };
        let snapshot = self.snapshot();
        match serde_json::to_vec_pretty(&snapshot) {
            Ok(bytes) => {
                if let Err(err) = write_snapshot(path, &bytes).await {
                    tracing::warn!(error = %err, path = %path.display(), "failed to flush metrics snapshot");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize metrics snapshot");
            }
        }
    }

    /// Spawns the background task that flushes at `update_interval`,
    /// matching the source's "a background task flushes at
    /// `update_interval`" contract. The returned handle should be aborted
    /// after the aggregator drains, followed by one final `flush()`.
    pub fn spawn_periodic_flush(
        self: std::sync::Arc<Self>,
        update_interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(update_interval);
            loop {
                ticker.tick().await;
                self.flush().await;
            }
        })
    }
}

async fn write_snapshot(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

fn summarize(samples: &[f64]) -> LatencyStats {
    if samples.is_empty() {
        return LatencyStats::default();
    }
    let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let avg = samples.iter().sum::<f64>() / samples.len() as f64;
    LatencyStats {
        count: samples.len() as u64,
        min_ms: min,
        max_ms: max,
        avg_ms: avg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn counters_are_cumulative() {
        let sink = MetricsSink::new(None);
        sink.inc("steps.total");
        sink.inc_by("steps.total", 2);
        assert_eq!(sink.counter("steps.total"), 3);
    }

    #[test]
    fn concurrent_increments_sum_exactly() {
        let sink = Arc::new(MetricsSink::new(None));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let sink = sink.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    sink.inc("writes");
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(sink.counter("writes"), 8000);
    }

    #[test]
    fn latency_summary_reports_min_max_avg() {
        let sink = MetricsSink::new(None);
        sink.record_latency("step.latency", 10.0);
        sink.record_latency("step.latency", 30.0);
        sink.record_latency("step.latency", 20.0);
        let snapshot = sink.snapshot();
        let stats = &snapshot.latencies["step.latency"];
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min_ms, 10.0);
        assert_eq!(stats.max_ms, 30.0);
        assert_eq!(stats.avg_ms, 20.0);
    }

    #[tokio::test]
    async fn flush_writes_a_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let sink = MetricsSink::new(Some(path.clone()));
        sink.set_gauge("queue.depth", 3.0);
        sink.flush().await;
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("queue.depth"));
    }

    #[tokio::test]
    async fn flush_without_a_configured_file_is_a_no_op() {
        let sink = MetricsSink::new(None);
        sink.flush().await;
    }
}
