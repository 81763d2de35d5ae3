//! Checkpoint store (§4.C): append-only, per-transaction JSON artifacts
//! named with the monotonically increasing stage prefixes spec.md lists.
//! Writes are idempotent by path and never fatal — a write failure is
//! logged and swallowed, matching "nothing reads them during a run".

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::Serialize;

#[derive(Clone)]
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn write_route(&self, transaction_id: &str, value: &impl Serialize) {
        self.write(transaction_id, "00_route", value).await;
    }

    pub async fn write_scheduler_queue(&self, transaction_id: &str, value: &impl Serialize) {
        self.write(transaction_id, "01_scheduler_queue", value).await;
    }

    pub async fn write_agent_search(
        &self,
        transaction_id: &str,
        kind: &str,
        step: u32,
        value: &impl Serialize,
    ) {
        self.write(
            transaction_id,
            &format!("02_agent_search_{kind}_step_{step}"),
            value,
        )
        .await;
    }

    pub async fn write_agent_fetch(
        &self,
        transaction_id: &str,
        kind: &str,
        step: u32,
        value: &impl Serialize,
    ) {
        self.write(
            transaction_id,
            &format!("03_agent_fetch_{kind}_step_{step}"),
            value,
        )
        .await;
    }

    pub async fn write_judge_decision(&self, transaction_id: &str, step: u32, value: &impl Serialize) {
        self.write(
            transaction_id,
            &format!("04_judge_decision_step_{step}"),
            value,
        )
        .await;
    }

    pub async fn write_final_output(&self, transaction_id: &str, value: &impl Serialize) {
        self.write(transaction_id, "05_final_output", value).await;
    }

    async fn write(&self, transaction_id: &str, stage: &str, value: &impl Serialize) {
        if let Err(err) = self.try_write(transaction_id, stage, value).await {
            tracing::warn!(
                transaction_id,
                stage,
                error = %err,
                "checkpoint write failed; continuing without it"
            );
        }
    }

    async fn try_write(
        &self,
        transaction_id: &str,
        stage: &str,
        value: &impl Serialize,
    ) -> anyhow::Result<()> {
        let dir = self.transaction_dir(transaction_id);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{stage}.json"));
        let bytes = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    pub fn transaction_dir(&self, transaction_id: &str) -> PathBuf {
        self.root.join(transaction_id)
    }

    /// Deletes transaction directories whose newest artifact is older than
    /// `retention_days`. Best-effort: individual failures are logged and
    /// skipped rather than aborting the sweep.
    pub async fn prune_older_than(&self, retention_days: u64) -> anyhow::Result<()> {
        let cutoff = Duration::from_secs(retention_days.saturating_mul(24 * 60 * 60));
        let now = SystemTime::now();

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(_) => return Ok(()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            match newest_mtime(&path).await {
                Ok(Some(mtime)) => {
                    let age = now.duration_since(mtime).unwrap_or_default();
                    if age > cutoff {
                        if let Err(err) = tokio::fs::remove_dir_all(&path).await {
                            tracing::warn!(path = %path.display(), error = %err, "failed to prune checkpoint directory");
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "failed to inspect checkpoint directory for pruning");
                }
            }
        }
        Ok(())
    }
}

async fn newest_mtime(dir: &Path) -> anyhow::Result<Option<SystemTime>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut newest = None;
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        let modified = metadata.modified()?;
        newest = Some(match newest {
            Some(current) if current > modified => current,
            _ => modified,
        });
    }
    Ok(newest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn writes_land_at_the_documented_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.write_route("tx-1", &json!({"steps": 3})).await;
        store
            .write_agent_search("tx-1", "video", 1, &json!([{"id": "a"}]))
            .await;
        store
            .write_judge_decision("tx-1", 1, &json!({"chosen_agent": "video"}))
            .await;

        let route_path = dir.path().join("tx-1").join("00_route.json");
        assert!(route_path.exists());
        let search_path = dir
            .path()
            .join("tx-1")
            .join("02_agent_search_video_step_1.json");
        assert!(search_path.exists());
        let judge_path = dir.path().join("tx-1").join("04_judge_decision_step_1.json");
        assert!(judge_path.exists());
    }

    #[tokio::test]
    async fn rewriting_the_same_path_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.write_final_output("tx-1", &json!({"revision": 1})).await;
        store.write_final_output("tx-1", &json!({"revision": 2})).await;

        let path = dir.path().join("tx-1").join("05_final_output.json");
        let contents = tokio::fs::read_to_string(path).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["revision"], 2);
    }

    #[tokio::test]
    async fn a_missing_root_never_panics_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("does-not-exist-yet"));
        store.write_route("tx-1", &json!({})).await;
        assert!(dir
            .path()
            .join("does-not-exist-yet")
            .join("tx-1")
            .join("00_route.json")
            .exists());
    }

    #[tokio::test]
    async fn pruning_an_empty_root_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.prune_older_than(30).await.unwrap();
    }
}
