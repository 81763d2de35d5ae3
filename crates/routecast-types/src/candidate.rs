use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single item returned by an agent's search phase, before ranking and
/// fetch. Unique within an agent-run by `id` (falling back to `url`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub url: String,
    pub source: String,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub authority: Option<f64>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_seconds: Option<u64>,
}

impl Candidate {
    /// The dedup key the agent framework merges candidates on: `id ?? url`.
    pub fn dedup_key(&self) -> &str {
        self.id.as_deref().unwrap_or(self.url.as_str())
    }
}
