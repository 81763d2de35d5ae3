//! The three concrete agent specializations (§4.G): video, song and
//! knowledge search/fetch, each a thin HTTP client against a configurable
//! endpoint. A deterministic `Mock*` pair backs local dry runs where no
//! upstream API key is configured.

use async_trait::async_trait;
use reqwest::Client;
use routecast_types::{AgentKind, Candidate, Task};
use serde_json::{Map, Value};

use crate::pipeline::{Fetch, Search};

/// Generic JSON search endpoint: `GET {base_url}?q=<query>` returning a
/// top-level JSON array, each element shaped like `Candidate`.
pub struct HttpSearchEndpoint {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    source: String,
}

impl HttpSearchEndpoint {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, source: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
            source: source.into(),
        }
    }
}

#[async_trait]
impl Search for HttpSearchEndpoint {
    async fn search(&self, query: &str, _task: &Task) -> anyhow::Result<Vec<Candidate>> {
        let mut request = self.client.get(&self.base_url).query(&[("q", query)]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }
        let value: Value = request.send().await?.json().await?;
        let items = value.as_array().cloned().unwrap_or_default();
        let candidates = items
            .into_iter()
            .filter_map(|item| candidate_from_json(item, &self.source))
            .collect();
        Ok(candidates)
    }
}

fn candidate_from_json(item: Value, source: &str) -> Option<Candidate> {
    let title = item.get("title")?.as_str()?.to_string();
    let url = item.get("url")?.as_str()?.to_string();
    Some(Candidate {
        id: item.get("id").and_then(Value::as_str).map(str::to_string),
        title,
        url,
        source: source.to_string(),
        snippet: item.get("snippet").and_then(Value::as_str).map(str::to_string),
        view_count: item.get("view_count").and_then(Value::as_u64),
        popularity: item.get("popularity").and_then(Value::as_f64),
        authority: item.get("authority").and_then(Value::as_f64),
        published_at: item
            .get("published_at")
            .and_then(Value::as_str)
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc)),
        duration_seconds: item.get("duration_seconds").and_then(Value::as_u64),
    })
}

/// Generic JSON fetch endpoint: `GET {base_url}?url=<candidate url>`
/// returning the payload object verbatim as the agent's metadata.
pub struct HttpFetchEndpoint {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpFetchEndpoint {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Fetch for HttpFetchEndpoint {
    async fn fetch(&self, candidate: &Candidate, _task: &Task) -> anyhow::Result<Map<String, Value>> {
        let mut request = self.client.get(&self.base_url).query(&[("url", candidate.url.as_str())]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }
        let value: Value = request.send().await?.json().await?;
        value
            .as_object()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("fetch endpoint returned a non-object payload"))
    }
}

/// Deterministic stand-in search used by local dry runs: fabricates a
/// single on-topic candidate from the task itself, no network involved.
pub struct MockSearch {
    pub kind: AgentKind,
}

#[async_trait]
impl Search for MockSearch {
    async fn search(&self, query: &str, task: &Task) -> anyhow::Result<Vec<Candidate>> {
        Ok(vec![Candidate {
            id: Some(format!("mock-{}-{}", self.kind.as_str(), task.step_number)),
            title: format!("{} ({})", query, self.kind.as_str()),
            url: format!("https://example.invalid/{}/{}", self.kind.as_str(), task.step_number),
            source: "mock".to_string(),
            snippet: Some(task.instructions.clone()),
            view_count: Some(1000),
            popularity: Some(50.0),
            authority: None,
            published_at: None,
            duration_seconds: Some(180),
        }])
    }
}

pub struct MockFetch;

#[async_trait]
impl Fetch for MockFetch {
    async fn fetch(&self, candidate: &Candidate, _task: &Task) -> anyhow::Result<Map<String, Value>> {
        let mut map = Map::new();
        map.insert("title".to_string(), Value::String(candidate.title.clone()));
        map.insert("url".to_string(), Value::String(candidate.url.clone()));
        map.insert(
            "reasoning".to_string(),
            Value::String(format!("Mock candidate selected for dry run: {}", candidate.title)),
        );
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task() -> Task {
        Task {
            transaction_id: "tx".to_string(),
            step_number: 1,
            location_name: "Lombard Street".to_string(),
            address: None,
            coordinates: None,
            instructions: "Turn right".to_string(),
            search_hint: "Lombard Street, San Francisco".to_string(),
            route_context: "San Francisco".to_string(),
            timestamp: Utc::now(),
            emit_timestamp: None,
        }
    }

    #[tokio::test]
    async fn mock_search_fabricates_one_on_topic_candidate() {
        let search = MockSearch { kind: AgentKind::Song };
        let candidates = search.search("lombard street music", &task()).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].title.contains("song"));
    }

    #[tokio::test]
    async fn mock_fetch_carries_title_and_url_through() {
        let fetch = MockFetch;
        let candidate = MockSearch { kind: AgentKind::Video }
            .search("q", &task())
            .await
            .unwrap()
            .remove(0);
        let payload = fetch.fetch(&candidate, &task()).await.unwrap();
        assert_eq!(payload.get("title").and_then(Value::as_str), Some(candidate.title.as_str()));
    }

    #[test]
    fn candidate_from_json_requires_title_and_url() {
        let missing_url = serde_json::json!({"title": "x"});
        assert!(candidate_from_json(missing_url, "test").is_none());
    }
}
