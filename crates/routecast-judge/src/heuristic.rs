//! Heuristic scoring (§4.H): presence/quality/relevance sub-scores, each in
//! `[0, 100]`, combined by a configurable weight triple.

use std::collections::HashSet;

use routecast_types::{AgentKind, AgentResult, AgentStatus, Task};

#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub presence: f64,
    pub quality: f64,
    pub relevance: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            presence: 0.3,
            quality: 0.3,
            relevance: 0.4,
        }
    }
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "of", "to", "in", "on", "at", "for", "with", "is", "are",
    "this", "that", "it", "as", "by", "from",
];

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

fn query_tokens(task: &Task) -> HashSet<String> {
    tokenize(&format!("{} {} {}", task.search_hint, task.route_context, task.instructions))
}

fn metadata_text(result: &AgentResult) -> String {
    result
        .metadata
        .values()
        .filter_map(|v| v.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn has_nonempty(result: &AgentResult, key: &str) -> bool {
    match result.metadata.get(key) {
        Some(serde_json::Value::String(s)) => !s.trim().is_empty(),
        Some(serde_json::Value::Null) | None => false,
        Some(_) => true,
    }
}

fn quality(kind: AgentKind, result: &AgentResult) -> f64 {
    match kind {
        AgentKind::Video => {
            let mut score = 0.0;
            if has_nonempty(result, "title") {
                score += 40.0;
            }
            if has_nonempty(result, "description") {
                score += 40.0;
            }
            if has_nonempty(result, "view_count") {
                score += 20.0;
            }
            score
        }
        AgentKind::Song => {
            let mut score = 0.0;
            if has_nonempty(result, "title") {
                score += 40.0;
            }
            if has_nonempty(result, "artist") {
                score += 40.0;
            }
            if has_nonempty(result, "album") {
                score += 20.0;
            }
            score
        }
        AgentKind::Knowledge => {
            let mut score = 0.0;
            if has_nonempty(result, "title") {
                score += 30.0;
            }
            if has_nonempty(result, "summary") || has_nonempty(result, "content") {
                score += 50.0;
            }
            if has_nonempty(result, "source") {
                score += 20.0;
            }
            score
        }
    }
}

fn relevance(task: &Task, result: &AgentResult) -> f64 {
    let query = query_tokens(task);
    if query.is_empty() {
        return 0.0;
    }
    let content = tokenize(&metadata_text(result));
    let overlap = query.intersection(&content).count();
    100.0 * overlap as f64 / query.len() as f64
}

/// Scores one agent's result for one task. Agents that did not succeed, or
/// whose metadata is empty, score `0.0` across the board.
pub fn score(task: &Task, kind: AgentKind, result: &AgentResult, weights: ScoreWeights) -> f64 {
    let eligible = matches!(result.status, AgentStatus::Ok) && !result.metadata.is_empty();
    if !eligible {
        return 0.0;
    }
    let presence = 100.0;
    let quality = quality(kind, result);
    let relevance = relevance(task, result);
    weights.presence * presence + weights.quality * quality + weights.relevance * relevance
}
