use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::AgentKind;

/// The per-step verdict produced by the judge. `chosen_agent` is always
/// `argmax individual_scores`, or `None` when the max score is `<= 0`, in
/// which case `overall_score` is pinned to `-1.0` and `chosen_content` is
/// empty.
///
/// Scores and rationales are keyed by `AgentKind::as_str()` rather than the
/// enum itself: `serde_json` maps require string keys, and this way the
/// wire shape is exactly `{"video": .., "song": .., "knowledge": ..}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeDecision {
    pub transaction_id: String,
    pub overall_score: f64,
    #[serde(default)]
    pub chosen_agent: Option<AgentKind>,
    pub individual_scores: HashMap<String, f64>,
    pub rationale: String,
    #[serde(default)]
    pub per_agent_rationales: HashMap<String, String>,
    #[serde(default)]
    pub chosen_content: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl JudgeDecision {
    /// Builds a decision from per-agent scores, enforcing the argmax /
    /// no-winner invariant in one place so every judge mode shares it.
    pub fn from_scores(
        transaction_id: String,
        individual_scores: HashMap<AgentKind, f64>,
        per_agent_rationales: HashMap<AgentKind, String>,
        contents: &HashMap<AgentKind, Map<String, Value>>,
        rationale: String,
    ) -> Self {
        let winner = individual_scores
            .iter()
            .filter(|(_, score)| **score > 0.0)
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(kind, score)| (*kind, *score));

        let individual_scores_wire = individual_scores
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), *v))
            .collect();
        let per_agent_rationales_wire = per_agent_rationales
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.clone()))
            .collect();

        match winner {
            Some((kind, score)) => Self {
                transaction_id,
                overall_score: score,
                chosen_agent: Some(kind),
                individual_scores: individual_scores_wire,
                rationale,
                per_agent_rationales: per_agent_rationales_wire,
                chosen_content: contents.get(&kind).cloned().unwrap_or_default(),
                timestamp: Utc::now(),
            },
            None => Self {
                transaction_id,
                overall_score: -1.0,
                chosen_agent: None,
                individual_scores: individual_scores_wire,
                rationale,
                per_agent_rationales: per_agent_rationales_wire,
                chosen_content: Map::new(),
                timestamp: Utc::now(),
            },
        }
    }
}
