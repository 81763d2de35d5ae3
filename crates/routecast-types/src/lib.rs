//! Shared wire types flowing through the routecast pipeline.
//!
//! Every type here is a plain serde struct or enum: Task, Candidate,
//! AgentResult, JudgeDecision and StepOutput, matching §3 of the spec they
//! are drawn from. Nothing in this crate holds a lock or performs I/O.

mod agent;
mod candidate;
mod judge;
mod step;
mod task;

pub use agent::{AgentKind, AgentResult, AgentStatus};
pub use candidate::Candidate;
pub use judge::JudgeDecision;
pub use step::StepOutput;
pub use task::{Coordinates, Task};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn judge_decision_picks_argmax() {
        let mut scores = HashMap::new();
        scores.insert(AgentKind::Video, 80.0);
        scores.insert(AgentKind::Song, 42.0);
        scores.insert(AgentKind::Knowledge, 0.0);
        let decision = JudgeDecision::from_scores(
            "tx-1".to_string(),
            scores,
            HashMap::new(),
            &HashMap::new(),
            "video had the best metadata".to_string(),
        );
        assert_eq!(decision.chosen_agent, Some(AgentKind::Video));
        assert_eq!(decision.overall_score, 80.0);
    }

    #[test]
    fn judge_decision_has_no_winner_when_all_scores_are_zero() {
        let mut scores = HashMap::new();
        scores.insert(AgentKind::Video, 0.0);
        scores.insert(AgentKind::Song, 0.0);
        scores.insert(AgentKind::Knowledge, 0.0);
        let decision = JudgeDecision::from_scores(
            "tx-2".to_string(),
            scores,
            HashMap::new(),
            &HashMap::new(),
            "nothing usable".to_string(),
        );
        assert_eq!(decision.chosen_agent, None);
        assert_eq!(decision.overall_score, -1.0);
        assert!(decision.chosen_content.is_empty());
    }

    #[test]
    fn task_fills_blank_search_hint_and_context() {
        let task = Task {
            transaction_id: "tx".to_string(),
            step_number: 1,
            location_name: "Boston Common".to_string(),
            address: None,
            coordinates: None,
            instructions: "Head north".to_string(),
            search_hint: String::new(),
            route_context: String::new(),
            timestamp: chrono::Utc::now(),
            emit_timestamp: None,
        }
        .with_defaults_filled("Cambridge, MA");
        assert_eq!(task.route_context, "Cambridge, MA");
        assert_eq!(task.search_hint, "Boston Common, Cambridge, MA");
    }

    #[test]
    fn candidate_dedup_key_prefers_id_over_url() {
        let c = Candidate {
            id: Some("abc".to_string()),
            title: "t".to_string(),
            url: "https://example.com".to_string(),
            source: "test".to_string(),
            snippet: None,
            view_count: None,
            popularity: None,
            authority: None,
            published_at: None,
            duration_seconds: None,
        };
        assert_eq!(c.dedup_key(), "abc");
    }
}
