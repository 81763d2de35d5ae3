//! External emitters (§6): thin formatting functions over `StepOutput`.
//! Invoked from the `engine` binary; kept here since the data they format
//! already lives in this crate.

use routecast_types::{AgentKind, StepOutput};

pub fn to_json_array(steps: &[StepOutput]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(steps)?)
}

pub fn to_markdown(steps: &[StepOutput]) -> String {
    let mut out = String::from("# Route Enrichment\n\n");
    for step in steps {
        out.push_str(&format!("## Step {}: {}\n\n", step.step_number, step.location));
        out.push_str(&format!("{}\n\n", step.instructions));
        match step.judge.chosen_agent {
            Some(kind) => {
                let title = step.agent_result(kind).and_then(|r| r.title()).unwrap_or("(untitled)");
                out.push_str(&format!(
                    "**Chosen:** {} — {} (score {:.1})\n\n",
                    kind.as_str(),
                    title,
                    step.judge.overall_score
                ));
            }
            None => out.push_str("**Chosen:** none (no agent scored above zero)\n\n"),
        }
        out.push_str(&format!("_{}_\n\n", step.judge.rationale));
    }
    out
}

pub fn to_csv(steps: &[StepOutput]) -> String {
    let mut out = String::from(
        "location,video_title,video_url,video_score,song_title,song_url,song_score,\
         knowledge_title,knowledge_url,knowledge_score,judge_overall_score,\
         judge_chosen_agent,judge_chosen_content_title,judge_chosen_content_url\n",
    );
    for step in steps {
        let video = kind_fields(step, AgentKind::Video);
        let song = kind_fields(step, AgentKind::Song);
        let knowledge = kind_fields(step, AgentKind::Knowledge);

        let chosen_agent = step.judge.chosen_agent.map(|k| k.as_str()).unwrap_or("");
        let chosen_title = step
            .judge
            .chosen_content
            .get("title")
            .and_then(|v| v.as_str())
            .map(csv_escape)
            .unwrap_or_default();
        let chosen_url = step
            .judge
            .chosen_content
            .get("url")
            .and_then(|v| v.as_str())
            .map(csv_escape)
            .unwrap_or_default();

        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
            csv_escape(&step.location),
            video.0,
            video.1,
            video.2,
            song.0,
            song.1,
            song.2,
            knowledge.0,
            knowledge.1,
            knowledge.2,
            step.judge.overall_score,
            chosen_agent,
            chosen_title,
            chosen_url,
        ));
    }
    out
}

/// (title, url, score) for one kind, each empty/blank when unavailable.
fn kind_fields(step: &StepOutput, kind: AgentKind) -> (String, String, String) {
    let result = step.agent_result(kind);
    let title = result.and_then(|r| r.title()).map(csv_escape).unwrap_or_default();
    let url = result.and_then(|r| r.url()).map(csv_escape).unwrap_or_default();
    let score = step
        .judge
        .individual_scores
        .get(kind.as_str())
        .map(|s| s.to_string())
        .unwrap_or_default();
    (title, url, score)
}

fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use routecast_types::{AgentKind, AgentResult, JudgeDecision};
    use serde_json::Map;
    use std::collections::HashMap;

    fn step_with_winner() -> StepOutput {
        let mut metadata = Map::new();
        metadata.insert("title".to_string(), serde_json::Value::String("Crooked Street Tour".to_string()));
        metadata.insert("url".to_string(), serde_json::Value::String("https://example.com/a".to_string()));
        let result = AgentResult::ok(AgentKind::Video, metadata.clone(), "best fit".to_string());

        let mut agents = HashMap::new();
        agents.insert(AgentKind::Video.as_str().to_string(), result);

        let mut scores = HashMap::new();
        scores.insert(AgentKind::Video, 82.0);
        let contents = {
            let mut m = HashMap::new();
            m.insert(AgentKind::Video, metadata);
            m
        };
        let judge = JudgeDecision::from_scores("tx-1".to_string(), scores, HashMap::new(), &contents, "relevant and complete".to_string());

        StepOutput {
            transaction_id: "tx-1".to_string(),
            step_number: 1,
            location: "Lombard Street".to_string(),
            instructions: "Turn right".to_string(),
            agents,
            judge,
            timestamp: Utc::now(),
            emit_timestamp: None,
        }
    }

    #[test]
    fn json_array_round_trips_through_serde() {
        let steps = vec![step_with_winner()];
        let json = to_json_array(&steps).unwrap();
        let parsed: Vec<StepOutput> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0].step_number, 1);
    }

    #[test]
    fn markdown_includes_the_winning_title() {
        let markdown = to_markdown(&[step_with_winner()]);
        assert!(markdown.contains("Crooked Street Tour"));
        assert!(markdown.contains("## Step 1"));
    }

    #[test]
    fn csv_escapes_fields_containing_commas() {
        let mut step = step_with_winner();
        step.location = "Lombard, the crooked one".to_string();
        let csv = to_csv(&[step]);
        assert!(csv.contains("\"Lombard, the crooked one\""));
    }

    #[test]
    fn csv_header_matches_the_documented_column_order() {
        let csv = to_csv(&[step_with_winner()]);
        let header = csv.lines().next().unwrap();
        assert_eq!(
            header,
            "location,video_title,video_url,video_score,song_title,song_url,song_score,\
             knowledge_title,knowledge_url,knowledge_score,judge_overall_score,\
             judge_chosen_agent,judge_chosen_content_title,judge_chosen_content_url"
        );
    }

    #[test]
    fn csv_leaves_unavailable_kinds_blank_and_fills_the_chosen_kind() {
        let csv = to_csv(&[step_with_winner()]);
        let row = csv.lines().nth(1).unwrap();
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(fields[1], "Crooked Street Tour"); // video_title
        assert_eq!(fields[4], ""); // song_title: no song result present
        assert_eq!(fields[11], "video"); // judge_chosen_agent
        assert_eq!(fields[12], "Crooked Street Tour"); // judge_chosen_content_title
    }
}
