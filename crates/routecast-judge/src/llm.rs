//! LLM-backed judging (§4.H): render a prompt carrying sanitized per-agent
//! summaries, call the model, and parse its decision through a cascade that
//! tolerates markdown fences, narrative prefixes, and a few alternate field
//! name shapes observed from real providers.

use std::collections::HashMap;

use routecast_types::{AgentKind, AgentResult, Task};
use serde_json::Value;

pub struct ParsedDecision {
    pub scores: HashMap<AgentKind, f64>,
    pub rationale: String,
}

pub fn render_prompt(task: &Task, results: &HashMap<AgentKind, AgentResult>) -> String {
    let mut summaries = String::new();
    for kind in AgentKind::ALL {
        let Some(result) = results.get(&kind) else {
            continue;
        };
        summaries.push_str(&format!(
            "- {}: status={:?} title={:?} reasoning={:?}\n",
            kind.as_str(),
            result.status,
            result.title().unwrap_or(""),
            result.reasoning,
        ));
    }
    format!(
        "Judge which of these candidates best fits the route step below. \
         Respond with JSON: {{\"chosen_agent\": \"video|song|knowledge\", \
         \"individual_scores\": {{\"video\": 0, \"song\": 0, \"knowledge\": 0}}, \"rationale\": \"...\"}}.\n\
         Location: {}\nInstructions: {}\nCandidates:\n{}",
        task.search_hint, task.instructions, summaries,
    )
}

pub fn parse_decision(text: &str) -> Option<ParsedDecision> {
    let json_like = extract_json_like(text);
    let value: Value = serde_json::from_str(&json_like).ok()?;
    let scores = extract_scores(&value)?;
    let rationale = extract_rationale(&value).unwrap_or_default();
    Some(ParsedDecision { scores, rationale })
}

fn extract_scores(value: &Value) -> Option<HashMap<AgentKind, f64>> {
    let scores_obj = value
        .get("individual_scores")
        .or_else(|| value.get("scores"))
        .and_then(Value::as_object)?;

    let mut scores = HashMap::new();
    for kind in AgentKind::ALL {
        let entry = scores_obj.get(kind.as_str());
        let score = match entry {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::Object(nested)) => nested
                .get("Total Weighted Score")
                .or_else(|| nested.get("total_weighted_score"))
                .and_then(Value::as_f64),
            _ => None,
        };
        if let Some(score) = score {
            scores.insert(kind, score);
        }
    }
    if scores.is_empty() {
        None
    } else {
        Some(scores)
    }
}

fn extract_rationale(value: &Value) -> Option<String> {
    value
        .get("rationale")
        .or_else(|| value.get("reasoning"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub fn extract_chosen_agent(text: &str) -> Option<AgentKind> {
    let json_like = extract_json_like(text);
    let value: Value = serde_json::from_str(&json_like).ok()?;
    let raw = value
        .get("chosen_agent")
        .and_then(Value::as_str)
        .or_else(|| value.get("final_selection").and_then(|v| v.get("agent_type")).and_then(Value::as_str))?;
    AgentKind::ALL.into_iter().find(|k| k.as_str().eq_ignore_ascii_case(raw))
}

fn extract_json_like(text: &str) -> String {
    let unfenced = strip_code_fence(text.trim());
    match unfenced.find(['{', '[']) {
        Some(start) => {
            let open = unfenced[start..].chars().next().unwrap();
            let close = if open == '{' { '}' } else { ']' };
            match find_balanced_end(&unfenced[start..], open, close) {
                Some(end) => unfenced[start..start + end].to_string(),
                None => unfenced,
            }
        }
        None => unfenced,
    }
}

fn strip_code_fence(text: &str) -> String {
    let Some(rest) = text.strip_prefix("```") else {
        return text.to_string();
    };
    let rest = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim().to_string()
}

fn find_balanced_end(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
            continue;
        }
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(i + c.len_utf8());
            }
        }
    }
    None
}
