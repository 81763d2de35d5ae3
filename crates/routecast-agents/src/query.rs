//! Query generation (§4.G step 1): an LLM is asked for a handful of search
//! queries per task; the response is parsed through a tolerant JSON
//! extraction cascade, and a purely heuristic template fills in wherever
//! the LLM is absent, errors, or returns nothing usable.

use routecast_types::{AgentKind, Task};
use serde_json::Value;

pub fn heuristic_queries(kind: AgentKind, task: &Task) -> Vec<String> {
    let keyword = kind.query_keyword();
    let mut queries = vec![
        format!("{}, {}", task.location_name, task.route_context),
        format!("{} {}", task.location_name, keyword),
        format!("{} {}", task.route_context, keyword),
    ];
    dedupe_preserve_order(&mut queries);
    queries.retain(|q| !q.trim().is_empty());
    if queries.is_empty() {
        queries.push(task.location_name.clone());
    }
    queries
}

pub fn render_prompt(kind: AgentKind, task: &Task) -> String {
    format!(
        "Suggest up to 4 concise web search queries for finding a {} related to this point on a driving route.\n\
         Location: {}\nRoute context: {}\nInstructions: {}\n\
         Respond with a JSON array of query strings, nothing else.",
        kind.as_str(),
        task.search_hint,
        task.route_context,
        task.instructions,
    )
}

/// Extracts a list of query strings from a model response, tolerating
/// markdown code fences, surrounding prose, and either of
/// `["q1","q2"]`, `{"queries": [...]}`, `{"search_queries": [...]}`, or an
/// array of `{"query": "..."}` objects.
pub fn extract_queries(text: &str) -> Option<Vec<String>> {
    let json_like = extract_json_like(text);
    let value: Value = serde_json::from_str(&json_like).ok()?;
    let mut queries = extract_from_value(&value)?;
    dedupe_preserve_order(&mut queries);
    queries.retain(|q| !q.trim().is_empty());
    if queries.is_empty() {
        None
    } else {
        Some(queries)
    }
}

fn extract_from_value(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                match item {
                    Value::String(s) => out.push(s.clone()),
                    Value::Object(map) => {
                        if let Some(q) = map.get("query").and_then(Value::as_str) {
                            out.push(q.to_string());
                        }
                    }
                    _ => {}
                }
            }
            if out.is_empty() {
                None
            } else {
                Some(out)
            }
        }
        Value::Object(map) => map
            .get("queries")
            .or_else(|| map.get("search_queries"))
            .and_then(|v| extract_from_value(v)),
        _ => None,
    }
}

/// Strips a leading ```lang fence and trailing ```, then narrows to the
/// first balanced `{...}` or `[...]` substring, discarding narrative text
/// a model wraps the JSON in.
fn extract_json_like(text: &str) -> String {
    let unfenced = strip_code_fence(text.trim());
    let bytes = unfenced.as_str();
    match bytes.find(['{', '[']) {
        Some(start) => {
            let open = bytes[start..].chars().next().unwrap();
            let close = if open == '{' { '}' } else { ']' };
            match find_balanced_end(&bytes[start..], open, close) {
                Some(end) => bytes[start..start + end].to_string(),
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

pub fn dedupe_preserve_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}
