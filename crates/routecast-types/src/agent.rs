use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Video,
    Song,
    Knowledge,
}

impl AgentKind {
    pub const ALL: [AgentKind; 3] = [AgentKind::Video, AgentKind::Song, AgentKind::Knowledge];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::Video => "video",
            AgentKind::Song => "song",
            AgentKind::Knowledge => "knowledge",
        }
    }

    /// The heuristic query-generation keyword per kind (§4.G step 1).
    pub fn query_keyword(self) -> &'static str {
        match self {
            AgentKind::Video => "walking tour",
            AgentKind::Song => "music",
            AgentKind::Knowledge => "history",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Ok,
    Unavailable,
    Error,
}

/// The outcome of one agent's run for one task. Invariant: `status == Ok`
/// implies `metadata` is non-empty and carries `title`/`url`; any other
/// status may carry an empty `metadata` and must set `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_type: AgentKind,
    pub status: AgentStatus,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AgentResult {
    pub fn ok(agent_type: AgentKind, metadata: Map<String, Value>, reasoning: String) -> Self {
        Self {
            agent_type,
            status: AgentStatus::Ok,
            metadata,
            reasoning,
            timestamp: Utc::now(),
            error: None,
        }
    }

    pub fn unavailable(agent_type: AgentKind, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            agent_type,
            status: AgentStatus::Unavailable,
            metadata: Map::new(),
            reasoning: reason.clone(),
            timestamp: Utc::now(),
            error: Some(reason),
        }
    }

    pub fn error(agent_type: AgentKind, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            agent_type,
            status: AgentStatus::Error,
            metadata: Map::new(),
            reasoning: "agent raised an exception".to_string(),
            timestamp: Utc::now(),
            error: Some(error),
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(Value::as_str)
    }

    pub fn url(&self) -> Option<&str> {
        self.metadata.get("url").and_then(Value::as_str)
    }
}
