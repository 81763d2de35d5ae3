use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::{AgentKind, AgentResult};
use crate::judge::JudgeDecision;

/// The assembled per-step record the orchestrator hands to the aggregator.
/// `agents` is keyed by `AgentKind::as_str()` for the same reason
/// `JudgeDecision`'s maps are: a plain string-keyed JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutput {
    pub transaction_id: String,
    pub step_number: u32,
    pub location: String,
    pub instructions: String,
    pub agents: HashMap<String, AgentResult>,
    pub judge: JudgeDecision,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub emit_timestamp: Option<DateTime<Utc>>,
}

impl StepOutput {
    pub fn agent_result(&self, kind: AgentKind) -> Option<&AgentResult> {
        self.agents.get(kind.as_str())
    }
}
