use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// One step of a planned route, immutable from the moment the scheduler
/// stamps `emit_timestamp` and hands it to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub transaction_id: String,
    pub step_number: u32,
    pub location_name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    pub instructions: String,
    pub search_hint: String,
    pub route_context: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub emit_timestamp: Option<DateTime<Utc>>,
}

impl Task {
    /// Fills `search_hint`/`route_context` when a cached route document left
    /// them blank, following the shaping the cached route provider applies.
    pub fn with_defaults_filled(mut self, route_context: &str) -> Self {
        if self.route_context.trim().is_empty() {
            self.route_context = route_context.to_string();
        }
        if self.search_hint.trim().is_empty() {
            self.search_hint = format!("{}, {}", self.location_name, self.route_context);
        }
        self
    }
}
