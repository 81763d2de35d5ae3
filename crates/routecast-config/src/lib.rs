//! Configuration schema (§6): typed sections read from a YAML document,
//! `#[serde(default)]`-defaulted per field, with a `validate()` pass that
//! clamps out-of-bounds values and logs a warning rather than failing the
//! process — the teacher's `config.rs` treats a malformed layer as
//! defaults, never an abort, and this carries the same spirit into a typed
//! schema instead of a layered JSON merge.

use std::path::{Path, PathBuf};
use std::time::Duration;

use routecast_agents::{AgentConfig, BackoffPolicy, VideoDurationBounds};
use routecast_breaker::BreakerConfig;
use routecast_judge::{JudgeConfig, JudgeMode, ScoreWeights};
use routecast_route::LiveRouteConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_seconds: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { interval_seconds: 2.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_workers: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { max_workers: 4 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetryBackoffConfig {
    Linear,
    Exponential,
}

impl Default for RetryBackoffConfig {
    fn default() -> Self {
        Self::Exponential
    }
}

impl From<RetryBackoffConfig> for BackoffPolicy {
    fn from(value: RetryBackoffConfig) -> Self {
        match value {
            RetryBackoffConfig::Linear => BackoffPolicy::Linear,
            RetryBackoffConfig::Exponential => BackoffPolicy::Exponential,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentKindConfig {
    pub search_limit: usize,
    pub timeout_seconds: f64,
    pub retry_attempts: u32,
    pub retry_backoff: RetryBackoffConfig,
    pub min_duration_seconds: Option<u64>,
    pub max_duration_seconds: Option<u64>,
}

impl Default for AgentKindConfig {
    fn default() -> Self {
        Self {
            search_limit: 3,
            timeout_seconds: 10.0,
            retry_attempts: 3,
            retry_backoff: RetryBackoffConfig::default(),
            min_duration_seconds: None,
            max_duration_seconds: None,
        }
    }
}

impl AgentKindConfig {
    fn validate(&mut self, kind: &str) {
        if self.search_limit == 0 {
            tracing::warn!(kind, "search_limit was 0; clamped to 1");
            self.search_limit = 1;
        }
        if self.timeout_seconds <= 0.0 {
            tracing::warn!(kind, "timeout_seconds was non-positive; clamped to 10.0");
            self.timeout_seconds = 10.0;
        }
        if self.retry_attempts == 0 {
            tracing::warn!(kind, "retry_attempts was 0; clamped to 1");
            self.retry_attempts = 1;
        }
        if let (Some(min), Some(max)) = (self.min_duration_seconds, self.max_duration_seconds) {
            if min > max {
                tracing::warn!(kind, "min_duration_seconds exceeded max_duration_seconds; dropping both bounds");
                self.min_duration_seconds = None;
                self.max_duration_seconds = None;
            }
        }
    }

    pub fn to_agent_config(&self) -> AgentConfig {
        AgentConfig {
            search_limit: self.search_limit,
            retry_attempts: self.retry_attempts,
            backoff: self.retry_backoff.into(),
            timeout: Duration::from_secs_f64(self.timeout_seconds),
            video_duration_bounds: VideoDurationBounds {
                min_seconds: self.min_duration_seconds,
                max_seconds: self.max_duration_seconds,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AgentsConfig {
    pub video: AgentKindConfig,
    pub song: AgentKindConfig,
    pub knowledge: AgentKindConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScoringModeConfig {
    Heuristic,
    Llm,
    Hybrid,
}

impl Default for ScoringModeConfig {
    fn default() -> Self {
        Self::Heuristic
    }
}

impl From<ScoringModeConfig> for JudgeMode {
    fn from(value: ScoringModeConfig) -> Self {
        match value {
            ScoringModeConfig::Heuristic => JudgeMode::Heuristic,
            ScoringModeConfig::Llm => JudgeMode::Llm,
            ScoringModeConfig::Hybrid => JudgeMode::Hybrid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsConfig {
    pub presence: f64,
    pub quality: f64,
    pub relevance: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        let defaults = ScoreWeights::default();
        Self {
            presence: defaults.presence,
            quality: defaults.quality,
            relevance: defaults.relevance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfigSection {
    pub scoring_mode: ScoringModeConfig,
    pub weights: WeightsConfig,
    pub llm_scoring: bool,
}

impl Default for JudgeConfigSection {
    fn default() -> Self {
        Self {
            scoring_mode: ScoringModeConfig::default(),
            weights: WeightsConfig::default(),
            llm_scoring: false,
        }
    }
}

impl JudgeConfigSection {
    fn validate(&mut self) {
        let sum = self.weights.presence + self.weights.quality + self.weights.relevance;
        if sum <= 0.0 || !(0.99..=1.01).contains(&sum) {
            tracing::warn!(sum, "judge.weights did not sum to 1.0; reset to defaults");
            self.weights = WeightsConfig::default();
        }
        if self.llm_scoring && matches!(self.scoring_mode, ScoringModeConfig::Heuristic) {
            tracing::warn!("judge.llm_scoring has no effect under scoring_mode=heuristic");
        }
    }

    pub fn to_judge_config(&self) -> JudgeConfig {
        JudgeConfig {
            mode: self.scoring_mode.into(),
            weights: ScoreWeights {
                presence: self.weights.presence,
                quality: self.weights.quality,
                relevance: self.weights.relevance,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RouteModeConfig {
    Cached,
    Live,
}

impl Default for RouteModeConfig {
    fn default() -> Self {
        Self::Cached
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteProviderConfig {
    pub mode: RouteModeConfig,
    pub cache_dir: PathBuf,
    pub max_steps: usize,
    pub api_retry_attempts: u32,
    pub api_timeout_seconds: f64,
}

impl Default for RouteProviderConfig {
    fn default() -> Self {
        let defaults = LiveRouteConfig::default();
        Self {
            mode: RouteModeConfig::default(),
            cache_dir: PathBuf::from("./routes"),
            max_steps: defaults.max_steps,
            api_retry_attempts: defaults.retry_attempts,
            api_timeout_seconds: defaults.timeout.as_secs_f64(),
        }
    }
}

impl RouteProviderConfig {
    fn validate(&mut self) {
        if self.max_steps == 0 {
            tracing::warn!("route_provider.max_steps was 0; clamped to 25");
            self.max_steps = 25;
        }
        if self.api_retry_attempts == 0 {
            tracing::warn!("route_provider.api_retry_attempts was 0; clamped to 1");
            self.api_retry_attempts = 1;
        }
        if self.api_timeout_seconds <= 0.0 {
            tracing::warn!("route_provider.api_timeout_seconds was non-positive; clamped to 10.0");
            self.api_timeout_seconds = 10.0;
        }
    }

    pub fn to_live_route_config(&self) -> LiveRouteConfig {
        LiveRouteConfig {
            max_steps: self.max_steps,
            retry_attempts: self.api_retry_attempts,
            timeout: Duration::from_secs_f64(self.api_timeout_seconds),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: f64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        let defaults = BreakerConfig::default();
        Self {
            failure_threshold: defaults.failure_threshold,
            timeout_seconds: defaults.timeout.as_secs_f64(),
        }
    }
}

impl CircuitBreakerConfig {
    fn validate(&mut self) {
        if self.failure_threshold == 0 {
            tracing::warn!("circuit_breaker.failure_threshold was 0; clamped to 1");
            self.failure_threshold = 1;
        }
        if self.timeout_seconds <= 0.0 {
            tracing::warn!("circuit_breaker.timeout_seconds was non-positive; clamped to 60.0");
            self.timeout_seconds = 60.0;
        }
    }

    pub fn to_breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            timeout: Duration::from_secs_f64(self.timeout_seconds),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub file: Option<PathBuf>,
    pub update_interval_seconds: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            file: None,
            update_interval_seconds: 30.0,
        }
    }
}

impl MetricsConfig {
    fn validate(&mut self) {
        if self.update_interval_seconds <= 0.0 {
            tracing::warn!("metrics.update_interval_seconds was non-positive; clamped to 30.0");
            self.update_interval_seconds = 30.0;
        }
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs_f64(self.update_interval_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub checkpoint_dir: PathBuf,
    pub checkpoint_retention_days: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("./checkpoints"),
            checkpoint_retention_days: 14,
        }
    }
}

impl OutputConfig {
    fn validate(&mut self) {
        if self.checkpoint_retention_days == 0 {
            tracing::warn!("output.checkpoint_retention_days was 0; clamped to 14");
            self.checkpoint_retention_days = 14;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub orchestrator: OrchestratorConfig,
    pub agents: AgentsConfig,
    pub judge: JudgeConfigSection,
    pub route_provider: RouteProviderConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub metrics: MetricsConfig,
    pub output: OutputConfig,
}

impl AppConfig {
    pub fn from_yaml_str(raw: &str) -> anyhow::Result<Self> {
        let mut config: AppConfig = serde_yaml::from_str(raw)?;
        config.validate();
        Ok(config)
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_yaml_str(&raw)
    }

    pub fn validate(&mut self) {
        if self.scheduler.interval_seconds <= 0.0 {
            tracing::warn!("scheduler.interval_seconds was non-positive; clamped to 2.0");
            self.scheduler.interval_seconds = 2.0;
        }
        if self.orchestrator.max_workers == 0 {
            tracing::warn!("orchestrator.max_workers was 0; clamped to 1");
            self.orchestrator.max_workers = 1;
        }
        self.agents.video.validate("video");
        self.agents.song.validate("song");
        self.agents.knowledge.validate("knowledge");
        self.judge.validate();
        self.route_provider.validate();
        self.circuit_breaker.validate();
        self.metrics.validate();
        self.output.validate();
    }

    pub fn scheduler_interval(&self) -> Duration {
        Duration::from_secs_f64(self.scheduler.interval_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_documented_defaults() {
        let config = AppConfig::from_yaml_str("").unwrap();
        assert_eq!(config.scheduler.interval_seconds, 2.0);
        assert_eq!(config.orchestrator.max_workers, 4);
        assert_eq!(config.agents.video.search_limit, 3);
        assert!(matches!(config.judge.scoring_mode, ScoringModeConfig::Heuristic));
        assert!(matches!(config.route_provider.mode, RouteModeConfig::Cached));
    }

    #[test]
    fn partial_override_leaves_the_rest_defaulted() {
        let yaml = "orchestrator:\n  max_workers: 8\nagents:\n  video:\n    search_limit: 5\n";
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.orchestrator.max_workers, 8);
        assert_eq!(config.agents.video.search_limit, 5);
        assert_eq!(config.agents.song.search_limit, 3);
        assert_eq!(config.scheduler.interval_seconds, 2.0);
    }

    #[test]
    fn scoring_mode_accepts_snake_case_variants() {
        let config = AppConfig::from_yaml_str("judge:\n  scoring_mode: hybrid\n").unwrap();
        assert!(matches!(config.judge.scoring_mode, ScoringModeConfig::Hybrid));
    }

    #[test]
    fn zero_search_limit_is_clamped_to_one() {
        let config = AppConfig::from_yaml_str("agents:\n  song:\n    search_limit: 0\n").unwrap();
        assert_eq!(config.agents.song.search_limit, 1);
    }

    #[test]
    fn weights_not_summing_to_one_reset_to_defaults() {
        let yaml = "judge:\n  weights:\n    presence: 0.9\n    quality: 0.9\n    relevance: 0.9\n";
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        let defaults = WeightsConfig::default();
        assert_eq!(config.judge.weights.presence, defaults.presence);
    }

    #[test]
    fn min_duration_past_max_duration_drops_both_bounds() {
        let yaml = "agents:\n  video:\n    min_duration_seconds: 600\n    max_duration_seconds: 60\n";
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert!(config.agents.video.min_duration_seconds.is_none());
        assert!(config.agents.video.max_duration_seconds.is_none());
    }

    #[test]
    fn conversions_round_trip_into_the_owning_crates_config_types() {
        let config = AppConfig::from_yaml_str("").unwrap();
        let agent_config = config.agents.video.to_agent_config();
        assert_eq!(agent_config.search_limit, 3);
        let breaker_config = config.circuit_breaker.to_breaker_config();
        assert_eq!(breaker_config.failure_threshold, 5);
        let route_config = config.route_provider.to_live_route_config();
        assert_eq!(route_config.max_steps, 25);
        let judge_config = config.judge.to_judge_config();
        assert!(matches!(judge_config.mode, JudgeMode::Heuristic));
    }
}
