use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::provider::{LlmResponse, Provider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    Linear,
    Exponential,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
    pub max_prompt_chars: usize,
    pub max_tokens: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff: BackoffPolicy::Exponential,
            max_prompt_chars: 8000,
            max_tokens: None,
        }
    }
}

#[derive(Debug)]
pub enum LlmError {
    BudgetExceeded,
    Provider(anyhow::Error),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::BudgetExceeded => write!(f, "budget exceeded"),
            LlmError::Provider(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for LlmError {}

/// The uniform `query(prompt) -> {text, usage}` contract (§4.D), wrapping
/// whichever `Provider` was selected with timeout, retry/backoff and a
/// cross-call token budget. Token accounting is single-writer-wins: an
/// `AtomicU64` updated after each successful call, approximate under
/// concurrent callers by design (§5).
pub struct LlmClient {
    provider: Arc<dyn Provider>,
    config: ClientConfig,
    tokens_used: AtomicU64,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn Provider>, config: ClientConfig) -> Self {
        Self {
            provider,
            config,
            tokens_used: AtomicU64::new(0),
        }
    }

    pub fn provider_id(&self) -> &'static str {
        self.provider.id()
    }

    pub fn tokens_used(&self) -> u64 {
        self.tokens_used.load(Ordering::Relaxed)
    }

    pub async fn query(&self, prompt: &str) -> Result<LlmResponse, LlmError> {
        if let Some(budget) = self.config.max_tokens {
            if self.tokens_used() >= budget {
                return Err(LlmError::BudgetExceeded);
            }
        }

        let prompt = truncate_from_tail(prompt, self.config.max_prompt_chars);
        let mut attempt = 0u32;

        loop {
            let call = self.provider.complete(&prompt);
            match tokio::time::timeout(self.config.timeout, call).await {
                Ok(Ok(response)) => {
                    if let Some(usage) = &response.usage {
                        self.tokens_used.fetch_add(usage.total_tokens, Ordering::Relaxed);
                    }
                    return Ok(response);
                }
                Ok(Err(err)) => {
                    if attempt + 1 >= self.config.max_retries {
                        return Err(LlmError::Provider(err));
                    }
                }
                Err(_elapsed) => {
                    if attempt + 1 >= self.config.max_retries {
                        return Err(LlmError::Provider(anyhow::anyhow!(
                            "provider `{}` timed out after {:?}",
                            self.provider.id(),
                            self.config.timeout
                        )));
                    }
                }
            }
            tokio::time::sleep(backoff_delay(self.config.backoff, attempt, self.config.timeout)).await;
            attempt += 1;
        }
    }
}

fn truncate_from_tail(prompt: &str, max_chars: usize) -> String {
    if prompt.chars().count() <= max_chars {
        return prompt.to_string();
    }
    prompt.chars().take(max_chars).collect()
}

fn backoff_delay(policy: BackoffPolicy, attempt: u32, cap: Duration) -> Duration {
    let raw_secs = match policy {
        BackoffPolicy::Linear => 1.0 * (attempt as f64 + 1.0),
        BackoffPolicy::Exponential => 0.5 * 2f64.powi(attempt as i32),
    };
    Duration::from_secs_f64(raw_secs).min(cap)
}
