//! The retry/backoff/breaker stack every agent upstream call goes through
//! (§4.G step 2). Breaker-rejected calls return `None` immediately; retries
//! only happen around calls the breaker actually let through.

use std::future::Future;
use std::time::Duration;

use routecast_breaker::{CallError, CircuitBreaker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    Linear,
    Exponential,
}

fn backoff_delay(policy: BackoffPolicy, attempt: u32, cap: Duration) -> Duration {
    let raw_secs = match policy {
        BackoffPolicy::Linear => 1.0 * (attempt as f64 + 1.0),
        BackoffPolicy::Exponential => 0.5 * 2f64.powi(attempt as i32),
    };
    Duration::from_secs_f64(raw_secs).min(cap)
}

/// Runs `make_call` under `breaker`, retrying up to `attempts` times with
/// `backoff` between tries, each attempt capped at `timeout`. A breaker
/// rejection short-circuits the whole retry loop.
pub async fn call_with_resilience<T, F, Fut>(
    breaker: &CircuitBreaker,
    attempts: u32,
    backoff: BackoffPolicy,
    timeout: Duration,
    mut make_call: F,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    for attempt in 0..attempts.max(1) {
        let call = make_call();
        let result = breaker
            .call(|| async move {
                match tokio::time::timeout(timeout, call).await {
                    Ok(inner) => inner,
                    Err(_) => Err(anyhow::anyhow!("call timed out after {:?}", timeout)),
                }
            })
            .await;

        match result {
            Ok(value) => return Some(value),
            Err(CallError::BreakerOpen) => return None,
            Err(CallError::Inner(err)) => {
                tracing::debug!(attempt, error = %err, "retryable call failed");
                if attempt + 1 >= attempts {
                    return None;
                }
                tokio::time::sleep(backoff_delay(backoff, attempt, timeout)).await;
            }
        }
    }
    None
}
