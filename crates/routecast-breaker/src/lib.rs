//! Per-named-upstream circuit breaker (§4.A): a 3-state latch protecting a
//! synchronous-looking async call. States transition `closed -> open` after
//! `failure_threshold` consecutive failures, `open -> half_open` once
//! `timeout` has elapsed, and `half_open -> closed | open` on the single
//! trial call's outcome.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    failure_count: u32,
    opened_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(60),
        }
    }
}

/// The error a caller sees when the breaker is open, or the wrapped error
/// from an attempted call.
#[derive(Debug)]
pub enum CallError<E> {
    BreakerOpen,
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::BreakerOpen => write!(f, "breaker open"),
            CallError::Inner(e) => write!(f, "{e}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for CallError<E> {}

/// A single named breaker. Cheap to clone: the shared state lives behind an
/// `Arc<Mutex<_>>`, serialized per instance, never shared with another name.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Mutex<Inner>>,
    config: BreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: State::Closed,
                failure_count: 0,
                opened_at: None,
            })),
            config,
        }
    }

    /// Runs `f` if the breaker currently permits a call, recording the
    /// outcome. Rejected calls never invoke `f` and return immediately.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.acquire_permit().await {
            return Err(CallError::BreakerOpen);
        }
        match f().await {
            Ok(value) => {
                self.record_success().await;
                Ok(value)
            }
            Err(err) => {
                self.record_failure().await;
                Err(CallError::Inner(err))
            }
        }
    }

    /// Whether the breaker is currently rejecting calls, without mutating
    /// state (the `open -> half_open` transition only happens through
    /// `acquire_permit`, so repeated `is_open` checks never race the trial).
    pub async fn is_open(&self) -> bool {
        let inner = self.inner.lock().await;
        match inner.state {
            State::Open => match inner.opened_at {
                Some(opened_at) => opened_at.elapsed() < self.config.timeout,
                None => true,
            },
            State::HalfOpen => true,
            State::Closed => false,
        }
    }

    async fn acquire_permit(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.state {
            State::Closed => true,
            State::HalfOpen => false,
            State::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.config.timeout {
                    inner.state = State::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        inner.failure_count = 0;
        inner.state = State::Closed;
    }

    async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.failure_count += 1;
        let was_trial = inner.state == State::HalfOpen;
        if was_trial || inner.failure_count >= self.config.failure_threshold {
            inner.state = State::Open;
            inner.opened_at = Some(Instant::now());
        }
    }
}

/// Per-name breaker registry, created once per pipeline run and injected
/// into every component that makes upstream calls.
#[derive(Clone)]
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: Arc<Mutex<HashMap<String, CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get(&self, name: &str) -> CircuitBreaker {
        let mut breakers = self.breakers.lock().await;
        breakers
            .entry(name.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.config))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_breaker_invokes_the_call() {
        let breaker = CircuitBreaker::new(BreakerConfig::default());
        let result: Result<u32, CallError<&str>> = breaker.call(|| async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn opens_after_failure_threshold_and_rejects_without_invoking() {
        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: 2,
            timeout: Duration::from_secs(60),
        });

        for _ in 0..2 {
            let result: Result<u32, CallError<&str>> =
                breaker.call(|| async { Err("boom") }).await;
            assert!(matches!(result, Err(CallError::Inner("boom"))));
        }

        assert!(breaker.is_open().await);

        let invoked = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let invoked_clone = invoked.clone();
        let result: Result<u32, CallError<&str>> = breaker
            .call(move || {
                let invoked = invoked_clone.clone();
                async move {
                    invoked.store(true, std::sync::atomic::Ordering::SeqCst);
                    Ok(1)
                }
            })
            .await;
        assert!(matches!(result, Err(CallError::BreakerOpen)));
        assert!(!invoked.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_permits_exactly_one_trial_after_timeout() {
        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: 1,
            timeout: Duration::from_secs(10),
        });

        let _: Result<u32, CallError<&str>> = breaker.call(|| async { Err("boom") }).await;
        assert!(breaker.is_open().await);

        tokio::time::advance(Duration::from_secs(11)).await;

        let first = breaker.acquire_permit().await;
        let second = breaker.acquire_permit().await;
        assert!(first);
        assert!(!second, "only the first caller after timeout gets the trial");
    }

    #[tokio::test]
    async fn success_in_closed_state_resets_failure_count() {
        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: 3,
            timeout: Duration::from_secs(60),
        });
        let _: Result<u32, CallError<&str>> = breaker.call(|| async { Err("boom") }).await;
        let _: Result<u32, CallError<&str>> = breaker.call(|| async { Ok(1) }).await;
        assert!(!breaker.is_open().await);
        for _ in 0..2 {
            let _: Result<u32, CallError<&str>> = breaker.call(|| async { Err("boom") }).await;
        }
        assert!(!breaker.is_open().await, "failure count should have reset");
    }

    #[tokio::test]
    async fn half_open_failure_reopens_immediately() {
        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: 1,
            timeout: Duration::from_millis(0),
        });
        let _: Result<u32, CallError<&str>> = breaker.call(|| async { Err("boom") }).await;
        assert!(breaker.acquire_permit().await, "trial call should be allowed");
        breaker.record_failure().await;
        assert!(breaker.is_open().await);
    }

    #[tokio::test]
    async fn registry_hands_out_the_same_breaker_per_name() {
        let registry = BreakerRegistry::new(BreakerConfig::default());
        let a = registry.get("video.search").await;
        let b = registry.get("video.search").await;
        let _: Result<u32, CallError<&str>> = a.call(|| async { Err("boom") }).await;
        let _: Result<u32, CallError<&str>> = a.call(|| async { Err("boom") }).await;
        let _: Result<u32, CallError<&str>> = a.call(|| async { Err("boom") }).await;
        let _: Result<u32, CallError<&str>> = a.call(|| async { Err("boom") }).await;
        let _: Result<u32, CallError<&str>> = a.call(|| async { Err("boom") }).await;
        assert!(b.is_open().await, "clones via the registry share state");
    }
}
