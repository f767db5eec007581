use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use medivault_core::{CoreError, CoreResult, InteractionLookup, InteractionRecord};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,   // Normal operation
    Open,     // Failure detected, failing fast
    HalfOpen, // One probe in flight
}

pub struct CircuitBreaker {
    pub name: String,
    pub state: RwLock<CircuitState>,
    pub failure_count: AtomicUsize,
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
    pub last_failure: RwLock<Option<Instant>>,
    /// When the current half-open probe was admitted. A probe that never reports back is
    /// replaced once `reset_timeout` has passed.
    pub probe_started: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: usize, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicUsize::new(0),
            failure_threshold: threshold.max(1),
            reset_timeout: timeout,
            last_failure: RwLock::new(None),
            probe_started: RwLock::new(None),
        }
    }

    pub async fn current_state(&self) -> CircuitState {
        *self.state.read().await
    }

    /// Whether a call may go through right now.
    pub async fn check(&self) -> bool {
        if *self.state.read().await == CircuitState::Closed {
            return true;
        }

        let mut state = self.state.write().await;
        match *state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                let mut probe = self.probe_started.write().await;
                match *probe {
                    Some(started) if started.elapsed() > self.reset_timeout => {
                        tracing::warn!(
                            "Circuit Breaker [{}] probe never completed, admitting another",
                            self.name
                        );
                        *probe = Some(Instant::now());
                        true
                    }
                    _ => false,
                }
            }
            CircuitState::Open => {
                let last_fail = *self.last_failure.read().await;
                match last_fail {
                    Some(instant) if instant.elapsed() > self.reset_timeout => {
                        *state = CircuitState::HalfOpen;
                        *self.probe_started.write().await = Some(Instant::now());
                        tracing::info!("Circuit Breaker [{}] moving to Half-Open", self.name);
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        if *state == CircuitState::HalfOpen {
            *state = CircuitState::Closed;
            tracing::info!("Circuit Breaker [{}] recovered to Closed", self.name);
        }
        self.failure_count.store(0, Ordering::SeqCst);
    }

    pub async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write().await;

        if count >= self.failure_threshold || *state == CircuitState::HalfOpen {
            *state = CircuitState::Open;
            let mut last = self.last_failure.write().await;
            *last = Some(Instant::now());
            tracing::error!("Circuit Breaker [{}] TRIPPED to Open. Failures: {}", self.name, count);
        }
    }
}

/// Wraps a lookup so that a failing provider is short-circuited instead of timing out on
/// every remaining pair.
pub struct GuardedLookup<L> {
    inner: L,
    breaker: Arc<CircuitBreaker>,
}

impl<L> GuardedLookup<L> {
    pub fn new(inner: L, breaker: Arc<CircuitBreaker>) -> Self {
        Self { inner, breaker }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

#[async_trait]
impl<L: InteractionLookup> InteractionLookup for GuardedLookup<L> {
    async fn check(
        &self,
        subject: &str,
        references: &[String],
    ) -> CoreResult<Vec<InteractionRecord>> {
        if !self.breaker.check().await {
            return Err(CoreError::LookupFailed(format!(
                "Circuit Breaker [{}] is OPEN",
                self.breaker.name
            )));
        }

        match self.inner.check(subject, references).await {
            Ok(records) => {
                self.breaker.record_success().await;
                Ok(records)
            }
            Err(e) => {
                self.breaker.record_failure().await;
                Err(e)
            }
        }
    }
}
