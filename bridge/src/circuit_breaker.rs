// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Circuit breaker for external chain endpoints
//!
//! Every RPC-facing call goes through a named breaker. Repeated failures
//! within the sliding window open the circuit; calls are then rejected
//! without touching the dependency until the cooldown elapses, after which
//! a half-open probe phase decides whether to close again.

use crate::error::{BridgeError, BridgeResult};
use crate::metrics::BridgeMetrics;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failures within `window` that open the circuit
    pub failure_threshold: u32,
    /// Consecutive successes in half-open that close the circuit
    pub success_threshold: u32,
    /// How long the circuit stays open before probing
    pub timeout: Duration,
    /// Sliding window over which failures are counted
    pub window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
            window: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

fn state_gauge_value(state: CircuitState) -> i64 {
    match state {
        CircuitState::Closed => 0,
        CircuitState::HalfOpen => 1,
        CircuitState::Open => 2,
    }
}

/// Point-in-time view of a breaker, for the operator status surface
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub failures_in_window: usize,
    pub success_count: u32,
    /// Seconds until an open circuit probes again
    pub time_until_retry_secs: Option<u64>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    failure_window: VecDeque<Instant>,
    opened_at: Option<Instant>,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            failure_window: VecDeque::new(),
            opened_at: None,
        }
    }

    fn prune_window(&mut self, window: Duration) {
        let now = Instant::now();
        while let Some(front) = self.failure_window.front() {
            if now.duration_since(*front) > window {
                self.failure_window.pop_front();
            } else {
                break;
            }
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    metrics: Arc<BridgeMetrics>,
}

impl CircuitBreaker {
    pub fn new(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner::new()),
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check whether a call may proceed.
    ///
    /// Returns `CircuitOpen` without invoking anything when the circuit is
    /// open and still cooling down. The open -> half-open transition happens
    /// here, on the first guarded call after the cooldown.
    pub fn guard(&self) -> BridgeResult<()> {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.state == CircuitState::Open {
            let elapsed = inner
                .opened_at
                .map(|t| t.elapsed())
                .unwrap_or(self.config.timeout);
            if elapsed >= self.config.timeout {
                inner.state = CircuitState::HalfOpen;
                inner.success_count = 0;
                self.set_state_gauge(CircuitState::HalfOpen);
                info!("Circuit breaker '{}' probing (half-open)", self.name);
            } else {
                let retry_after = self.config.timeout - elapsed;
                self.metrics
                    .circuit_breaker_rejections
                    .with_label_values(&[&self.name])
                    .inc();
                return Err(BridgeError::CircuitOpen {
                    name: self.name.clone(),
                    retry_after_secs: retry_after.as_secs().max(1),
                });
            }
        }
        Ok(())
    }

    /// Record a successful call
    pub fn on_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.failure_window.clear();
                    inner.opened_at = None;
                    self.set_state_gauge(CircuitState::Closed);
                    info!("Circuit breaker '{}' closed (dependency recovered)", self.name);
                }
            }
            CircuitState::Closed => {
                // A success decays the failure counter
                inner.failure_count = inner.failure_count.saturating_sub(1);
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call
    pub fn on_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.failure_count += 1;
        inner.failure_window.push_back(Instant::now());
        inner.prune_window(self.config.window);

        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.success_count = 0;
                self.set_state_gauge(CircuitState::Open);
                warn!("Circuit breaker '{}' reopened (probe failed)", self.name);
            }
            CircuitState::Closed => {
                let failures_in_window = inner.failure_window.len();
                if failures_in_window >= self.config.failure_threshold as usize {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    self.set_state_gauge(CircuitState::Open);
                    warn!(
                        "Circuit breaker '{}' OPEN ({} failures in {:?})",
                        self.name, failures_in_window, self.config.window
                    );
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Run a guarded call, recording the outcome
    pub async fn call<F, Fut, T>(&self, f: F) -> BridgeResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = BridgeResult<T>>,
    {
        self.guard()?;
        match f().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(e)
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("breaker lock poisoned").state
    }

    pub fn status(&self) -> CircuitBreakerStatus {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.prune_window(self.config.window);
        let time_until_retry_secs = match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at)) => Some(
                self.config
                    .timeout
                    .saturating_sub(opened_at.elapsed())
                    .as_secs(),
            ),
            _ => None,
        };
        CircuitBreakerStatus {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            failures_in_window: inner.failure_window.len(),
            success_count: inner.success_count,
            time_until_retry_secs,
        }
    }

    /// Manual operator reset back to closed
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        *inner = BreakerInner::new();
        self.set_state_gauge(CircuitState::Closed);
        info!("Circuit breaker '{}' reset manually", self.name);
    }

    fn set_state_gauge(&self, state: CircuitState) {
        self.metrics
            .circuit_breaker_state
            .with_label_values(&[&self.name])
            .set(state_gauge_value(state));
    }
}

/// Creates and hands out breakers by dependency name.
///
/// One breaker per named dependency (e.g. `rpc:ethereum`), created on
/// first use. Explicitly constructed and injected; there is no global
/// registry.
#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    config: CircuitBreakerConfig,
    metrics: Arc<BridgeMetrics>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig, metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            config,
            metrics,
        }
    }

    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        {
            let breakers = self.breakers.read().expect("registry lock poisoned");
            if let Some(breaker) = breakers.get(name) {
                return breaker.clone();
            }
        }
        let mut breakers = self.breakers.write().expect("registry lock poisoned");
        breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    name,
                    self.config.clone(),
                    self.metrics.clone(),
                ))
            })
            .clone()
    }

    /// Status of one breaker, or all of them
    pub fn statuses(&self, name: Option<&str>) -> Vec<CircuitBreakerStatus> {
        let breakers = self.breakers.read().expect("registry lock poisoned");
        match name {
            Some(name) => breakers.get(name).map(|b| b.status()).into_iter().collect(),
            None => {
                let mut statuses: Vec<_> = breakers.values().map(|b| b.status()).collect();
                statuses.sort_by(|a, b| a.name.cmp(&b.name));
                statuses
            }
        }
    }

    pub fn reset_all(&self) {
        let breakers = self.breakers.read().expect("registry lock poisoned");
        for breaker in breakers.values() {
            breaker.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_breaker(timeout_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "rpc:test",
            CircuitBreakerConfig {
                failure_threshold: 5,
                success_threshold: 2,
                timeout: Duration::from_millis(timeout_ms),
                window: Duration::from_secs(300),
            },
            Arc::new(BridgeMetrics::new_for_testing()),
        )
    }

    #[tokio::test]
    async fn test_opens_after_failure_threshold() {
        let breaker = test_breaker(60_000);

        for _ in 0..4 {
            breaker.on_failure();
            assert_eq!(breaker.state(), CircuitState::Closed);
        }
        breaker.on_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_open_rejects_without_invoking() {
        let breaker = test_breaker(60_000);
        for _ in 0..5 {
            breaker.on_failure();
        }

        let invoked = AtomicUsize::new(0);
        let result = breaker
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, BridgeError>(())
            })
            .await;

        assert!(matches!(result, Err(BridgeError::CircuitOpen { .. })));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_half_open_after_timeout_then_closes() {
        let breaker = test_breaker(20);
        for _ in 0..5 {
            breaker.on_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;

        // First call after cooldown goes through as a probe
        breaker
            .call(|| async { Ok::<_, BridgeError>(()) })
            .await
            .unwrap();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // Second consecutive success closes the circuit
        breaker
            .call(|| async { Ok::<_, BridgeError>(()) })
            .await
            .unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let breaker = test_breaker(20);
        for _ in 0..5 {
            breaker.on_failure();
        }
        tokio::time::sleep(Duration::from_millis(30)).await;

        let result = breaker
            .call(|| async {
                Err::<(), _>(BridgeError::TransientProviderError("still down".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(breaker.state(), CircuitState::Open);

        // And the cooldown restarted
        let status = breaker.status();
        assert!(status.time_until_retry_secs.is_some());
    }

    #[tokio::test]
    async fn test_success_decays_failure_count() {
        let breaker = test_breaker(60_000);

        breaker.on_failure();
        breaker.on_failure();
        assert_eq!(breaker.status().failure_count, 2);

        breaker.on_success();
        assert_eq!(breaker.status().failure_count, 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_manual_reset() {
        let breaker = test_breaker(60_000);
        for _ in 0..5 {
            breaker.on_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.status().failures_in_window, 0);
    }

    #[tokio::test]
    async fn test_registry_creates_on_demand() {
        let registry = BreakerRegistry::new(
            CircuitBreakerConfig::default(),
            Arc::new(BridgeMetrics::new_for_testing()),
        );

        let a = registry.get_or_create("rpc:ethereum");
        let b = registry.get_or_create("rpc:ethereum");
        assert!(Arc::ptr_eq(&a, &b));

        registry.get_or_create("rpc:bitcoin");
        let statuses = registry.statuses(None);
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].name, "rpc:bitcoin");

        let one = registry.statuses(Some("rpc:ethereum"));
        assert_eq!(one.len(), 1);
        assert!(registry.statuses(Some("rpc:near")).is_empty());
    }
}
