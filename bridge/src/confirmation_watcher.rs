// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-chain confirmation watcher
//!
//! Polls a chain client (through the chain's circuit breaker) until a
//! transaction reaches the required confirmation depth, the wait budget
//! runs out, or the transaction turns out to have failed. Suspends only
//! the calling transfer's task, never the process.

use crate::chain_client::ChainClient;
use crate::circuit_breaker::CircuitBreaker;
use crate::error::{BridgeError, BridgeResult};
use crate::metrics::BridgeMetrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a confirmation wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Required depth reached; carries the observed confirmation count
    Confirmed(u64),
    /// Wait budget elapsed; carries the confirmations observed so far.
    /// A timeout is a distinct outcome the caller must branch on, not an
    /// error.
    TimedOut(u64),
    /// The transaction was found but failed/reverted
    TxFailed,
}

#[derive(Debug)]
pub struct ConfirmationWatcher {
    metrics: Arc<BridgeMetrics>,
}

impl ConfirmationWatcher {
    pub fn new(metrics: Arc<BridgeMetrics>) -> Self {
        Self { metrics }
    }

    /// Wait until `tx_ref` on the client's chain reaches
    /// `min_confirmations`.
    ///
    /// "Transaction not yet visible" (still in a mempool) and transient
    /// provider errors are retryable states; the breaker keeps a dead
    /// endpoint from being hammered, and an open breaker surfaces as a
    /// timeout once `max_wait` elapses. Cancellation returns `Cancelled`
    /// without any side effects.
    pub async fn await_confirmations(
        &self,
        client: &dyn ChainClient,
        breaker: &CircuitBreaker,
        tx_ref: &str,
        min_confirmations: u64,
        max_wait: Duration,
        poll_interval: Duration,
        cancel: &CancellationToken,
    ) -> BridgeResult<WatchOutcome> {
        let chain = client.chain();
        let started = Instant::now();
        let mut last_confirmations = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(BridgeError::Cancelled);
            }

            match breaker.call(|| client.get_status(tx_ref)).await {
                Ok(report) => {
                    self.metrics
                        .chain_rpc_queries
                        .with_label_values(&[chain.as_str(), "get_status"])
                        .inc();
                    self.metrics
                        .watcher_polls
                        .with_label_values(&[chain.as_str()])
                        .inc();
                    if report.found {
                        last_confirmations = report.confirmations;
                        // A transaction that made it into a block but did not
                        // succeed will never become good; stop waiting.
                        if !report.success && report.confirmations > 0 {
                            warn!(
                                "[Watcher] Transaction {} on {} failed on-chain at {} confirmations",
                                tx_ref, chain, report.confirmations
                            );
                            return Ok(WatchOutcome::TxFailed);
                        }
                        if report.confirmations >= min_confirmations {
                            debug!(
                                "[Watcher] Transaction {} on {} confirmed ({}/{})",
                                tx_ref, chain, report.confirmations, min_confirmations
                            );
                            return Ok(WatchOutcome::Confirmed(report.confirmations));
                        }
                    } else {
                        debug!(
                            "[Watcher] Transaction {} not yet visible on {}",
                            tx_ref, chain
                        );
                    }
                }
                // An open breaker never reached the dependency; only real
                // calls count as queries
                Err(BridgeError::CircuitOpen { .. }) => {
                    debug!("[Watcher] Poll for {} on {} skipped, breaker open", tx_ref, chain);
                }
                Err(e) => {
                    // Transient as far as the watcher is concerned; a dead
                    // endpoint runs the wait budget down to a timeout.
                    self.metrics
                        .chain_rpc_queries
                        .with_label_values(&[chain.as_str(), "get_status"])
                        .inc();
                    self.metrics
                        .chain_rpc_errors
                        .with_label_values(&[chain.as_str(), "get_status"])
                        .inc();
                    debug!("[Watcher] Poll for {} on {} failed: {}", tx_ref, chain, e);
                }
            }

            if started.elapsed() + poll_interval > max_wait {
                self.metrics
                    .watcher_timeouts
                    .with_label_values(&[chain.as_str()])
                    .inc();
                warn!(
                    "[Watcher] Gave up on {} on {} after {:?} at {}/{} confirmations",
                    tx_ref,
                    chain,
                    started.elapsed(),
                    last_confirmations,
                    min_confirmations
                );
                return Ok(WatchOutcome::TimedOut(last_confirmations));
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(BridgeError::Cancelled),
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use crate::mock_chain_client::MockChainClient;
    use crate::types::{ChainId, TxStatusReport};

    fn watcher_fixture() -> (ConfirmationWatcher, CircuitBreaker) {
        let metrics = Arc::new(BridgeMetrics::new_for_testing());
        let watcher = ConfirmationWatcher::new(metrics.clone());
        let breaker = CircuitBreaker::new("rpc:test", CircuitBreakerConfig::default(), metrics);
        (watcher, breaker)
    }

    #[tokio::test]
    async fn test_confirms_on_fourth_poll_not_earlier() {
        let (watcher, breaker) = watcher_fixture();
        let client = MockChainClient::new(ChainId::Bitcoin).with_status_script(vec![
            TxStatusReport::confirmed(0),
            TxStatusReport::confirmed(0),
            TxStatusReport::confirmed(1),
            TxStatusReport::confirmed(6),
            TxStatusReport::confirmed(6),
        ]);

        let outcome = watcher
            .await_confirmations(
                &client,
                &breaker,
                "txid",
                6,
                Duration::from_secs(5),
                Duration::from_millis(5),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, WatchOutcome::Confirmed(6));
        assert_eq!(client.status_calls(), 4);
    }

    #[tokio::test]
    async fn test_not_yet_visible_is_transient() {
        let (watcher, breaker) = watcher_fixture();
        let client = MockChainClient::new(ChainId::Ethereum).with_status_script(vec![
            TxStatusReport::not_found(),
            TxStatusReport::not_found(),
            TxStatusReport::confirmed(12),
        ]);

        let outcome = watcher
            .await_confirmations(
                &client,
                &breaker,
                "0xabc",
                12,
                Duration::from_secs(5),
                Duration::from_millis(5),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, WatchOutcome::Confirmed(12));
    }

    #[tokio::test]
    async fn test_failed_transaction_stops_immediately() {
        let (watcher, breaker) = watcher_fixture();
        let client = MockChainClient::new(ChainId::Polygon).with_status_script(vec![
            TxStatusReport::confirmed(1),
            TxStatusReport::reverted(3),
            TxStatusReport::confirmed(12),
        ]);

        let outcome = watcher
            .await_confirmations(
                &client,
                &breaker,
                "0xdead",
                12,
                Duration::from_secs(5),
                Duration::from_millis(5),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, WatchOutcome::TxFailed);
        // The confirmed(12) entry was never reached
        assert_eq!(client.status_calls(), 2);
    }

    #[tokio::test]
    async fn test_timeout_is_an_outcome_not_an_error() {
        let (watcher, breaker) = watcher_fixture();
        let client = MockChainClient::new(ChainId::Bitcoin)
            .with_status_script(vec![TxStatusReport::confirmed(1)]);

        let outcome = watcher
            .await_confirmations(
                &client,
                &breaker,
                "txid",
                6,
                Duration::from_millis(40),
                Duration::from_millis(10),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, WatchOutcome::TimedOut(1));
    }

    #[tokio::test]
    async fn test_cancellation() {
        let (watcher, breaker) = watcher_fixture();
        let client = MockChainClient::new(ChainId::Bitcoin)
            .with_status_script(vec![TxStatusReport::confirmed(0)]);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = watcher
            .await_confirmations(
                &client,
                &breaker,
                "txid",
                6,
                Duration::from_secs(60),
                Duration::from_millis(10),
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(BridgeError::Cancelled)));
    }

    #[tokio::test]
    async fn test_open_breaker_runs_down_to_timeout() {
        let metrics = Arc::new(BridgeMetrics::new_for_testing());
        let watcher = ConfirmationWatcher::new(metrics.clone());
        let breaker = CircuitBreaker::new(
            "rpc:test",
            CircuitBreakerConfig {
                failure_threshold: 1,
                ..CircuitBreakerConfig::default()
            },
            metrics,
        );
        breaker.on_failure();

        let client = MockChainClient::new(ChainId::Bsc)
            .with_status_script(vec![TxStatusReport::confirmed(12)]);

        let outcome = watcher
            .await_confirmations(
                &client,
                &breaker,
                "0xabc",
                12,
                Duration::from_millis(30),
                Duration::from_millis(10),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        // Breaker rejected every poll; the dependency was never touched
        assert_eq!(outcome, WatchOutcome::TimedOut(0));
        assert_eq!(client.status_calls(), 0);
    }
}
