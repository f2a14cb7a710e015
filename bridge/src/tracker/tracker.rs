// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Transaction tracker implementation

use super::types::*;
use crate::metrics::BridgeMetrics;
use crate::types::{now_ms, ChainId};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Callback invoked on every state change of a subscribed transaction.
/// Callbacks run after the tracker's locks are released and must not block.
pub type StatusCallback = Arc<dyn Fn(TrackedTransaction) + Send + Sync>;

/// Bounded diagnostics history
const HISTORY_CAPACITY: usize = 10_000;

/// Fallback completion estimate before any transfer has confirmed
const DEFAULT_AVG_COMPLETION_SECS: f64 = 60.0;

pub struct TransactionTracker {
    transactions: RwLock<HashMap<String, TrackedTransaction>>,
    history: RwLock<VecDeque<HistoryEntry>>,
    subscribers: RwLock<HashMap<String, Vec<StatusCallback>>>,
    chain_stats: RwLock<HashMap<ChainId, ChainStats>>,
    metrics: Arc<BridgeMetrics>,
}

impl TransactionTracker {
    pub fn new(metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            transactions: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            subscribers: RwLock::new(HashMap::new()),
            chain_stats: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// Register a new transfer for tracking. Starts in `Pending`.
    pub async fn create(
        &self,
        tx_id: impl Into<String>,
        source_chain: ChainId,
        target_chain: ChainId,
        amount: u64,
        asset: impl Into<String>,
        required_confirmations: u64,
    ) -> TrackedTransaction {
        let tx_id = tx_id.into();
        let now = now_ms();
        let state = TrackedTransaction {
            tx_id: tx_id.clone(),
            source_chain,
            target_chain,
            amount,
            asset: asset.into(),
            status: TransactionStatus::Pending,
            source_tx_ref: None,
            target_tx_ref: None,
            confirmations: 0,
            required_confirmations,
            created_at_ms: now,
            updated_at_ms: now,
            estimated_completion_ms: None,
            error: None,
        };

        {
            let mut transactions = self.transactions.write().await;
            transactions.insert(tx_id.clone(), state.clone());
        }
        {
            let mut stats = self.chain_stats.write().await;
            let entry = stats.entry(source_chain).or_default();
            entry.total += 1;
            entry.pending += 1;
        }
        self.log_event(&state, "created").await;
        debug!(
            "[TransactionTracker] Created {}: {} -> {}",
            tx_id, source_chain, target_chain
        );
        state
    }

    /// Apply a status update. Returns `false` for unknown ids and for
    /// illegal transitions, which are rejected with a warning.
    pub async fn update_status(
        &self,
        tx_id: &str,
        status: TransactionStatus,
        patch: StatusPatch,
    ) -> bool {
        let updated = {
            let mut transactions = self.transactions.write().await;
            let Some(state) = transactions.get_mut(tx_id) else {
                warn!("[TransactionTracker] Update for unknown transaction {}", tx_id);
                return false;
            };

            let old_status = state.status;
            if !old_status.can_transition_to(status) {
                warn!(
                    "[TransactionTracker] Rejected illegal transition {} -> {} for {}",
                    old_status, status, tx_id
                );
                return false;
            }

            state.status = status;
            state.updated_at_ms = now_ms();
            if let Some(tx_ref) = patch.source_tx_ref {
                state.source_tx_ref = Some(tx_ref);
            }
            if let Some(tx_ref) = patch.target_tx_ref {
                state.target_tx_ref = Some(tx_ref);
            }
            if let Some(confirmations) = patch.confirmations {
                state.confirmations = confirmations;
            }
            if let Some(error) = patch.error {
                state.error = Some(error);
            }

            (old_status, state.clone())
        };
        let (old_status, state) = updated;

        self.metrics
            .tracker_status_transitions
            .with_label_values(&[status.as_str()])
            .inc();
        self.update_stats(old_status, &state).await;
        self.log_event(
            &state,
            &format!("status_changed: {} -> {}", old_status, status),
        )
        .await;
        info!(
            "[TransactionTracker] {}: {} -> {} ({}/{} confirmations)",
            state.tx_id, old_status, status, state.confirmations, state.required_confirmations
        );

        self.notify_subscribers(&state).await;
        true
    }

    /// Move any non-terminal transaction to `Cancelled` (operator action)
    pub async fn cancel(&self, tx_id: &str) -> bool {
        self.update_status(tx_id, TransactionStatus::Cancelled, StatusPatch::default())
            .await
    }

    /// Subscribe to state changes of one transaction
    pub async fn subscribe(&self, tx_id: &str, callback: StatusCallback) {
        let mut subscribers = self.subscribers.write().await;
        subscribers
            .entry(tx_id.to_string())
            .or_default()
            .push(callback);
    }

    async fn notify_subscribers(&self, state: &TrackedTransaction) {
        // Clone the callback list so no tracker lock is held while
        // subscriber code runs.
        let callbacks: Vec<StatusCallback> = {
            let subscribers = self.subscribers.read().await;
            match subscribers.get(&state.tx_id) {
                Some(callbacks) => callbacks.clone(),
                None => return,
            }
        };
        for callback in callbacks {
            callback(state.clone());
        }
    }

    pub async fn get(&self, tx_id: &str) -> Option<TrackedTransaction> {
        let transactions = self.transactions.read().await;
        transactions.get(tx_id).cloned()
    }

    /// Progress estimate for UI consumption, 0..=100.
    ///
    /// Non-decreasing for a given transfer until it fails or is cancelled.
    pub async fn progress_percent(&self, tx_id: &str) -> Option<f64> {
        let transactions = self.transactions.read().await;
        let state = transactions.get(tx_id)?;
        Some(Self::progress_of(state))
    }

    fn progress_of(state: &TrackedTransaction) -> f64 {
        match state.status {
            TransactionStatus::Pending => 10.0,
            TransactionStatus::Broadcasted => {
                if state.required_confirmations > 0 {
                    let ratio = (state.confirmations as f64
                        / state.required_confirmations as f64)
                        .min(1.0);
                    30.0 + ratio * 50.0
                } else {
                    50.0
                }
            }
            TransactionStatus::Confirmed => 90.0,
            TransactionStatus::Finalized => 100.0,
            TransactionStatus::Failed | TransactionStatus::Cancelled => 0.0,
        }
    }

    pub async fn status_summary(&self, tx_id: &str) -> Option<StatusSummary> {
        let transactions = self.transactions.read().await;
        let state = transactions.get(tx_id)?;
        Some(StatusSummary {
            tx_id: state.tx_id.clone(),
            status: state.status,
            progress_percent: Self::progress_of(state),
            elapsed_secs: (now_ms().saturating_sub(state.created_at_ms)) as f64 / 1000.0,
            confirmations: state.confirmations,
            required_confirmations: state.required_confirmations,
            source_tx_ref: state.source_tx_ref.clone(),
            target_tx_ref: state.target_tx_ref.clone(),
            estimated_completion_ms: state.estimated_completion_ms,
            error: state.error.clone(),
        })
    }

    pub async fn chain_statistics(&self, chain: ChainId) -> ChainStats {
        let stats = self.chain_stats.read().await;
        stats.get(&chain).cloned().unwrap_or_default()
    }

    /// Most recent history entries, newest last
    pub async fn recent_history(&self, limit: usize) -> Vec<HistoryEntry> {
        let history = self.history.read().await;
        history
            .iter()
            .skip(history.len().saturating_sub(limit))
            .cloned()
            .collect()
    }

    pub async fn tracked_count(&self) -> usize {
        let transactions = self.transactions.read().await;
        transactions.len()
    }

    async fn update_stats(&self, old_status: TransactionStatus, state: &TrackedTransaction) {
        let mut stats = self.chain_stats.write().await;
        let entry = stats.entry(state.source_chain).or_default();

        match old_status {
            TransactionStatus::Pending => entry.pending = entry.pending.saturating_sub(1),
            TransactionStatus::Confirmed => entry.confirmed = entry.confirmed.saturating_sub(1),
            TransactionStatus::Failed => entry.failed = entry.failed.saturating_sub(1),
            _ => {}
        }
        match state.status {
            TransactionStatus::Pending => entry.pending += 1,
            TransactionStatus::Confirmed => {
                entry.confirmed += 1;
                let elapsed_secs =
                    (state.updated_at_ms.saturating_sub(state.created_at_ms)) as f64 / 1000.0;
                if entry.avg_completion_secs == 0.0 {
                    entry.avg_completion_secs = elapsed_secs;
                } else {
                    entry.avg_completion_secs =
                        entry.avg_completion_secs * 0.9 + elapsed_secs * 0.1;
                }
            }
            TransactionStatus::Failed => entry.failed += 1,
            _ => {}
        }

        // Completion estimate for newly broadcasted transfers
        if state.status == TransactionStatus::Broadcasted {
            let avg = if entry.avg_completion_secs > 0.0 {
                entry.avg_completion_secs
            } else {
                DEFAULT_AVG_COMPLETION_SECS
            };
            drop(stats);
            let mut transactions = self.transactions.write().await;
            if let Some(tracked) = transactions.get_mut(&state.tx_id) {
                tracked.estimated_completion_ms = Some(now_ms() + (avg * 1000.0) as u64);
            }
        }
    }

    async fn log_event(&self, state: &TrackedTransaction, event: &str) {
        let mut history = self.history.write().await;
        if history.len() == HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(HistoryEntry {
            timestamp_ms: now_ms(),
            tx_id: state.tx_id.clone(),
            event: event.to_string(),
            status: state.status,
            confirmations: state.confirmations,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_tracker() -> TransactionTracker {
        TransactionTracker::new(Arc::new(BridgeMetrics::new_for_testing()))
    }

    #[tokio::test]
    async fn test_create_and_happy_path() {
        let tracker = test_tracker();
        tracker
            .create("t1", ChainId::Polygon, ChainId::Bitcoin, 100, "MATIC", 6)
            .await;

        assert!(
            tracker
                .update_status(
                    "t1",
                    TransactionStatus::Broadcasted,
                    StatusPatch::source_ref("0xlock"),
                )
                .await
        );
        assert!(
            tracker
                .update_status(
                    "t1",
                    TransactionStatus::Confirmed,
                    StatusPatch::target_ref("btc-tx-0"),
                )
                .await
        );
        assert!(
            tracker
                .update_status("t1", TransactionStatus::Finalized, StatusPatch::default())
                .await
        );

        let state = tracker.get("t1").await.unwrap();
        assert_eq!(state.status, TransactionStatus::Finalized);
        assert_eq!(state.source_tx_ref.as_deref(), Some("0xlock"));
        assert_eq!(state.target_tx_ref.as_deref(), Some("btc-tx-0"));
    }

    #[tokio::test]
    async fn test_illegal_transition_rejected() {
        let tracker = test_tracker();
        tracker
            .create("t1", ChainId::Ethereum, ChainId::Bsc, 50, "ETH", 12)
            .await;

        // Pending cannot jump straight to Confirmed
        assert!(
            !tracker
                .update_status("t1", TransactionStatus::Confirmed, StatusPatch::default())
                .await
        );
        assert_eq!(
            tracker.get("t1").await.unwrap().status,
            TransactionStatus::Pending
        );

        // And a finalized transfer can never go back
        tracker
            .update_status("t1", TransactionStatus::Broadcasted, StatusPatch::default())
            .await;
        tracker
            .update_status("t1", TransactionStatus::Confirmed, StatusPatch::default())
            .await;
        tracker
            .update_status("t1", TransactionStatus::Finalized, StatusPatch::default())
            .await;
        assert!(
            !tracker
                .update_status("t1", TransactionStatus::Broadcasted, StatusPatch::default())
                .await
        );
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let tracker = test_tracker();
        assert!(
            !tracker
                .update_status("ghost", TransactionStatus::Broadcasted, StatusPatch::default())
                .await
        );
    }

    #[tokio::test]
    async fn test_progress_is_monotone_until_terminal() {
        let tracker = test_tracker();
        tracker
            .create("t1", ChainId::Bitcoin, ChainId::Ethereum, 10, "BTC", 6)
            .await;

        let mut last = tracker.progress_percent("t1").await.unwrap();
        assert_eq!(last, 10.0);

        tracker
            .update_status("t1", TransactionStatus::Broadcasted, StatusPatch::default())
            .await;
        for confirmations in [1, 2, 4, 6] {
            tracker
                .update_status(
                    "t1",
                    TransactionStatus::Broadcasted,
                    StatusPatch::confirmations(confirmations),
                )
                .await;
            let progress = tracker.progress_percent("t1").await.unwrap();
            assert!(
                progress >= last,
                "progress regressed: {} < {}",
                progress,
                last
            );
            last = progress;
        }
        // 6/6 confirmations caps the broadcast band at 80
        assert_eq!(last, 80.0);

        tracker
            .update_status("t1", TransactionStatus::Confirmed, StatusPatch::default())
            .await;
        assert_eq!(tracker.progress_percent("t1").await.unwrap(), 90.0);

        tracker
            .update_status("t1", TransactionStatus::Finalized, StatusPatch::default())
            .await;
        assert_eq!(tracker.progress_percent("t1").await.unwrap(), 100.0);
    }

    #[tokio::test]
    async fn test_failed_resets_progress() {
        let tracker = test_tracker();
        tracker
            .create("t1", ChainId::Bsc, ChainId::Polygon, 10, "BNB", 12)
            .await;
        tracker
            .update_status("t1", TransactionStatus::Broadcasted, StatusPatch::default())
            .await;
        tracker
            .update_status(
                "t1",
                TransactionStatus::Failed,
                StatusPatch::error("lock reverted"),
            )
            .await;

        assert_eq!(tracker.progress_percent("t1").await.unwrap(), 0.0);
        let state = tracker.get("t1").await.unwrap();
        assert_eq!(state.error.as_deref(), Some("lock reverted"));
    }

    #[tokio::test]
    async fn test_subscribers_notified_on_every_change() {
        let tracker = test_tracker();
        tracker
            .create("t1", ChainId::Solana, ChainId::Ethereum, 10, "SOL", 1)
            .await;

        let notified = Arc::new(AtomicU32::new(0));
        let notified_clone = notified.clone();
        tracker
            .subscribe(
                "t1",
                Arc::new(move |state| {
                    assert_eq!(state.tx_id, "t1");
                    notified_clone.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;

        tracker
            .update_status("t1", TransactionStatus::Broadcasted, StatusPatch::default())
            .await;
        tracker
            .update_status("t1", TransactionStatus::Confirmed, StatusPatch::default())
            .await;
        assert_eq!(notified.load(Ordering::SeqCst), 2);

        // Rejected updates do not notify
        tracker
            .update_status("t1", TransactionStatus::Broadcasted, StatusPatch::default())
            .await;
        assert_eq!(notified.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancel_non_terminal_only() {
        let tracker = test_tracker();
        tracker
            .create("t1", ChainId::Bitcoin, ChainId::Bsc, 10, "BTC", 6)
            .await;
        assert!(tracker.cancel("t1").await);
        assert_eq!(
            tracker.get("t1").await.unwrap().status,
            TransactionStatus::Cancelled
        );

        // Cancelling twice is rejected (already terminal)
        assert!(!tracker.cancel("t1").await);
    }

    #[tokio::test]
    async fn test_chain_statistics() {
        let tracker = test_tracker();
        for i in 0..3 {
            tracker
                .create(
                    format!("t{}", i),
                    ChainId::Polygon,
                    ChainId::Bitcoin,
                    10,
                    "MATIC",
                    6,
                )
                .await;
        }

        let stats = tracker.chain_statistics(ChainId::Polygon).await;
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 3);

        tracker
            .update_status("t0", TransactionStatus::Broadcasted, StatusPatch::default())
            .await;
        tracker
            .update_status("t0", TransactionStatus::Confirmed, StatusPatch::default())
            .await;

        let stats = tracker.chain_statistics(ChainId::Polygon).await;
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.confirmed, 1);
        assert!(stats.avg_completion_secs >= 0.0);
    }

    #[tokio::test]
    async fn test_history_is_bounded_and_ordered() {
        let tracker = test_tracker();
        tracker
            .create("t1", ChainId::Ethereum, ChainId::Bitcoin, 10, "ETH", 12)
            .await;
        tracker
            .update_status("t1", TransactionStatus::Broadcasted, StatusPatch::default())
            .await;

        let history = tracker.recent_history(10).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].event, "created");
        assert!(history[1].event.contains("pending -> broadcasted"));

        let limited = tracker.recent_history(1).await;
        assert_eq!(limited.len(), 1);
        assert!(limited[0].event.contains("broadcasted"));
    }

    #[tokio::test]
    async fn test_estimated_completion_set_on_broadcast() {
        let tracker = test_tracker();
        tracker
            .create("t1", ChainId::Bitcoin, ChainId::Ethereum, 10, "BTC", 6)
            .await;
        assert!(tracker.get("t1").await.unwrap().estimated_completion_ms.is_none());

        tracker
            .update_status("t1", TransactionStatus::Broadcasted, StatusPatch::default())
            .await;
        let state = tracker.get("t1").await.unwrap();
        assert!(state.estimated_completion_ms.unwrap() > state.created_at_ms);
    }
}
