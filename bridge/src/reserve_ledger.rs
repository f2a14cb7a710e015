// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Destination-side liquidity accounting
//!
//! Tracks available reserves per (chain, asset). The check-then-debit
//! sequence runs in a single critical section under a per-key mutex, so
//! two concurrent transfers can never both observe a sufficient balance
//! and jointly overdraw it. Different keys proceed fully in parallel.

use crate::error::{BridgeError, BridgeResult};
use crate::metrics::BridgeMetrics;
use crate::types::{ChainId, ReserveKey};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Point-in-time reserve view for the operator surface
#[derive(Debug, Clone, Serialize)]
pub struct ReserveStatus {
    pub chain: ChainId,
    pub asset: String,
    pub available: u64,
}

pub struct ReserveLedger {
    /// Outer map is only locked to look up or insert a key; balance
    /// mutations happen under the per-key mutex.
    entries: RwLock<HashMap<ReserveKey, Arc<Mutex<u64>>>>,
    metrics: Arc<BridgeMetrics>,
}

impl ReserveLedger {
    pub fn new(metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// Seed the ledger with pre-funded reserves
    pub async fn with_reserves(
        reserves: impl IntoIterator<Item = (ReserveKey, u64)>,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        let ledger = Self::new(metrics);
        for (key, amount) in reserves {
            ledger.credit(key.chain, &key.asset, amount).await;
        }
        ledger
    }

    async fn entry(&self, key: &ReserveKey) -> Option<Arc<Mutex<u64>>> {
        let entries = self.entries.read().await;
        entries.get(key).cloned()
    }

    async fn ensure_entry(&self, key: &ReserveKey) -> Arc<Mutex<u64>> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key) {
                return entry.clone();
            }
        }
        let mut entries = self.entries.write().await;
        entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(0)))
            .clone()
    }

    /// Non-binding pre-check used before any chain I/O. The balance is
    /// re-checked at debit time.
    pub async fn has_sufficient(&self, chain: ChainId, asset: &str, amount: u64) -> bool {
        let key = ReserveKey::new(chain, asset);
        match self.entry(&key).await {
            Some(entry) => *entry.lock().await >= amount,
            None => false,
        }
    }

    /// Atomically verify and debit. Fails with `InsufficientReserves` if the
    /// balance at debit time no longer covers `amount`.
    pub async fn check_and_debit(
        &self,
        chain: ChainId,
        asset: &str,
        amount: u64,
    ) -> BridgeResult<()> {
        let key = ReserveKey::new(chain, asset);
        let entry = self.entry(&key).await.ok_or(BridgeError::InsufficientReserves {
            chain,
            asset: asset.to_string(),
            requested: amount,
            available: 0,
        })?;

        let mut balance = entry.lock().await;
        if *balance < amount {
            return Err(BridgeError::InsufficientReserves {
                chain,
                asset: asset.to_string(),
                requested: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        self.metrics
            .reserve_debits
            .with_label_values(&[chain.as_str(), asset])
            .inc();
        self.metrics
            .reserve_available
            .with_label_values(&[chain.as_str(), asset])
            .set(*balance as i64);
        debug!(
            "[ReserveLedger] Debited {} from {}: remaining={}",
            amount, key, *balance
        );
        Ok(())
    }

    /// Add liquidity (replenishment or manual compensation)
    pub async fn credit(&self, chain: ChainId, asset: &str, amount: u64) {
        let key = ReserveKey::new(chain, asset);
        let entry = self.ensure_entry(&key).await;
        let mut balance = entry.lock().await;
        *balance = balance.saturating_add(amount);
        self.metrics
            .reserve_credits
            .with_label_values(&[chain.as_str(), asset])
            .inc();
        self.metrics
            .reserve_available
            .with_label_values(&[chain.as_str(), asset])
            .set(*balance as i64);
        info!(
            "[ReserveLedger] Credited {} to {}: available={}",
            amount, key, *balance
        );
    }

    pub async fn available(&self, chain: ChainId, asset: &str) -> u64 {
        let key = ReserveKey::new(chain, asset);
        match self.entry(&key).await {
            Some(entry) => *entry.lock().await,
            None => 0,
        }
    }

    /// Reserve status, optionally restricted to one chain
    pub async fn snapshot(&self, chain: Option<ChainId>) -> Vec<ReserveStatus> {
        let entries = self.entries.read().await;
        let mut statuses = Vec::new();
        for (key, entry) in entries.iter() {
            if let Some(chain) = chain {
                if key.chain != chain {
                    continue;
                }
            }
            statuses.push(ReserveStatus {
                chain: key.chain,
                asset: key.asset.clone(),
                available: *entry.lock().await,
            });
        }
        statuses.sort_by(|a, b| (a.chain.as_str(), &a.asset).cmp(&(b.chain.as_str(), &b.asset)));
        statuses
    }
}
