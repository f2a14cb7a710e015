// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

//! USD-denominated exchange rates
//!
//! Conversion between source and target assets goes through USD prices
//! from a live oracle, cached on a TTL. When the live source is
//! unavailable the static fallback table keeps conversions working at
//! last-known-reasonable prices.

use crate::error::{BridgeError, BridgeResult};
use crate::metrics::BridgeMetrics;
use crate::ttl_cache::TtlCache;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;

/// Static USD prices used when the live source is unavailable
pub static FALLBACK_USD_PRICES: Lazy<BTreeMap<&'static str, f64>> = Lazy::new(|| {
    BTreeMap::from([
        ("BTC", 45_000.0),
        ("ETH", 3_000.0),
        ("MATIC", 0.8),
        ("BNB", 350.0),
        ("SOL", 150.0),
        ("USDT", 1.0),
        ("USDC", 1.0),
        ("USD", 1.0),
    ])
});

#[async_trait]
pub trait ExchangeRateOracle: Send + Sync + Debug {
    /// Current USD price of one whole token of `asset`
    async fn price(&self, asset: &str) -> BridgeResult<f64>;
}

/// Fixed price table. Used in tests and air-gapped deployments.
#[derive(Debug, Clone, Default)]
pub struct StaticRateOracle {
    prices: BTreeMap<String, f64>,
}

impl StaticRateOracle {
    pub fn new(prices: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            prices: prices.into_iter().collect(),
        }
    }

    pub fn with_price(mut self, asset: impl Into<String>, price: f64) -> Self {
        self.prices.insert(asset.into(), price);
        self
    }
}

#[async_trait]
impl ExchangeRateOracle for StaticRateOracle {
    async fn price(&self, asset: &str) -> BridgeResult<f64> {
        self.prices
            .get(asset)
            .copied()
            .ok_or_else(|| BridgeError::RateUnavailable(asset.to_string()))
    }
}

/// TTL-cached front for a live oracle, with static fallback.
#[derive(Debug)]
pub struct CachedRateOracle {
    inner: Arc<dyn ExchangeRateOracle>,
    caches: RwLock<HashMap<String, Arc<TtlCache<f64>>>>,
    ttl: Duration,
    metrics: Arc<BridgeMetrics>,
}

impl CachedRateOracle {
    pub fn new(
        inner: Arc<dyn ExchangeRateOracle>,
        ttl: Duration,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            inner,
            caches: RwLock::new(HashMap::new()),
            ttl,
            metrics,
        }
    }

    async fn cache_for(&self, asset: &str) -> Arc<TtlCache<f64>> {
        {
            let caches = self.caches.read().await;
            if let Some(cache) = caches.get(asset) {
                return cache.clone();
            }
        }
        let mut caches = self.caches.write().await;
        caches
            .entry(asset.to_string())
            .or_insert_with(|| Arc::new(TtlCache::new(self.ttl)))
            .clone()
    }

    /// USD price for `asset`: cache, then live source, then fallback table.
    pub async fn price(&self, asset: &str) -> BridgeResult<f64> {
        let cache = self.cache_for(asset).await;
        if let Some(cached) = cache.get_if_valid().await {
            return Ok(cached);
        }

        match self.inner.price(asset).await {
            Ok(price) if price > 0.0 => {
                cache.update(price).await;
                Ok(price)
            }
            Ok(price) => {
                warn!("Oracle returned non-positive price {} for {}", price, asset);
                self.fallback_price(asset)
            }
            Err(e) => {
                warn!("Live price source failed for {}: {}", asset, e);
                self.fallback_price(asset)
            }
        }
    }

    fn fallback_price(&self, asset: &str) -> BridgeResult<f64> {
        match FALLBACK_USD_PRICES.get(asset) {
            Some(price) => {
                self.metrics
                    .oracle_price_fallbacks
                    .with_label_values(&[asset])
                    .inc();
                Ok(*price)
            }
            None => Err(BridgeError::RateUnavailable(asset.to_string())),
        }
    }

    /// Convert `amount` (bridge units of `from`) into units of `to`:
    /// `amount * price(from) / price(to)`, rounded to the nearest unit.
    pub async fn convert(&self, amount: u64, from: &str, to: &str) -> BridgeResult<u64> {
        if from == to {
            return Ok(amount);
        }
        let from_price = self.price(from).await?;
        let to_price = self.price(to).await?;
        if to_price <= 0.0 {
            return Err(BridgeError::RateUnavailable(to.to_string()));
        }
        Ok((amount as f64 * from_price / to_price).round() as u64)
    }
}
