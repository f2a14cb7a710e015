// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Generic TTL (Time-To-Live) cache for values refreshed from slow sources.
//!
//! Used by the exchange-rate oracle to avoid hammering the price feed on
//! every conversion. Reads of the cached value are lock-free; the RwLock
//! only guards the refresh timestamp.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// A thread-safe TTL cache for atomic-compatible types.
#[derive(Debug)]
pub struct TtlCache<T: AtomicValue> {
    value: T::Atomic,
    last_updated: RwLock<Option<Instant>>,
    cache_duration: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T: AtomicValue> TtlCache<T> {
    pub fn new(cache_duration: Duration) -> Self {
        Self {
            value: T::new_atomic(T::default_value()),
            last_updated: RwLock::new(None),
            cache_duration,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Return the cached value if it has not expired
    pub async fn get_if_valid(&self) -> Option<T> {
        let last_updated = self.last_updated.read().await;
        if let Some(updated_at) = *last_updated {
            if updated_at.elapsed() < self.cache_duration {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(T::load(&self.value));
            }
        }
        None
    }

    /// Store a fresh value and restart the TTL
    pub async fn update(&self, value: T) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        T::store(&self.value, value);
        let mut last_updated = self.last_updated.write().await;
        *last_updated = Some(Instant::now());
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Trait for types that can be stored atomically in the cache.
pub trait AtomicValue: Copy + Send + Sync + 'static {
    type Atomic: Send + Sync;

    fn new_atomic(value: Self) -> Self::Atomic;
    fn load(atomic: &Self::Atomic) -> Self;
    fn store(atomic: &Self::Atomic, value: Self);
    fn default_value() -> Self;
}

// USD prices are f64; stored bit-cast through an AtomicU64.
impl AtomicValue for f64 {
    type Atomic = AtomicU64;

    fn new_atomic(value: Self) -> Self::Atomic {
        AtomicU64::new(value.to_bits())
    }

    fn load(atomic: &Self::Atomic) -> Self {
        f64::from_bits(atomic.load(Ordering::Acquire))
    }

    fn store(atomic: &Self::Atomic, value: Self) {
        atomic.store(value.to_bits(), Ordering::Release);
    }

    fn default_value() -> Self {
        0.0
    }
}
