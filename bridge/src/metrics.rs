// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_gauge_vec_with_registry, register_int_gauge_with_registry, HistogramVec,
    IntCounterVec, IntGauge, IntGaugeVec, Registry,
};

const TRANSFER_LATENCY_SEC_BUCKETS: &[f64] = &[
    0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10., 20., 30., 60., 120., 300., 600., 1200., 1800.,
    3600.,
];

#[derive(Clone, Debug)]
pub struct BridgeMetrics {
    pub(crate) transfers_started: IntCounterVec,
    pub(crate) transfers_succeeded: IntCounterVec,
    pub(crate) transfers_failed: IntCounterVec,
    pub(crate) transfer_latency: HistogramVec,

    pub(crate) chain_rpc_queries: IntCounterVec,
    pub(crate) chain_rpc_errors: IntCounterVec,

    pub(crate) circuit_breaker_state: IntGaugeVec,
    pub(crate) circuit_breaker_rejections: IntCounterVec,

    pub(crate) reserve_available: IntGaugeVec,
    pub(crate) reserve_debits: IntCounterVec,
    pub(crate) reserve_credits: IntCounterVec,

    pub(crate) watcher_polls: IntCounterVec,
    pub(crate) watcher_timeouts: IntCounterVec,

    pub(crate) tracker_status_transitions: IntCounterVec,
    pub(crate) oracle_price_fallbacks: IntCounterVec,

    pub(crate) server_uptime_seconds: IntGauge,
}

impl BridgeMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            transfers_started: register_int_counter_vec_with_registry!(
                "bridge_transfers_started",
                "Total transfers started, by route",
                &["source_chain", "target_chain"],
                registry,
            )
            .unwrap(),
            transfers_succeeded: register_int_counter_vec_with_registry!(
                "bridge_transfers_succeeded",
                "Total transfers finalized, by route",
                &["source_chain", "target_chain"],
                registry,
            )
            .unwrap(),
            transfers_failed: register_int_counter_vec_with_registry!(
                "bridge_transfers_failed",
                "Total transfers that terminated with an error, by error type",
                &["error_type"],
                registry,
            )
            .unwrap(),
            transfer_latency: register_histogram_vec_with_registry!(
                "bridge_transfer_latency_seconds",
                "End-to-end transfer latency, by route",
                &["source_chain", "target_chain"],
                TRANSFER_LATENCY_SEC_BUCKETS.to_vec(),
                registry,
            )
            .unwrap(),
            chain_rpc_queries: register_int_counter_vec_with_registry!(
                "bridge_chain_rpc_queries",
                "Total chain client calls, by chain and method",
                &["chain", "method"],
                registry,
            )
            .unwrap(),
            chain_rpc_errors: register_int_counter_vec_with_registry!(
                "bridge_chain_rpc_errors",
                "Total chain client call errors, by chain and method",
                &["chain", "method"],
                registry,
            )
            .unwrap(),
            circuit_breaker_state: register_int_gauge_vec_with_registry!(
                "bridge_circuit_breaker_state",
                "Breaker state by name (0=closed, 1=half-open, 2=open)",
                &["name"],
                registry,
            )
            .unwrap(),
            circuit_breaker_rejections: register_int_counter_vec_with_registry!(
                "bridge_circuit_breaker_rejections",
                "Calls rejected without invoking the dependency, by breaker name",
                &["name"],
                registry,
            )
            .unwrap(),
            reserve_available: register_int_gauge_vec_with_registry!(
                "bridge_reserve_available",
                "Available liquidity in bridge units, by chain and asset",
                &["chain", "asset"],
                registry,
            )
            .unwrap(),
            reserve_debits: register_int_counter_vec_with_registry!(
                "bridge_reserve_debits",
                "Total reserve debits, by chain and asset",
                &["chain", "asset"],
                registry,
            )
            .unwrap(),
            reserve_credits: register_int_counter_vec_with_registry!(
                "bridge_reserve_credits",
                "Total reserve credits, by chain and asset",
                &["chain", "asset"],
                registry,
            )
            .unwrap(),
            watcher_polls: register_int_counter_vec_with_registry!(
                "bridge_watcher_polls",
                "Confirmation watcher polls, by chain",
                &["chain"],
                registry,
            )
            .unwrap(),
            watcher_timeouts: register_int_counter_vec_with_registry!(
                "bridge_watcher_timeouts",
                "Confirmation waits that expired, by chain",
                &["chain"],
                registry,
            )
            .unwrap(),
            tracker_status_transitions: register_int_counter_vec_with_registry!(
                "bridge_tracker_status_transitions",
                "Tracked transaction status transitions, by new status",
                &["status"],
                registry,
            )
            .unwrap(),
            oracle_price_fallbacks: register_int_counter_vec_with_registry!(
                "bridge_oracle_price_fallbacks",
                "Conversions served from the static fallback table, by asset",
                &["asset"],
                registry,
            )
            .unwrap(),
            server_uptime_seconds: register_int_gauge_with_registry!(
                "bridge_server_uptime_seconds",
                "Seconds since the bridge node started",
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_testing() -> Self {
        Self::new(&Registry::new())
    }
}
