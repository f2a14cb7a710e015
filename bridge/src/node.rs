// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::chain_client::ChainClient;
use crate::config::BridgeNodeConfig;
use crate::metrics::BridgeMetrics;
use crate::oracle::ExchangeRateOracle;
use crate::orchestrator::BridgeOrchestrator;
use crate::types::ChainId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Build and start a bridge node.
///
/// Chain clients (and optionally a live price oracle) are supplied by the
/// embedding application; all core services are constructed here and
/// injected into the orchestrator. The returned handle is the node's
/// public surface: execute_transfer and the status queries hang off it.
pub async fn run_bridge_node(
    config: BridgeNodeConfig,
    clients: HashMap<ChainId, Arc<dyn ChainClient>>,
    live_oracle: Option<Arc<dyn ExchangeRateOracle>>,
    prometheus_registry: prometheus::Registry,
) -> anyhow::Result<Arc<BridgeOrchestrator>> {
    let metrics = Arc::new(BridgeMetrics::new(&prometheus_registry));
    let start_time = std::time::Instant::now();

    // Uptime gauge for dashboards
    let uptime_metrics = metrics.clone();
    tokio::spawn(async move {
        loop {
            uptime_metrics
                .server_uptime_seconds
                .set(start_time.elapsed().as_secs() as i64);
            tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        }
    });

    let orchestrator = Arc::new(config.assemble(clients, live_oracle, metrics).await?);

    info!(
        "Bridge node started: {} chains, {} reserve keys",
        config.chains.len(),
        config.reserves.len()
    );
    Ok(orchestrator)
}
