// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures for orchestrator and end-to-end tests

use crate::chain_client::ChainClient;
use crate::circuit_breaker::{BreakerRegistry, CircuitBreakerConfig};
use crate::metrics::BridgeMetrics;
use crate::mock_chain_client::MockChainClient;
use crate::oracle::{CachedRateOracle, StaticRateOracle};
use crate::orchestrator::{BridgeOrchestrator, OrchestratorConfig};
use crate::reserve_ledger::ReserveLedger;
use crate::settlement::ProofSettlement;
use crate::tracker::TransactionTracker;
use crate::types::{ChainId, ConfirmationPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Best-effort tracing init for tests; repeated calls are fine
pub fn init_tracing_for_testing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Polling with no delay and a small wait budget keeps tests fast
pub fn fast_policy(min_confirmations: u64) -> ConfirmationPolicy {
    ConfirmationPolicy {
        min_confirmations,
        poll_interval_secs: 0,
        max_wait_secs: 2,
    }
}

/// A policy whose wait budget expires on the first poll
pub fn expired_policy(min_confirmations: u64) -> ConfirmationPolicy {
    ConfirmationPolicy {
        min_confirmations,
        poll_interval_secs: 0,
        max_wait_secs: 0,
    }
}

pub struct BridgeFixture {
    pub orchestrator: Arc<BridgeOrchestrator>,
    pub source: Arc<MockChainClient>,
    pub target: Arc<MockChainClient>,
    pub metrics: Arc<BridgeMetrics>,
}

pub struct BridgeFixtureBuilder {
    source: MockChainClient,
    target: MockChainClient,
    reserves: Vec<(ChainId, String, u64)>,
    prices: Vec<(String, f64)>,
    policies: HashMap<ChainId, ConfirmationPolicy>,
    min_viable_amounts: HashMap<ChainId, u64>,
    breaker_config: CircuitBreakerConfig,
    settlement: Option<Arc<dyn ProofSettlement>>,
}

impl BridgeFixtureBuilder {
    pub fn new(source: MockChainClient, target: MockChainClient) -> Self {
        let source_chain = source.chain();
        let target_chain = target.chain();
        let mut policies = HashMap::new();
        policies.insert(source_chain, fast_policy(1));
        policies.insert(target_chain, fast_policy(1));
        // Dust raising is opt-in per test
        let mut min_viable_amounts = HashMap::new();
        min_viable_amounts.insert(source_chain, 1);
        min_viable_amounts.insert(target_chain, 1);
        Self {
            source,
            target,
            reserves: Vec::new(),
            prices: Vec::new(),
            policies,
            min_viable_amounts,
            breaker_config: CircuitBreakerConfig::default(),
            settlement: None,
        }
    }

    pub fn with_reserve(mut self, chain: ChainId, asset: &str, amount: u64) -> Self {
        self.reserves.push((chain, asset.to_string(), amount));
        self
    }

    pub fn with_price(mut self, asset: &str, price: f64) -> Self {
        self.prices.push((asset.to_string(), price));
        self
    }

    pub fn with_policy(mut self, chain: ChainId, policy: ConfirmationPolicy) -> Self {
        self.policies.insert(chain, policy);
        self
    }

    pub fn with_min_viable(mut self, chain: ChainId, amount: u64) -> Self {
        self.min_viable_amounts.insert(chain, amount);
        self
    }

    pub fn with_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_config = config;
        self
    }

    pub fn with_proof_settlement(mut self, settlement: Arc<dyn ProofSettlement>) -> Self {
        self.settlement = Some(settlement);
        self
    }

    pub async fn build(self) -> BridgeFixture {
        let metrics = Arc::new(BridgeMetrics::new_for_testing());
        let source = Arc::new(self.source);
        let target = Arc::new(self.target);

        let mut clients: HashMap<ChainId, Arc<dyn ChainClient>> = HashMap::new();
        clients.insert(source.chain(), source.clone());
        clients.insert(target.chain(), target.clone());

        let ledger = Arc::new(
            ReserveLedger::with_reserves(
                self.reserves
                    .into_iter()
                    .map(|(chain, asset, amount)| (crate::types::ReserveKey::new(chain, asset), amount)),
                metrics.clone(),
            )
            .await,
        );
        let tracker = Arc::new(TransactionTracker::new(metrics.clone()));
        let breakers = Arc::new(BreakerRegistry::new(self.breaker_config, metrics.clone()));
        let oracle = Arc::new(CachedRateOracle::new(
            Arc::new(StaticRateOracle::new(self.prices)),
            Duration::from_secs(60),
            metrics.clone(),
        ));

        let config = OrchestratorConfig {
            policies: self.policies,
            lock_addresses: HashMap::new(),
            min_viable_amounts: self.min_viable_amounts,
            // Keeps a failing submission down to one quick retry
            submit_retry_max_elapsed: Duration::from_millis(200),
        };

        let mut orchestrator = BridgeOrchestrator::new(
            config,
            clients,
            oracle,
            ledger,
            tracker,
            breakers,
            metrics.clone(),
        );
        if let Some(settlement) = self.settlement {
            orchestrator = orchestrator.with_proof_settlement(settlement);
        }
        let orchestrator = Arc::new(orchestrator);

        BridgeFixture {
            orchestrator,
            source,
            target,
            metrics,
        }
    }
}
