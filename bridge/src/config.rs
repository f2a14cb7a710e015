// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::chain_client::ChainClient;
use crate::circuit_breaker::{BreakerRegistry, CircuitBreakerConfig};
use crate::metrics::BridgeMetrics;
use crate::oracle::{CachedRateOracle, ExchangeRateOracle, StaticRateOracle};
use crate::orchestrator::{BridgeOrchestrator, OrchestratorConfig};
use crate::reserve_ledger::ReserveLedger;
use crate::tracker::TransactionTracker;
use crate::types::{ChainId, ConfirmationPolicy, ReserveKey};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uni_bridge_config::Config;

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChainConfig {
    // Rpc url for the chain's fullnode, used by the client collaborator
    pub rpc_url: String,
    // Address value is locked to on this chain
    pub lock_address: String,
    // Confirmation requirements; chain defaults apply when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_policy: Option<ConfirmationPolicy>,
    // Minimum transferable amount when this chain is the destination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_viable_amount: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReserveSeed {
    pub chain: ChainId,
    pub asset: String,
    pub amount: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CircuitBreakerSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    #[serde(default = "default_breaker_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_breaker_window_secs")]
    pub window_secs: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_breaker_timeout_secs() -> u64 {
    60
}

fn default_breaker_window_secs() -> u64 {
    300
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout_secs: default_breaker_timeout_secs(),
            window_secs: default_breaker_window_secs(),
        }
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            success_threshold: settings.success_threshold,
            timeout: Duration::from_secs(settings.timeout_secs),
            window: Duration::from_secs(settings.window_secs),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct OracleSettings {
    #[serde(default = "default_price_ttl_secs")]
    pub price_ttl_secs: u64,
    // Used as the price source when no live oracle collaborator is wired in
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub static_prices: BTreeMap<String, f64>,
}

fn default_price_ttl_secs() -> u64 {
    30
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            price_ttl_secs: default_price_ttl_secs(),
            static_prices: BTreeMap::new(),
        }
    }
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BridgeNodeConfig {
    // The port for the metrics endpoint
    pub metrics_port: u16,
    // Per-chain configuration, keyed by chain name
    pub chains: BTreeMap<ChainId, ChainConfig>,
    // Pre-funded destination-side liquidity
    #[serde(default)]
    pub reserves: Vec<ReserveSeed>,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
    #[serde(default)]
    pub oracle: OracleSettings,
    // Retry budget for a single chain submission
    #[serde(default = "default_submit_retry_secs")]
    pub submit_retry_max_elapsed_secs: u64,
}

fn default_submit_retry_secs() -> u64 {
    30
}

impl Config for BridgeNodeConfig {}

impl BridgeNodeConfig {
    /// Structural checks that need no collaborators
    pub fn sanity_check(&self) -> anyhow::Result<()> {
        if self.chains.is_empty() {
            return Err(anyhow!("at least one chain must be configured"));
        }
        for (chain, chain_config) in &self.chains {
            if chain_config.rpc_url.is_empty() {
                return Err(anyhow!("chain {} has an empty rpc-url", chain));
            }
            if chain_config.lock_address.is_empty() {
                return Err(anyhow!("chain {} has an empty lock-address", chain));
            }
        }
        for seed in &self.reserves {
            if !self.chains.contains_key(&seed.chain) {
                return Err(anyhow!(
                    "reserve seed {}:{} references an unconfigured chain",
                    seed.chain,
                    seed.asset
                ));
            }
        }
        Ok(())
    }

    /// Assemble the orchestrator and its services.
    ///
    /// Chain clients and (optionally) a live price oracle are collaborators
    /// supplied by the embedding application; everything else is built
    /// here, explicitly, with no process-wide globals.
    pub async fn assemble(
        &self,
        clients: HashMap<ChainId, Arc<dyn ChainClient>>,
        live_oracle: Option<Arc<dyn ExchangeRateOracle>>,
        metrics: Arc<BridgeMetrics>,
    ) -> anyhow::Result<BridgeOrchestrator> {
        info!("Starting config validation");
        self.sanity_check()?;
        for chain in self.chains.keys() {
            if !clients.contains_key(chain) {
                return Err(anyhow!("no chain client registered for {}", chain));
            }
        }

        let ledger = Arc::new(
            ReserveLedger::with_reserves(
                self.reserves
                    .iter()
                    .map(|seed| (ReserveKey::new(seed.chain, &seed.asset), seed.amount)),
                metrics.clone(),
            )
            .await,
        );
        let tracker = Arc::new(TransactionTracker::new(metrics.clone()));
        let breakers = Arc::new(BreakerRegistry::new(
            (&self.circuit_breaker).into(),
            metrics.clone(),
        ));

        let price_source: Arc<dyn ExchangeRateOracle> = match live_oracle {
            Some(oracle) => oracle,
            None => Arc::new(StaticRateOracle::new(
                self.oracle
                    .static_prices
                    .iter()
                    .map(|(asset, price)| (asset.clone(), *price)),
            )),
        };
        let oracle = Arc::new(CachedRateOracle::new(
            price_source,
            Duration::from_secs(self.oracle.price_ttl_secs),
            metrics.clone(),
        ));

        let orchestrator_config = OrchestratorConfig {
            policies: self
                .chains
                .iter()
                .filter_map(|(chain, chain_config)| {
                    chain_config
                        .confirmation_policy
                        .clone()
                        .map(|policy| (*chain, policy))
                })
                .collect(),
            lock_addresses: self
                .chains
                .iter()
                .map(|(chain, chain_config)| (*chain, chain_config.lock_address.clone()))
                .collect(),
            min_viable_amounts: self
                .chains
                .iter()
                .filter_map(|(chain, chain_config)| {
                    chain_config.min_viable_amount.map(|amount| (*chain, amount))
                })
                .collect(),
            submit_retry_max_elapsed: Duration::from_secs(self.submit_retry_max_elapsed_secs),
        };

        info!("Config validation complete");
        Ok(BridgeOrchestrator::new(
            orchestrator_config,
            clients,
            oracle,
            ledger,
            tracker,
            breakers,
            metrics,
        ))
    }

    /// A ready-to-edit sample configuration
    pub fn example() -> Self {
        let mut chains = BTreeMap::new();
        chains.insert(
            ChainId::Polygon,
            ChainConfig {
                rpc_url: "https://polygon-rpc.example".to_string(),
                lock_address: "0x0000000000000000000000000000000000000b71".to_string(),
                confirmation_policy: None,
                min_viable_amount: None,
            },
        );
        chains.insert(
            ChainId::Bitcoin,
            ChainConfig {
                rpc_url: "https://btc-rpc.example".to_string(),
                lock_address: "bc1qexamplelockaddress".to_string(),
                confirmation_policy: Some(ConfirmationPolicy::default_for(ChainId::Bitcoin)),
                min_viable_amount: Some(546),
            },
        );
        Self {
            metrics_port: 9185,
            chains,
            reserves: vec![ReserveSeed {
                chain: ChainId::Bitcoin,
                asset: "BTC".to_string(),
                amount: 5 * crate::types::UNITS_PER_TOKEN,
            }],
            circuit_breaker: CircuitBreakerSettings::default(),
            oracle: OracleSettings::default(),
            submit_retry_max_elapsed_secs: default_submit_retry_secs(),
        }
    }
}
