// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared types for cross-chain transfers

use serde::{Deserialize, Serialize};
use std::fmt;

/// All amounts move through the bridge in fixed 8-decimal units,
/// regardless of the native decimals of the source or target asset.
pub const UNIT_DECIMALS: u32 = 8;

/// Number of base units in one whole token.
pub const UNITS_PER_TOKEN: u64 = 10u64.pow(UNIT_DECIMALS);

/// Supported chain identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainId {
    Ethereum,
    Polygon,
    Bsc,
    Base,
    Bitcoin,
    Solana,
}

impl ChainId {
    /// Lowercase name used in metric labels and breaker names
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainId::Ethereum => "ethereum",
            ChainId::Polygon => "polygon",
            ChainId::Bsc => "bsc",
            ChainId::Base => "base",
            ChainId::Bitcoin => "bitcoin",
            ChainId::Solana => "solana",
        }
    }

    /// Breaker name for this chain's RPC endpoint
    pub fn rpc_breaker_name(&self) -> String {
        format!("rpc:{}", self.as_str())
    }

    pub fn all() -> &'static [ChainId] {
        &[
            ChainId::Ethereum,
            ChainId::Polygon,
            ChainId::Bsc,
            ChainId::Base,
            ChainId::Bitcoin,
            ChainId::Solana,
        ]
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error parsing a chain name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown chain: {0}")]
pub struct UnknownChain(String);

impl std::str::FromStr for ChainId {
    type Err = UnknownChain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ethereum" | "eth" => Ok(ChainId::Ethereum),
            "polygon" | "matic" => Ok(ChainId::Polygon),
            "bsc" => Ok(ChainId::Bsc),
            "base" => Ok(ChainId::Base),
            "bitcoin" | "btc" => Ok(ChainId::Bitcoin),
            "solana" | "sol" => Ok(ChainId::Solana),
            other => Err(UnknownChain(other.to_string())),
        }
    }
}

/// Key into the reserve ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReserveKey {
    pub chain: ChainId,
    pub asset: String,
}

impl ReserveKey {
    pub fn new(chain: ChainId, asset: impl Into<String>) -> Self {
        Self {
            chain,
            asset: asset.into(),
        }
    }
}

impl fmt::Display for ReserveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.asset)
    }
}

/// Per-chain confirmation requirements (immutable configuration)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfirmationPolicy {
    /// Confirmations required before a transaction counts as final
    pub min_confirmations: u64,
    /// Seconds between status polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Seconds to wait before giving up on confirmation
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_max_wait_secs() -> u64 {
    600
}

impl ConfirmationPolicy {
    /// Default confirmation depth per chain. Probabilistic-finality chains
    /// need more depth; Solana's commitment model needs one.
    pub fn default_for(chain: ChainId) -> Self {
        let min_confirmations = match chain {
            ChainId::Bitcoin => 6,
            ChainId::Ethereum | ChainId::Polygon | ChainId::Bsc | ChainId::Base => 12,
            ChainId::Solana => 1,
        };
        Self {
            min_confirmations,
            poll_interval_secs: default_poll_interval_secs(),
            max_wait_secs: default_max_wait_secs(),
        }
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_wait(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.max_wait_secs)
    }
}

/// Status of a transaction as reported by a chain client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxStatusReport {
    /// Whether the chain knows about the transaction at all
    /// (false while still in a mempool)
    pub found: bool,
    /// Confirmation count, 0 if not yet included
    pub confirmations: u64,
    /// Whether the transaction executed successfully. Only meaningful
    /// once `found` is true; a confirmed-but-reverted transaction reports
    /// `success == false`.
    pub success: bool,
}

impl TxStatusReport {
    pub fn not_found() -> Self {
        Self {
            found: false,
            confirmations: 0,
            success: false,
        }
    }

    pub fn confirmed(confirmations: u64) -> Self {
        Self {
            found: true,
            confirmations,
            success: true,
        }
    }

    pub fn reverted(confirmations: u64) -> Self {
        Self {
            found: true,
            confirmations,
            success: false,
        }
    }
}

/// Fee recommendation urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeUrgency {
    Low,
    Normal,
    High,
}

/// A fee recommendation in native minor units of the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeHint {
    pub fee_units: u64,
}

/// Payload handed to a chain client for submission.
///
/// Wire formats and signing are the client's concern; the core only
/// describes what should happen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainTransaction {
    pub chain: ChainId,
    pub asset: String,
    pub amount: u64,
    pub recipient: String,
    /// Lock transactions carry the sender's signing material, opaque to the core
    pub credentials: Option<String>,
    pub memo: Option<String>,
    pub fee_hint: Option<FeeHint>,
}

/// A request to move value between two chains
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source_chain: ChainId,
    pub target_chain: ChainId,
    /// Amount in source-asset bridge units
    pub amount: u64,
    pub source_asset: String,
    pub target_asset: String,
    /// Recipient address, formatted for the target chain
    pub recipient: String,
    /// Opaque signing material for the source-chain lock
    pub credentials: Option<String>,
}

/// One cross-chain movement of value, retained for audit.
///
/// `target_tx_ref` is only ever set after `source_tx_ref` confirmed and
/// re-verified; `reserve_debited` flips false -> true exactly once and
/// never reverts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: String,
    pub source_chain: ChainId,
    pub target_chain: ChainId,
    pub source_asset: String,
    pub target_asset: String,
    /// In source-asset units
    pub requested_amount: u64,
    /// In target-asset units, after conversion
    pub settled_amount: u64,
    pub recipient_address: String,
    pub source_tx_ref: Option<String>,
    pub target_tx_ref: Option<String>,
    pub reserve_debited: bool,
    /// Set when the converted amount was raised to the configured
    /// minimum-viable amount
    pub min_amount_adjusted: bool,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

/// Terminal result of a successful transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    pub id: String,
    pub source_tx_ref: String,
    pub target_tx_ref: String,
    /// In target-asset units
    pub settled_amount: u64,
    pub min_amount_adjusted: bool,
    /// Confirmations observed on the source lock at completion
    pub lock_confirmations: u64,
}

/// Current unix time in milliseconds
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate an opaque transfer id
pub fn new_transfer_id() -> String {
    format!("xfer-{:016x}", rand::random::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_chain_id_display_roundtrip() {
        for chain in ChainId::all() {
            let parsed = ChainId::from_str(chain.as_str()).unwrap();
            assert_eq!(parsed, *chain);
        }
        assert!(ChainId::from_str("near").is_err());
    }

    #[test]
    fn test_chain_id_aliases() {
        assert_eq!(ChainId::from_str("eth").unwrap(), ChainId::Ethereum);
        assert_eq!(ChainId::from_str("BTC").unwrap(), ChainId::Bitcoin);
        assert_eq!(ChainId::from_str("matic").unwrap(), ChainId::Polygon);
    }

    #[test]
    fn test_default_confirmation_policy() {
        assert_eq!(
            ConfirmationPolicy::default_for(ChainId::Bitcoin).min_confirmations,
            6
        );
        assert_eq!(
            ConfirmationPolicy::default_for(ChainId::Ethereum).min_confirmations,
            12
        );
        assert_eq!(
            ConfirmationPolicy::default_for(ChainId::Solana).min_confirmations,
            1
        );
    }

    #[test]
    fn test_reserve_key_display() {
        let key = ReserveKey::new(ChainId::Polygon, "USDT");
        assert_eq!(key.to_string(), "polygon:USDT");
    }

    #[test]
    fn test_transfer_ids_are_unique() {
        let a = new_transfer_id();
        let b = new_transfer_id();
        assert_ne!(a, b);
        assert!(a.starts_with("xfer-"));
    }
}
