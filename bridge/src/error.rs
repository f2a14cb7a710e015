// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::types::ChainId;

/// Progress information attached to a confirmation timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxNotConfirmedInfo {
    /// Chain the transaction is waiting on
    pub chain: ChainId,
    /// Transaction reference being watched
    pub tx_ref: String,
    /// Confirmations observed when the wait expired
    pub confirmations: u64,
    /// Confirmations required by the chain's policy
    pub required_confirmations: u64,
    /// How long the watcher waited (in seconds)
    pub waited_secs: u64,
}

impl std::fmt::Display for TxNotConfirmedInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Transaction {} on {} reached {}/{} confirmations after {}s",
            self.tx_ref, self.chain, self.confirmations, self.required_confirmations,
            self.waited_secs
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    // Recipient address is malformed for the target chain
    InvalidAddress {
        chain: ChainId,
        address: String,
    },
    // No chain client configured for the requested chain
    UnsupportedChain(ChainId),
    // Neither a live price nor a fallback price exists for the asset
    RateUnavailable(String),
    // Destination reserve cannot cover the converted amount
    InsufficientReserves {
        chain: ChainId,
        asset: String,
        requested: u64,
        available: u64,
    },
    // Source-chain lock submission failed after bounded retries
    LockSubmissionFailed(String),
    // Lock did not reach required confirmations in time (timeout, not failure)
    LockNotConfirmed(TxNotConfirmedInfo),
    // Lock confirmed but the transaction itself failed/reverted
    LockVerificationFailed {
        chain: ChainId,
        tx_ref: String,
    },
    // Funds are locked on the source chain but the release did not go through.
    // Carries the source reference so an operator can reconcile.
    ReleaseSubmissionFailed {
        source_tx_ref: String,
        reason: String,
    },
    // Circuit breaker for the named dependency is open
    CircuitOpen {
        name: String,
        retry_after_secs: u64,
    },
    // Transfer was cancelled before completing
    Cancelled,
    // Transient dependency error, safe to retry
    TransientProviderError(String),
    // Non-transient dependency error
    ProviderError(String),
    // Internal invariant violation
    InternalError(String),
    // Uncategorized error
    Generic(String),
}

impl BridgeError {
    /// Returns a short stable string identifying the error type for metric
    /// labels. These feed alerting dashboards; renaming one is a breaking
    /// change for operators.
    pub fn error_type(&self) -> &'static str {
        match self {
            BridgeError::InvalidAddress { .. } => "invalid_address",
            BridgeError::UnsupportedChain(_) => "unsupported_chain",
            BridgeError::RateUnavailable(_) => "rate_unavailable",
            BridgeError::InsufficientReserves { .. } => "insufficient_reserves",
            BridgeError::LockSubmissionFailed(_) => "lock_submission_failed",
            BridgeError::LockNotConfirmed(_) => "lock_not_confirmed",
            BridgeError::LockVerificationFailed { .. } => "lock_verification_failed",
            BridgeError::ReleaseSubmissionFailed { .. } => "release_submission_failed",
            BridgeError::CircuitOpen { .. } => "circuit_open",
            BridgeError::Cancelled => "cancelled",
            BridgeError::TransientProviderError(_) => "transient_provider_error",
            BridgeError::ProviderError(_) => "provider_error",
            BridgeError::InternalError(_) => "internal_error",
            BridgeError::Generic(_) => "generic",
        }
    }

    /// Whether retrying the same request later could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::CircuitOpen { .. }
                | BridgeError::TransientProviderError(_)
                | BridgeError::LockNotConfirmed(_)
        )
    }
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::InvalidAddress { chain, address } => {
                write!(f, "address {} is not valid for {}", address, chain)
            }
            BridgeError::UnsupportedChain(chain) => {
                write!(f, "no chain client configured for {}", chain)
            }
            BridgeError::RateUnavailable(asset) => {
                write!(f, "no exchange rate available for {}", asset)
            }
            BridgeError::InsufficientReserves {
                chain,
                asset,
                requested,
                available,
            } => write!(
                f,
                "insufficient reserves on {}:{}: requested {} but {} available",
                chain, asset, requested, available
            ),
            BridgeError::LockSubmissionFailed(reason) => {
                write!(f, "lock submission failed: {}", reason)
            }
            BridgeError::LockNotConfirmed(info) => write!(f, "lock not confirmed: {}", info),
            BridgeError::LockVerificationFailed { chain, tx_ref } => {
                write!(f, "lock {} on {} confirmed but did not succeed", tx_ref, chain)
            }
            BridgeError::ReleaseSubmissionFailed {
                source_tx_ref,
                reason,
            } => write!(
                f,
                "funds locked (source tx {}) but release failed: {}",
                source_tx_ref, reason
            ),
            BridgeError::CircuitOpen {
                name,
                retry_after_secs,
            } => write!(
                f,
                "circuit breaker '{}' is open, retry in {}s",
                name, retry_after_secs
            ),
            BridgeError::Cancelled => write!(f, "transfer cancelled"),
            BridgeError::TransientProviderError(reason) => {
                write!(f, "transient provider error: {}", reason)
            }
            BridgeError::ProviderError(reason) => write!(f, "provider error: {}", reason),
            BridgeError::InternalError(reason) => write!(f, "internal error: {}", reason),
            BridgeError::Generic(reason) => write!(f, "{}", reason),
        }
    }
}

impl std::error::Error for BridgeError {}

pub type BridgeResult<T> = Result<T, BridgeError>;
