// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Type definitions for transaction status tracking

use crate::types::ChainId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a tracked transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Broadcasted,
    Confirmed,
    Finalized,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Broadcasted => "broadcasted",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Finalized => "finalized",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Finalized | TransactionStatus::Failed | TransactionStatus::Cancelled
        )
    }

    /// Whether moving from `self` to `to` is a legal transition.
    ///
    /// Happy path: pending -> broadcasted -> confirmed -> finalized.
    /// Failure is only reachable before confirmation (submission or
    /// verification errors); cancellation from any non-terminal state.
    /// Same-status updates are allowed so confirmation counts can be
    /// refreshed in place.
    pub fn can_transition_to(&self, to: TransactionStatus) -> bool {
        use TransactionStatus::*;
        if *self == to {
            return !self.is_terminal();
        }
        match (*self, to) {
            (Pending, Broadcasted) => true,
            (Broadcasted, Confirmed) => true,
            (Confirmed, Finalized) => true,
            (Pending | Broadcasted, Failed) => true,
            (Pending | Broadcasted | Confirmed, Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The tracker's view of one transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedTransaction {
    pub tx_id: String,
    pub source_chain: ChainId,
    pub target_chain: ChainId,
    /// In source-asset bridge units
    pub amount: u64,
    pub asset: String,
    pub status: TransactionStatus,
    pub source_tx_ref: Option<String>,
    pub target_tx_ref: Option<String>,
    pub confirmations: u64,
    pub required_confirmations: u64,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    /// Estimated completion time based on recent history for the source chain
    pub estimated_completion_ms: Option<u64>,
    pub error: Option<String>,
}

/// Optional fields carried by a status update
#[derive(Debug, Clone, Default)]
pub struct StatusPatch {
    pub source_tx_ref: Option<String>,
    pub target_tx_ref: Option<String>,
    pub confirmations: Option<u64>,
    pub error: Option<String>,
}

impl StatusPatch {
    pub fn source_ref(tx_ref: impl Into<String>) -> Self {
        Self {
            source_tx_ref: Some(tx_ref.into()),
            ..Default::default()
        }
    }

    pub fn target_ref(tx_ref: impl Into<String>) -> Self {
        Self {
            target_tx_ref: Some(tx_ref.into()),
            ..Default::default()
        }
    }

    pub fn confirmations(confirmations: u64) -> Self {
        Self {
            confirmations: Some(confirmations),
            ..Default::default()
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// One entry in the bounded diagnostics history
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub timestamp_ms: u64,
    pub tx_id: String,
    pub event: String,
    pub status: TransactionStatus,
    pub confirmations: u64,
}

/// UI-facing summary of one tracked transaction
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub tx_id: String,
    pub status: TransactionStatus,
    pub progress_percent: f64,
    pub elapsed_secs: f64,
    pub confirmations: u64,
    pub required_confirmations: u64,
    pub source_tx_ref: Option<String>,
    pub target_tx_ref: Option<String>,
    pub estimated_completion_ms: Option<u64>,
    pub error: Option<String>,
}

/// Aggregate per-chain statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChainStats {
    pub total: u64,
    pub pending: u64,
    pub confirmed: u64,
    pub failed: u64,
    /// Exponentially weighted average of time to confirmation, seconds
    pub avg_completion_secs: f64,
}
