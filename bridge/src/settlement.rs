// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Alternative proof-based settlement seam
//!
//! A configured collaborator can replace the lock/confirm/verify/release
//! sequence with its own settlement mechanism. The core only consumes the
//! outcome: a correlating identifier plus a verified/unverified flag. What
//! the attestation actually proves is the collaborator's business.

use crate::error::BridgeResult;
use crate::types::Transfer;
use async_trait::async_trait;
use std::fmt::Debug;

/// Opaque settlement outcome
#[derive(Debug, Clone)]
pub struct SettlementAttestation {
    /// Identifier correlating the transfer's source and destination artifacts
    pub correlation_id: String,
    /// Whether the collaborator verified the settlement
    pub verified: bool,
}

#[async_trait]
pub trait ProofSettlement: Send + Sync + Debug {
    /// Settle the transfer end to end, returning the attestation
    async fn settle(&self, transfer: &Transfer) -> BridgeResult<SettlementAttestation>;
}
