// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Optional fee advice
//!
//! When no advisor is configured the orchestrator falls back to the
//! chain client's own estimate.

use crate::error::BridgeResult;
use crate::types::{ChainId, FeeHint, FeeUrgency};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;

#[async_trait]
pub trait FeeAdvisor: Send + Sync + Debug {
    /// Recommended fee for the chain at the given urgency
    async fn recommended_fee(&self, chain: ChainId, urgency: FeeUrgency) -> BridgeResult<FeeHint>;
}

/// Fixed base fees scaled by urgency
#[derive(Debug, Clone, Default)]
pub struct StaticFeeAdvisor {
    base_fees: HashMap<ChainId, u64>,
}

impl StaticFeeAdvisor {
    pub fn new(base_fees: impl IntoIterator<Item = (ChainId, u64)>) -> Self {
        Self {
            base_fees: base_fees.into_iter().collect(),
        }
    }
}

#[async_trait]
impl FeeAdvisor for StaticFeeAdvisor {
    async fn recommended_fee(&self, chain: ChainId, urgency: FeeUrgency) -> BridgeResult<FeeHint> {
        let base = self.base_fees.get(&chain).copied().unwrap_or(0);
        let fee_units = match urgency {
            FeeUrgency::Low => base * 8 / 10,
            FeeUrgency::Normal => base,
            FeeUrgency::High => base * 15 / 10,
        };
        Ok(FeeHint { fee_units })
    }
}
