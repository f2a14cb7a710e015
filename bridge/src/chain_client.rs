// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Chain client boundary
//!
//! One implementation per supported chain family lives outside the core;
//! the orchestrator and watcher only ever see this trait. Wire formats,
//! address encoding and signing are the implementor's concern.

use crate::error::BridgeResult;
use crate::types::{ChainId, ChainTransaction, FeeHint, TxStatusReport};
use async_trait::async_trait;
use std::fmt::Debug;

#[async_trait]
pub trait ChainClient: Send + Sync + Debug {
    /// Chain this client talks to
    fn chain(&self) -> ChainId;

    /// Whether `address` is well-formed for this chain
    async fn validate_address(&self, address: &str) -> BridgeResult<bool>;

    /// Broadcast a transaction, returning an opaque transaction reference.
    ///
    /// Errors here are submission failures; inclusion and success are
    /// observed later through `get_status`.
    async fn submit_transaction(&self, tx: &ChainTransaction) -> BridgeResult<String>;

    /// Current status of a previously submitted transaction.
    ///
    /// A transaction still in the mempool reports `found == false`; this
    /// is a transient state, not an error.
    async fn get_status(&self, tx_ref: &str) -> BridgeResult<TxStatusReport>;

    /// Default fee estimate for this chain
    async fn estimate_fee(&self) -> BridgeResult<FeeHint>;
}
