// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Scripted chain client for tests
//!
//! Status polls replay a canned sequence (the final entry repeats);
//! submissions and validations can be scripted to fail. Call counters
//! let tests assert that no chain I/O happened on early-abort paths.

use crate::chain_client::ChainClient;
use crate::error::{BridgeError, BridgeResult};
use crate::types::{ChainId, ChainTransaction, FeeHint, TxStatusReport};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug)]
pub struct MockChainClient {
    chain: ChainId,
    status_script: Mutex<VecDeque<TxStatusReport>>,
    submit_errors: Mutex<VecDeque<BridgeError>>,
    invalid_addresses: Mutex<HashSet<String>>,
    status_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    validate_calls: AtomicUsize,
    fee_units: u64,
}

impl MockChainClient {
    pub fn new(chain: ChainId) -> Self {
        Self {
            chain,
            status_script: Mutex::new(VecDeque::new()),
            submit_errors: Mutex::new(VecDeque::new()),
            invalid_addresses: Mutex::new(HashSet::new()),
            status_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            validate_calls: AtomicUsize::new(0),
            fee_units: 1_000,
        }
    }

    /// Script the sequence of status reports; the last one repeats forever
    pub fn with_status_script(self, reports: Vec<TxStatusReport>) -> Self {
        *self.status_script.lock().unwrap() = reports.into();
        self
    }

    /// Queue an error for the next submission(s); once drained,
    /// submissions succeed
    pub fn with_submit_error(self, error: BridgeError) -> Self {
        self.submit_errors.lock().unwrap().push_back(error);
        self
    }

    /// Mark an address as malformed for this chain
    pub fn with_invalid_address(self, address: impl Into<String>) -> Self {
        self.invalid_addresses.lock().unwrap().insert(address.into());
        self
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn chain(&self) -> ChainId {
        self.chain
    }

    async fn validate_address(&self, address: &str) -> BridgeResult<bool> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        if address.is_empty() {
            return Ok(false);
        }
        Ok(!self.invalid_addresses.lock().unwrap().contains(address))
    }

    async fn submit_transaction(&self, _tx: &ChainTransaction) -> BridgeResult<String> {
        let n = self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.submit_errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(format!("{}-tx-{}", self.chain, n))
    }

    async fn get_status(&self, _tx_ref: &str) -> BridgeResult<TxStatusReport> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.status_script.lock().unwrap();
        match script.len() {
            // No script: everything is instantly final
            0 => Ok(TxStatusReport::confirmed(u64::MAX)),
            // Last entry repeats
            1 => Ok(*script.front().unwrap()),
            _ => Ok(script.pop_front().unwrap()),
        }
    }

    async fn estimate_fee(&self) -> BridgeResult<FeeHint> {
        Ok(FeeHint {
            fee_units: self.fee_units,
        })
    }
}
