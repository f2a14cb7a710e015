// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Transaction status tracking
//!
//! Owns the per-transfer lifecycle state machine and publishes updates to
//! subscribers. One tracked transaction per transfer, created at transfer
//! start and mutated only through the tracker's update API.

mod tracker;
mod types;

pub use tracker::{StatusCallback, TransactionTracker};
pub use types::{
    ChainStats, HistoryEntry, StatusPatch, StatusSummary, TrackedTransaction, TransactionStatus,
};
