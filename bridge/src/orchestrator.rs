// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bridge orchestrator
//!
//! Drives a transfer through its strictly ordered steps: validate ->
//! convert -> reserve check -> lock -> confirm -> re-verify -> release ->
//! debit -> finalize. Each transfer runs on its own task; the services it
//! touches (ledger, tracker, breakers) are shared and internally locked.
//!
//! Failures before any chain submission are local and side-effect free.
//! Every failure after the source lock confirmed carries the source
//! transaction reference so an operator can reconcile.

use crate::chain_client::ChainClient;
use crate::circuit_breaker::{BreakerRegistry, CircuitBreaker, CircuitBreakerStatus};
use crate::confirmation_watcher::{ConfirmationWatcher, WatchOutcome};
use crate::error::{BridgeError, BridgeResult, TxNotConfirmedInfo};
use crate::fee_advisor::FeeAdvisor;
use crate::metrics::BridgeMetrics;
use crate::oracle::CachedRateOracle;
use crate::reserve_ledger::{ReserveLedger, ReserveStatus};
use crate::retry_with_max_elapsed_time;
use crate::settlement::ProofSettlement;
use crate::tracker::{StatusPatch, StatusSummary, TransactionStatus, TransactionTracker};
use crate::types::{
    new_transfer_id, now_ms, ChainId, ChainTransaction, ConfirmationPolicy, FeeHint, FeeUrgency,
    Transfer, TransferRequest, TransferResult,
};
use backoff::ExponentialBackoff;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default minimum transferable amount on the destination chain, in
/// bridge units. Below this the converted amount is raised, not rejected.
fn default_min_viable_amount(chain: ChainId) -> u64 {
    match chain {
        // Bitcoin's dust threshold
        ChainId::Bitcoin => 546,
        _ => 100,
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Per-chain confirmation requirements; missing chains use defaults
    pub policies: HashMap<ChainId, ConfirmationPolicy>,
    /// Address value is locked to on each source chain
    pub lock_addresses: HashMap<ChainId, String>,
    /// Per-target-chain minimum viable amounts, overriding the defaults
    pub min_viable_amounts: HashMap<ChainId, u64>,
    /// Retry budget for a single submission
    pub submit_retry_max_elapsed: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            policies: HashMap::new(),
            lock_addresses: HashMap::new(),
            min_viable_amounts: HashMap::new(),
            submit_retry_max_elapsed: Duration::from_secs(30),
        }
    }
}

pub struct BridgeOrchestrator {
    config: OrchestratorConfig,
    clients: HashMap<ChainId, Arc<dyn ChainClient>>,
    oracle: Arc<CachedRateOracle>,
    ledger: Arc<ReserveLedger>,
    tracker: Arc<TransactionTracker>,
    breakers: Arc<BreakerRegistry>,
    watcher: ConfirmationWatcher,
    fee_advisor: Option<Arc<dyn FeeAdvisor>>,
    proof_settlement: Option<Arc<dyn ProofSettlement>>,
    /// Audit record of every transfer ever started; never deleted
    transfers: RwLock<HashMap<String, Transfer>>,
    metrics: Arc<BridgeMetrics>,
}

impl BridgeOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        clients: HashMap<ChainId, Arc<dyn ChainClient>>,
        oracle: Arc<CachedRateOracle>,
        ledger: Arc<ReserveLedger>,
        tracker: Arc<TransactionTracker>,
        breakers: Arc<BreakerRegistry>,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            config,
            clients,
            oracle,
            ledger,
            tracker,
            breakers,
            watcher: ConfirmationWatcher::new(metrics.clone()),
            fee_advisor: None,
            proof_settlement: None,
            transfers: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    pub fn with_fee_advisor(mut self, advisor: Arc<dyn FeeAdvisor>) -> Self {
        self.fee_advisor = Some(advisor);
        self
    }

    /// Substitute the lock/confirm/verify/release sequence with an
    /// external proof-based settlement path
    pub fn with_proof_settlement(mut self, settlement: Arc<dyn ProofSettlement>) -> Self {
        self.proof_settlement = Some(settlement);
        self
    }

    pub fn tracker(&self) -> &Arc<TransactionTracker> {
        &self.tracker
    }

    pub fn ledger(&self) -> &Arc<ReserveLedger> {
        &self.ledger
    }

    /// Execute a transfer end to end
    pub async fn execute_transfer(&self, request: TransferRequest) -> BridgeResult<TransferResult> {
        self.execute_transfer_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Execute a transfer with a caller-supplied cancellation token.
    /// Cancellation before the release step aborts without any reserve
    /// mutation.
    pub async fn execute_transfer_with_cancel(
        &self,
        request: TransferRequest,
        cancel: CancellationToken,
    ) -> BridgeResult<TransferResult> {
        let route = (
            request.source_chain.as_str(),
            request.target_chain.as_str(),
        );
        self.metrics
            .transfers_started
            .with_label_values(&[route.0, route.1])
            .inc();
        let started = Instant::now();

        let result = self.run_transfer(request, cancel).await;

        match &result {
            Ok(outcome) => {
                self.metrics
                    .transfers_succeeded
                    .with_label_values(&[route.0, route.1])
                    .inc();
                self.metrics
                    .transfer_latency
                    .with_label_values(&[route.0, route.1])
                    .observe(started.elapsed().as_secs_f64());
                info!(
                    "Transfer {} complete: {} -> {} ({} units settled)",
                    outcome.id, route.0, route.1, outcome.settled_amount
                );
            }
            Err(e) => {
                self.metrics
                    .transfers_failed
                    .with_label_values(&[e.error_type()])
                    .inc();
                warn!("Transfer failed ({}): {}", e.error_type(), e);
            }
        }
        result
    }

    async fn run_transfer(
        &self,
        request: TransferRequest,
        cancel: CancellationToken,
    ) -> BridgeResult<TransferResult> {
        let source_client = self
            .clients
            .get(&request.source_chain)
            .ok_or(BridgeError::UnsupportedChain(request.source_chain))?
            .clone();
        let target_client = self
            .clients
            .get(&request.target_chain)
            .ok_or(BridgeError::UnsupportedChain(request.target_chain))?
            .clone();
        let source_breaker = self
            .breakers
            .get_or_create(&request.source_chain.rpc_breaker_name());
        let target_breaker = self
            .breakers
            .get_or_create(&request.target_chain.rpc_breaker_name());

        // Step 1: the recipient must be well-formed for the target chain
        let valid = target_breaker
            .call(|| target_client.validate_address(&request.recipient))
            .await?;
        if !valid {
            return Err(BridgeError::InvalidAddress {
                chain: request.target_chain,
                address: request.recipient.clone(),
            });
        }

        // Step 2: convert through USD prices; dust-sized results are raised
        // to the configured minimum rather than rejected
        let converted = self
            .oracle
            .convert(request.amount, &request.source_asset, &request.target_asset)
            .await?;
        let min_viable = self
            .config
            .min_viable_amounts
            .get(&request.target_chain)
            .copied()
            .unwrap_or_else(|| default_min_viable_amount(request.target_chain));
        let (settled_amount, min_amount_adjusted) = if converted < min_viable {
            info!(
                "Converted amount {} below minimum viable {} on {}, raising",
                converted, min_viable, request.target_chain
            );
            (min_viable, true)
        } else {
            (converted, false)
        };

        let policy = self.policy_for(request.source_chain);
        let id = new_transfer_id();
        let transfer = Transfer {
            id: id.clone(),
            source_chain: request.source_chain,
            target_chain: request.target_chain,
            source_asset: request.source_asset.clone(),
            target_asset: request.target_asset.clone(),
            requested_amount: request.amount,
            settled_amount,
            recipient_address: request.recipient.clone(),
            source_tx_ref: None,
            target_tx_ref: None,
            reserve_debited: false,
            min_amount_adjusted,
            created_at_ms: now_ms(),
            updated_at_ms: now_ms(),
        };
        {
            let mut transfers = self.transfers.write().await;
            transfers.insert(id.clone(), transfer.clone());
        }
        self.tracker
            .create(
                &id,
                request.source_chain,
                request.target_chain,
                request.amount,
                &request.source_asset,
                policy.min_confirmations,
            )
            .await;

        // Step 3: reserve pre-check, before any chain I/O
        if !self
            .ledger
            .has_sufficient(request.target_chain, &request.target_asset, settled_amount)
            .await
        {
            let available = self
                .ledger
                .available(request.target_chain, &request.target_asset)
                .await;
            let err = BridgeError::InsufficientReserves {
                chain: request.target_chain,
                asset: request.target_asset.clone(),
                requested: settled_amount,
                available,
            };
            self.fail(&id, &err).await;
            return Err(err);
        }

        // Configured proof-based settlement replaces steps 4-7
        if let Some(settlement) = &self.proof_settlement {
            return self
                .settle_via_proof(settlement.clone(), transfer, &request)
                .await;
        }

        // Step 4: submit the lock on the source chain
        let lock_address = self
            .config
            .lock_addresses
            .get(&request.source_chain)
            .cloned()
            .unwrap_or_else(|| format!("lock:{}", request.source_chain));
        let lock_tx = ChainTransaction {
            chain: request.source_chain,
            asset: request.source_asset.clone(),
            amount: request.amount,
            recipient: lock_address,
            credentials: request.credentials.clone(),
            memo: Some(id.clone()),
            fee_hint: self.fee_hint(&source_client, &source_breaker).await,
        };
        let source_tx_ref = match self
            .submit_with_retry(&source_client, &source_breaker, &lock_tx)
            .await
        {
            Ok(tx_ref) => tx_ref,
            Err(e @ BridgeError::CircuitOpen { .. }) => {
                self.fail(&id, &e).await;
                return Err(e);
            }
            Err(e) => {
                let err = BridgeError::LockSubmissionFailed(e.to_string());
                self.fail(&id, &err).await;
                return Err(err);
            }
        };
        self.record_source_ref(&id, &source_tx_ref).await;
        self.tracker
            .update_status(
                &id,
                TransactionStatus::Broadcasted,
                StatusPatch::source_ref(&source_tx_ref),
            )
            .await;

        // Step 5: wait for the lock to reach the chain's confirmation depth
        let lock_confirmations = match self
            .watcher
            .await_confirmations(
                source_client.as_ref(),
                &source_breaker,
                &source_tx_ref,
                policy.min_confirmations,
                policy.max_wait(),
                policy.poll_interval(),
                &cancel,
            )
            .await
        {
            Ok(WatchOutcome::Confirmed(confirmations)) => {
                self.tracker
                    .update_status(
                        &id,
                        TransactionStatus::Broadcasted,
                        StatusPatch::confirmations(confirmations),
                    )
                    .await;
                confirmations
            }
            Ok(WatchOutcome::TimedOut(confirmations)) => {
                let err = BridgeError::LockNotConfirmed(TxNotConfirmedInfo {
                    chain: request.source_chain,
                    tx_ref: source_tx_ref.clone(),
                    confirmations,
                    required_confirmations: policy.min_confirmations,
                    waited_secs: policy.max_wait_secs,
                });
                self.fail(&id, &err).await;
                return Err(err);
            }
            Ok(WatchOutcome::TxFailed) => {
                let err = BridgeError::LockVerificationFailed {
                    chain: request.source_chain,
                    tx_ref: source_tx_ref.clone(),
                };
                self.fail(&id, &err).await;
                return Err(err);
            }
            Err(e) => {
                // Cancellation; nothing destination-side has happened
                self.tracker.cancel(&id).await;
                return Err(e);
            }
        };

        // Step 6: independent re-verification. Confirmation depth alone is
        // not enough; a lock that confirmed but reverted must be rejected.
        let verification = retry_with_max_elapsed_time!(
            source_breaker.call(|| source_client.get_status(&source_tx_ref)),
            Duration::from_secs(15)
        );
        let verified = matches!(verification, Ok(Ok(report)) if report.found && report.success);
        if !verified {
            let err = BridgeError::LockVerificationFailed {
                chain: request.source_chain,
                tx_ref: source_tx_ref.clone(),
            };
            self.fail(&id, &err).await;
            return Err(err);
        }

        // Step 7: release from reserves on the target chain. From here on,
        // every error must carry the source reference.
        let release_tx = ChainTransaction {
            chain: request.target_chain,
            asset: request.target_asset.clone(),
            amount: settled_amount,
            recipient: request.recipient.clone(),
            credentials: None,
            memo: Some(id.clone()),
            fee_hint: self.fee_hint(&target_client, &target_breaker).await,
        };
        let target_tx_ref = match self
            .submit_with_retry(&target_client, &target_breaker, &release_tx)
            .await
        {
            Ok(tx_ref) => tx_ref,
            Err(e) => {
                let err = BridgeError::ReleaseSubmissionFailed {
                    source_tx_ref: source_tx_ref.clone(),
                    reason: e.to_string(),
                };
                self.fail(&id, &err).await;
                return Err(err);
            }
        };

        // Debit exactly once, guarded by the transfer's reserve_debited flag
        if let Err(e) = self
            .debit_once(
                &id,
                request.target_chain,
                &request.target_asset,
                settled_amount,
                &target_tx_ref,
            )
            .await
        {
            let err = BridgeError::ReleaseSubmissionFailed {
                source_tx_ref: source_tx_ref.clone(),
                reason: format!(
                    "release {} submitted but reserve debit failed: {}",
                    target_tx_ref, e
                ),
            };
            self.fail(&id, &err).await;
            return Err(err);
        }
        self.tracker
            .update_status(
                &id,
                TransactionStatus::Confirmed,
                StatusPatch::target_ref(&target_tx_ref),
            )
            .await;

        // Finalize once the release itself reaches its confirmation depth.
        // The value has moved by now, so a slow target chain leaves the
        // transfer at Confirmed instead of failing it.
        let target_policy = self.policy_for(request.target_chain);
        match self
            .watcher
            .await_confirmations(
                target_client.as_ref(),
                &target_breaker,
                &target_tx_ref,
                target_policy.min_confirmations,
                target_policy.max_wait(),
                target_policy.poll_interval(),
                &cancel,
            )
            .await
        {
            Ok(WatchOutcome::Confirmed(_)) => {
                self.tracker
                    .update_status(&id, TransactionStatus::Finalized, StatusPatch::default())
                    .await;
            }
            Ok(WatchOutcome::TxFailed) => {
                let err = BridgeError::ReleaseSubmissionFailed {
                    source_tx_ref: source_tx_ref.clone(),
                    reason: format!("release {} failed on-chain after submission", target_tx_ref),
                };
                // Confirmed is kept; the error is recorded on the tracker
                self.tracker
                    .update_status(
                        &id,
                        TransactionStatus::Confirmed,
                        StatusPatch::error(err.to_string()),
                    )
                    .await;
                return Err(err);
            }
            Ok(WatchOutcome::TimedOut(confirmations)) => {
                warn!(
                    "Release {} on {} still at {}/{} confirmations; leaving transfer {} at confirmed",
                    target_tx_ref,
                    request.target_chain,
                    confirmations,
                    target_policy.min_confirmations,
                    id
                );
            }
            Err(_) => {
                // Cancelled mid-finalization; the release is already out
                warn!(
                    "Transfer {} cancelled while awaiting release finality; release {} stands",
                    id, target_tx_ref
                );
            }
        }

        Ok(TransferResult {
            id,
            source_tx_ref,
            target_tx_ref,
            settled_amount,
            min_amount_adjusted,
            lock_confirmations,
        })
    }

    /// Alternative settlement path: one external call stands in for
    /// lock/confirm/verify/release, reduced to an opaque attestation.
    async fn settle_via_proof(
        &self,
        settlement: Arc<dyn ProofSettlement>,
        transfer: Transfer,
        request: &TransferRequest,
    ) -> BridgeResult<TransferResult> {
        let id = transfer.id.clone();
        let attestation = match settlement.settle(&transfer).await {
            Ok(attestation) => attestation,
            Err(e) => {
                let err = BridgeError::LockSubmissionFailed(e.to_string());
                self.fail(&id, &err).await;
                return Err(err);
            }
        };
        self.record_source_ref(&id, &attestation.correlation_id).await;
        self.tracker
            .update_status(
                &id,
                TransactionStatus::Broadcasted,
                StatusPatch::source_ref(&attestation.correlation_id),
            )
            .await;

        if !attestation.verified {
            let err = BridgeError::LockVerificationFailed {
                chain: request.source_chain,
                tx_ref: attestation.correlation_id.clone(),
            };
            self.fail(&id, &err).await;
            return Err(err);
        }

        if let Err(e) = self
            .debit_once(
                &id,
                request.target_chain,
                &request.target_asset,
                transfer.settled_amount,
                &attestation.correlation_id,
            )
            .await
        {
            let err = BridgeError::ReleaseSubmissionFailed {
                source_tx_ref: attestation.correlation_id.clone(),
                reason: e.to_string(),
            };
            self.fail(&id, &err).await;
            return Err(err);
        }

        self.tracker
            .update_status(
                &id,
                TransactionStatus::Confirmed,
                StatusPatch::target_ref(&attestation.correlation_id),
            )
            .await;
        self.tracker
            .update_status(&id, TransactionStatus::Finalized, StatusPatch::default())
            .await;

        Ok(TransferResult {
            id,
            source_tx_ref: attestation.correlation_id.clone(),
            target_tx_ref: attestation.correlation_id,
            settled_amount: transfer.settled_amount,
            min_amount_adjusted: transfer.min_amount_adjusted,
            lock_confirmations: 0,
        })
    }

    /// Submit through the breaker with bounded exponential backoff.
    /// An open breaker fails fast instead of burning the retry budget.
    async fn submit_with_retry(
        &self,
        client: &Arc<dyn ChainClient>,
        breaker: &Arc<CircuitBreaker>,
        tx: &ChainTransaction,
    ) -> BridgeResult<String> {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(400),
            randomization_factor: 0.1,
            multiplier: 2.0,
            max_interval: Duration::from_secs(10),
            max_elapsed_time: Some(self.config.submit_retry_max_elapsed),
            ..Default::default()
        };
        backoff::future::retry(backoff, || async {
            match breaker.call(|| client.submit_transaction(tx)).await {
                Ok(tx_ref) => {
                    self.metrics
                        .chain_rpc_queries
                        .with_label_values(&[tx.chain.as_str(), "submit_transaction"])
                        .inc();
                    Ok(tx_ref)
                }
                Err(e @ BridgeError::CircuitOpen { .. }) => Err(backoff::Error::permanent(e)),
                Err(e) => {
                    self.metrics
                        .chain_rpc_queries
                        .with_label_values(&[tx.chain.as_str(), "submit_transaction"])
                        .inc();
                    self.metrics
                        .chain_rpc_errors
                        .with_label_values(&[tx.chain.as_str(), "submit_transaction"])
                        .inc();
                    tracing::debug!("Submission to {} failed, retrying: {}", tx.chain, e);
                    Err(backoff::Error::transient(e))
                }
            }
        })
        .await
    }

    async fn fee_hint(
        &self,
        client: &Arc<dyn ChainClient>,
        breaker: &Arc<CircuitBreaker>,
    ) -> Option<FeeHint> {
        if let Some(advisor) = &self.fee_advisor {
            if let Ok(hint) = advisor
                .recommended_fee(client.chain(), FeeUrgency::Normal)
                .await
            {
                return Some(hint);
            }
        }
        // No advisor (or it failed): the chain client's own estimate
        breaker.call(|| client.estimate_fee()).await.ok()
    }

    fn policy_for(&self, chain: ChainId) -> ConfirmationPolicy {
        self.config
            .policies
            .get(&chain)
            .cloned()
            .unwrap_or_else(|| ConfirmationPolicy::default_for(chain))
    }

    async fn fail(&self, id: &str, error: &BridgeError) {
        self.tracker
            .update_status(
                id,
                TransactionStatus::Failed,
                StatusPatch::error(error.to_string()),
            )
            .await;
        let mut transfers = self.transfers.write().await;
        if let Some(transfer) = transfers.get_mut(id) {
            transfer.updated_at_ms = now_ms();
        }
    }

    async fn record_source_ref(&self, id: &str, tx_ref: &str) {
        let mut transfers = self.transfers.write().await;
        if let Some(transfer) = transfers.get_mut(id) {
            transfer.source_tx_ref = Some(tx_ref.to_string());
            transfer.updated_at_ms = now_ms();
        }
    }

    /// Debit the reserve for a transfer at most once. A transfer's steps
    /// run strictly sequentially on one task, so the `reserve_debited`
    /// flag makes a repeated release step a no-op instead of a
    /// double-debit.
    pub(crate) async fn debit_once(
        &self,
        id: &str,
        chain: ChainId,
        asset: &str,
        amount: u64,
        target_tx_ref: &str,
    ) -> BridgeResult<()> {
        {
            let transfers = self.transfers.read().await;
            if transfers.get(id).map(|t| t.reserve_debited).unwrap_or(false) {
                return Ok(());
            }
        }
        self.ledger.check_and_debit(chain, asset, amount).await?;
        let mut transfers = self.transfers.write().await;
        if let Some(transfer) = transfers.get_mut(id) {
            transfer.reserve_debited = true;
            transfer.target_tx_ref = Some(target_tx_ref.to_string());
            transfer.updated_at_ms = now_ms();
        }
        Ok(())
    }

    // ----- query surface -----

    /// Status view of one transfer for API/UI consumption
    pub async fn get_transfer_status(&self, id: &str) -> Option<StatusSummary> {
        self.tracker.status_summary(id).await
    }

    /// Full audit record of one transfer
    pub async fn get_transfer(&self, id: &str) -> Option<Transfer> {
        let transfers = self.transfers.read().await;
        transfers.get(id).cloned()
    }

    /// Reserve liquidity, optionally restricted to one chain
    pub async fn get_reserve_status(&self, chain: Option<ChainId>) -> Vec<ReserveStatus> {
        self.ledger.snapshot(chain).await
    }

    /// Breaker status by name, or all breakers
    pub fn get_circuit_breaker_status(&self, name: Option<&str>) -> Vec<CircuitBreakerStatus> {
        self.breakers.statuses(name)
    }

    /// Operator cancellation of a transfer that has not reached a
    /// terminal state
    pub async fn cancel_transfer(&self, id: &str) -> bool {
        self.tracker.cancel(id).await
    }
}
