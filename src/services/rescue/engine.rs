// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::error::RescueError;
use crate::domain::types::{AttemptOutcome, SignedRescueBundle, SignedTx, TransferCall};
use crate::infrastructure::network::gateway::{ChainGateway, NonceTag, PrivateGateway};
use crate::services::rescue::planner::sign_transfer_set;
use alloy::primitives::{Bytes, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Result of a transfers-only wave: confirmed and failing entries are both
/// indexed by position in the submitted slice.
pub struct TransferWave {
    pub confirmed: Vec<(usize, B256)>,
    pub failing: Vec<(usize, String)>,
}

/// Drives one burst-submission attempt: staleness guard, fan-out to the
/// primary plus private endpoints, confirmation waits, and outcome
/// classification. The opponent holds the same key and watches the public
/// mempool, so the funding tx and its dependent transfers must enter
/// propagation within the same few milliseconds.
pub struct SubmissionEngine {
    primary: Arc<dyn ChainGateway>,
    private_rpcs: Vec<PrivateGateway>,
    executor: PrivateKeySigner,
    transfer_calls: Vec<TransferCall>,
}

impl SubmissionEngine {
    pub fn new(
        primary: Arc<dyn ChainGateway>,
        private_rpcs: Vec<PrivateGateway>,
        executor: PrivateKeySigner,
        transfer_calls: Vec<TransferCall>,
    ) -> Self {
        Self {
            primary,
            private_rpcs,
            executor,
            transfer_calls,
        }
    }

    /// One full attempt against a pre-signed bundle. The bundle is mutable
    /// because the staleness guard may re-sign the transfer set in place.
    pub async fn run_attempt(&self, bundle: &mut SignedRescueBundle) -> AttemptOutcome {
        let mut broadcasts = Vec::new();
        let outcome = self.attempt_inner(bundle, &mut broadcasts).await;
        // Detached private broadcasts are bounded by their own timeout;
        // draining them here keeps the task set tidy without letting their
        // results touch the outcome.
        join_all(broadcasts).await;
        outcome
    }

    /// Transfers-only wave for the partial-progress path. Never signs or
    /// submits a funding tx.
    pub async fn submit_transfers_only(&self, txs: &[SignedTx]) -> TransferWave {
        let mut broadcasts = Vec::new();
        let (accepted, refused) = self.submit_transfer_wave(txs, &mut broadcasts).await;
        let (confirmed, mut failing) = self.await_transfer_receipts(&accepted).await;
        failing.extend(refused);
        failing.sort_by_key(|(i, _)| *i);
        join_all(broadcasts).await;
        TransferWave { confirmed, failing }
    }

    async fn attempt_inner(
        &self,
        bundle: &mut SignedRescueBundle,
        broadcasts: &mut Vec<JoinHandle<()>>,
    ) -> AttemptOutcome {
        let executor_addr = self.executor.address();

        // Staleness guard: a sweep tx entering the pool after planning
        // consumes our base nonce and invalidates every signed transfer.
        // Re-sign the transfers against the live pending nonce, reusing the
        // attempt's fee quote. The funding tx is sponsor-keyed and unaffected.
        let observed = match self.primary.nonce_at(executor_addr, NonceTag::Pending).await {
            Ok(n) => n,
            Err(e) => {
                return AttemptOutcome::FundingFailed {
                    reason: format!("pre-submission nonce check failed: {}", e),
                }
            }
        };
        if observed != bundle.executor_nonce {
            tracing::warn!(
                target: "nonce_guard",
                expected = bundle.executor_nonce,
                observed,
                "Executor pending nonce moved since planning; re-signing transfers"
            );
            match sign_transfer_set(
                &self.executor,
                &self.transfer_calls,
                bundle.chain_id,
                observed,
                &bundle.fee_quote,
            ) {
                Ok(txs) => {
                    bundle.transfer_txs = txs;
                    bundle.executor_nonce = observed;
                }
                Err(e) => {
                    return AttemptOutcome::FundingFailed {
                        reason: format!("transfer re-sign failed: {}", e),
                    }
                }
            }
        }

        // Burst. Funding goes to every private endpoint first, then to the
        // primary, and only then do the transfers fan out. The primary must
        // see funding strictly before any transfer.
        self.spawn_private_broadcasts(&bundle.funding_tx.raw, "funding", broadcasts);
        let funding_hash = match self.primary.submit_raw(bundle.funding_tx.raw.clone()).await {
            Ok(hash) => {
                tracing::info!(
                    target: "sent",
                    tx = "funding",
                    hash = %format!("{:#x}", hash),
                    nonce = bundle.sponsor_nonce,
                    "Funding submitted to primary"
                );
                hash
            }
            Err(e) => {
                // Every transfer is discarded from the wait set: private
                // endpoints may hold copies, but their receipts are not
                // observable through this interface.
                return AttemptOutcome::SubmissionRefused {
                    reason: format!("funding refused by primary: {}", e),
                };
            }
        };

        let (accepted, refused) = self
            .submit_transfer_wave(&bundle.transfer_txs, broadcasts)
            .await;

        // Funding must land before anything else matters.
        let receipt = match self.primary.await_receipt(funding_hash, 1).await {
            Ok(r) => r,
            Err(RescueError::Timeout(reason)) => {
                return AttemptOutcome::Timeout {
                    reason: format!("funding not confirmed: {}", reason),
                }
            }
            Err(e) => {
                return AttemptOutcome::FundingFailed {
                    reason: format!("funding confirmation failed: {}", e),
                }
            }
        };
        if !receipt.status {
            return AttemptOutcome::FundingFailed {
                reason: format!("funding reverted in block {}", receipt.block_number),
            };
        }
        tracing::info!(
            target: "confirm",
            tx = "funding",
            hash = %format!("{:#x}", funding_hash),
            block = receipt.block_number,
            "Funding confirmed"
        );

        // Funded-enough check. A shortfall means the sweeper most likely
        // drained part of the funding; transfers may still clear against the
        // remainder, so this only warns.
        match self.primary.balance(executor_addr).await {
            Ok(balance) if balance < bundle.total_executor_gas_cost / U256::from(2) => {
                tracing::warn!(
                    target: "warning",
                    balance = %balance,
                    funded = %bundle.total_executor_gas_cost,
                    "Executor balance below half the funded amount; sweeper likely intercepted"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    target: "warning",
                    error = %e,
                    "Post-funding balance check failed; continuing"
                );
            }
        }

        let (confirmed, receipt_failures) = self.await_transfer_receipts(&accepted).await;

        let mut failing: Vec<(usize, String)> = refused;
        failing.extend(receipt_failures);
        failing.sort_by_key(|(i, _)| *i);

        if failing.is_empty() && confirmed.len() == bundle.transfer_txs.len() {
            let mut ordered = confirmed;
            ordered.sort_by_key(|(i, _)| *i);
            AttemptOutcome::Success {
                funding_hash: Some(funding_hash),
                transfer_hashes: ordered.into_iter().map(|(_, h)| h).collect(),
            }
        } else {
            let reason = failing
                .last()
                .map(|(i, msg)| format!("transfer[{}]: {}", i, msg))
                .unwrap_or_else(|| "transfer receipts missing".into());
            let mut ordered = confirmed;
            ordered.sort_by_key(|(i, _)| *i);
            AttemptOutcome::FundingLandedTransfersFailed {
                funding_hash,
                confirmed: ordered.into_iter().map(|(_, h)| h).collect(),
                failing: failing.iter().map(|(i, _)| *i).collect(),
                reason,
            }
        }
    }

    /// Fan the transfer set out: per tx, private broadcasts are spawned
    /// before the primary submission is issued, and the primary submissions
    /// run concurrently with each other. Refusals are recorded, not fatal.
    async fn submit_transfer_wave(
        &self,
        txs: &[SignedTx],
        broadcasts: &mut Vec<JoinHandle<()>>,
    ) -> (Vec<(usize, B256)>, Vec<(usize, String)>) {
        let mut submissions = Vec::with_capacity(txs.len());
        for (i, tx) in txs.iter().enumerate() {
            self.spawn_private_broadcasts(&tx.raw, &format!("transfer[{}]", i), broadcasts);
            let primary = self.primary.clone();
            let raw = tx.raw.clone();
            submissions.push(async move { (i, primary.submit_raw(raw).await) });
        }

        let mut accepted = Vec::new();
        let mut refused = Vec::new();
        for (i, result) in join_all(submissions).await {
            match result {
                Ok(hash) => {
                    tracing::info!(
                        target: "sent",
                        tx = %format!("transfer[{}]", i),
                        hash = %format!("{:#x}", hash),
                        "Transfer submitted to primary"
                    );
                    accepted.push((i, hash));
                }
                Err(e) => {
                    tracing::warn!(
                        target: "failed",
                        tx = %format!("transfer[{}]", i),
                        error = %e,
                        "Primary refused transfer; continuing with the rest"
                    );
                    refused.push((i, e.to_string()));
                }
            }
        }
        (accepted, refused)
    }

    /// Await all accepted transfers in parallel. A missing or timed-out
    /// receipt counts as a revert.
    async fn await_transfer_receipts(
        &self,
        accepted: &[(usize, B256)],
    ) -> (Vec<(usize, B256)>, Vec<(usize, String)>) {
        let waits = accepted.iter().map(|&(i, hash)| {
            let primary = self.primary.clone();
            async move { (i, hash, primary.await_receipt(hash, 1).await) }
        });

        let mut confirmed = Vec::new();
        let mut failing = Vec::new();
        for (i, hash, result) in join_all(waits).await {
            match result {
                Ok(receipt) if receipt.status => {
                    tracing::info!(
                        target: "confirm",
                        tx = %format!("transfer[{}]", i),
                        hash = %format!("{:#x}", hash),
                        block = receipt.block_number,
                        "Transfer confirmed"
                    );
                    confirmed.push((i, hash));
                }
                Ok(receipt) => {
                    tracing::warn!(
                        target: "failed",
                        tx = %format!("transfer[{}]", i),
                        hash = %format!("{:#x}", hash),
                        block = receipt.block_number,
                        "Transfer reverted"
                    );
                    failing.push((
                        i,
                        RescueError::Reverted {
                            hash: format!("{:#x}", hash),
                            block: receipt.block_number,
                        }
                        .to_string(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(
                        target: "failed",
                        tx = %format!("transfer[{}]", i),
                        hash = %format!("{:#x}", hash),
                        error = %e,
                        "Transfer receipt missing; treating as revert"
                    );
                    failing.push((i, e.to_string()));
                }
            }
        }
        (confirmed, failing)
    }

    fn spawn_private_broadcasts(
        &self,
        raw: &Bytes,
        label: &str,
        broadcasts: &mut Vec<JoinHandle<()>>,
    ) {
        for gateway in &self.private_rpcs {
            let gateway = gateway.clone();
            let raw = raw.clone();
            let label = label.to_string();
            broadcasts.push(tokio::spawn(async move {
                gateway.broadcast(raw, &label).await;
            }));
        }
    }
}
