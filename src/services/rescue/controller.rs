// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::{GAS_ESCALATION_FACTOR, MAX_RETRY_ATTEMPTS};
use crate::domain::error::RescueError;
use crate::domain::types::{AttemptOutcome, RescueResult, TransferCall};
use crate::infrastructure::network::gateway::{ChainGateway, NonceTag, PrivateGateway};
use crate::services::rescue::engine::SubmissionEngine;
use crate::services::rescue::planner::{sign_transfer_set, BundlePlanner};
use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use std::sync::Arc;

/// Everything the orchestrator needs for one invocation. Every tunable is a
/// parameter; nothing is read from the environment in here.
pub struct RescueRequest {
    pub executor: PrivateKeySigner,
    pub sponsor: PrivateKeySigner,
    pub recipient: Address,
    pub transfer_calls: Vec<TransferCall>,
    /// Wei per gas.
    pub priority_fee: u128,
    /// Wei per gas, pre-escalation.
    pub max_fee: u128,
    /// True when the executor carries EIP-7702 delegated code.
    pub executor_is_contract: bool,
}

/// Entry point: plan, burst, and retry until the tokens are out or the
/// budget is exhausted.
pub async fn rescue(
    primary: Arc<dyn ChainGateway>,
    private_rpcs: Vec<PrivateGateway>,
    request: RescueRequest,
) -> RescueResult {
    tracing::info!(
        target: "plan",
        transfers = request.transfer_calls.len(),
        recipient = %format!("{:#x}", request.recipient),
        executor = %format!("{:#x}", request.executor.address()),
        sponsor = %format!("{:#x}", request.sponsor.address()),
        private_endpoints = private_rpcs.len(),
        "Rescue starting"
    );

    let planner = BundlePlanner::new(
        primary.clone(),
        request.sponsor.clone(),
        request.executor.clone(),
        request.priority_fee,
        request.max_fee,
        request.executor_is_contract,
    );
    let engine = SubmissionEngine::new(
        primary.clone(),
        private_rpcs,
        request.executor.clone(),
        request.transfer_calls.clone(),
    );

    RetryController {
        primary,
        planner,
        engine,
        executor: request.executor,
        transfer_calls: request.transfer_calls,
    }
    .run()
    .await
}

/// Next rung of the escalation ladder, integer percent: 100, 130, 169, …
fn escalated(gas_factor: u64) -> u64 {
    gas_factor * GAS_ESCALATION_FACTOR / 100
}

struct RetryController {
    primary: Arc<dyn ChainGateway>,
    planner: BundlePlanner,
    engine: SubmissionEngine,
    executor: PrivateKeySigner,
    transfer_calls: Vec<TransferCall>,
}

impl RetryController {
    async fn run(self) -> RescueResult {
        let mut gas_factor: u64 = 100;
        let mut last_error: Option<String> = None;
        let mut observed_funding: Option<B256> = None;
        let mut observed_transfers: Vec<B256> = Vec::new();

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            if attempt > 1 {
                gas_factor = escalated(gas_factor);
                tracing::info!(
                    target: "retry",
                    attempt,
                    gas_factor,
                    "Re-planning with escalated gas"
                );
            }

            let mut bundle = match self.planner.plan(&self.transfer_calls, gas_factor).await {
                Ok(bundle) => bundle,
                Err(e) => {
                    tracing::warn!(target: "failed", attempt, error = %e, "Planning failed");
                    last_error = Some(e.to_string());
                    continue;
                }
            };

            match self.engine.run_attempt(&mut bundle).await {
                AttemptOutcome::Success {
                    funding_hash,
                    transfer_hashes,
                } => {
                    tracing::info!(
                        target: "success",
                        attempt,
                        transfers = transfer_hashes.len(),
                        "All transfers confirmed"
                    );
                    return RescueResult {
                        funding_hash,
                        transfer_hashes,
                        success: true,
                        attempts: attempt,
                        last_error: None,
                    };
                }
                AttemptOutcome::FundingLandedTransfersFailed {
                    funding_hash,
                    confirmed,
                    failing,
                    reason,
                } => {
                    observed_funding = Some(funding_hash);
                    observed_transfers.extend(confirmed.iter().copied());
                    last_error = Some(reason.clone());
                    tracing::warn!(
                        target: "failed",
                        attempt,
                        failing = failing.len(),
                        reason = %reason,
                        "Funding landed but transfers did not"
                    );

                    // Fast path: the funding already sits as executor
                    // balance, so only the transfers need another shot, at
                    // the next rung of the ladder.
                    if attempt < MAX_RETRY_ATTEMPTS {
                        match self
                            .partial_progress(gas_factor, bundle.chain_id, &failing)
                            .await
                        {
                            Ok(hashes) => {
                                observed_transfers.extend(hashes);
                                tracing::info!(
                                    target: "success",
                                    attempts = attempt + 1,
                                    "Remaining transfers confirmed on transfers-only re-send"
                                );
                                return RescueResult {
                                    funding_hash: Some(funding_hash),
                                    transfer_hashes: observed_transfers,
                                    success: true,
                                    attempts: attempt + 1,
                                    last_error: None,
                                };
                            }
                            Err(reason) => {
                                tracing::warn!(
                                    target: "failed",
                                    attempt,
                                    reason = %reason,
                                    "Transfers-only re-send failed; falling back to full re-plan"
                                );
                                last_error = Some(reason);
                            }
                        }
                    }
                }
                AttemptOutcome::FundingFailed { reason }
                | AttemptOutcome::SubmissionRefused { reason }
                | AttemptOutcome::Timeout { reason } => {
                    tracing::warn!(target: "failed", attempt, reason = %reason, "Attempt failed");
                    last_error = Some(reason);
                }
            }
        }

        tracing::error!(
            target: "failed",
            attempts = MAX_RETRY_ATTEMPTS,
            last_error = %last_error.as_deref().unwrap_or("unknown"),
            "Retry budget exhausted"
        );
        RescueResult {
            funding_hash: observed_funding,
            transfer_hashes: observed_transfers,
            success: false,
            attempts: MAX_RETRY_ATTEMPTS,
            last_error,
        }
    }

    /// Re-sign only the failed transfers against the live pending nonce with
    /// one extra escalation step, and burst just those. No funding tx is
    /// signed or submitted on this path.
    async fn partial_progress(
        &self,
        gas_factor: u64,
        chain_id: u64,
        failing: &[usize],
    ) -> Result<Vec<B256>, String> {
        if failing.is_empty() {
            return Err("no failing transfers to re-send".into());
        }

        let sub_factor = escalated(gas_factor);
        let quote = self
            .planner
            .fee_quote(sub_factor)
            .await
            .map_err(|e| format!("re-quote failed: {}", e))?;

        let base_nonce = self
            .primary
            .nonce_at(self.executor.address(), NonceTag::Pending)
            .await
            .map_err(|e: RescueError| format!("pending nonce refresh failed: {}", e))?;

        let failing_calls: Vec<TransferCall> = failing
            .iter()
            .map(|&i| self.transfer_calls[i].clone())
            .collect();
        let txs = sign_transfer_set(&self.executor, &failing_calls, chain_id, base_nonce, &quote)
            .map_err(|e| format!("re-sign failed: {}", e))?;

        tracing::info!(
            target: "retry",
            transfers = txs.len(),
            gas_factor = sub_factor,
            base_nonce,
            "Transfers-only re-send with escalated fee"
        );

        let wave = self.engine.submit_transfers_only(&txs).await;
        if wave.failing.is_empty() && wave.confirmed.len() == failing.len() {
            let mut ordered = wave.confirmed;
            ordered.sort_by_key(|(i, _)| *i);
            Ok(ordered.into_iter().map(|(_, h)| h).collect())
        } else {
            let detail = wave
                .failing
                .last()
                .map(|(i, msg)| format!("transfer[{}]: {}", failing.get(*i).copied().unwrap_or(*i), msg))
                .unwrap_or_else(|| "receipts missing".into());
            Err(detail)
        }
    }
}
