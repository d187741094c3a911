// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::retry::retry_async;
use crate::domain::constants::{
    PRIVATE_BROADCAST_TIMEOUT, RECEIPT_DEADLINE, RECEIPT_POLL_INTERVAL, RPC_RETRY_ATTEMPTS,
    RPC_RETRY_DELAY,
};
use crate::domain::error::RescueError;
use crate::infrastructure::network::provider::{connect_http, HttpProvider};
use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use alloy::providers::Provider;
use alloy::rpc::types::eth::{TransactionInput, TransactionRequest};
use alloy::rpc::types::BlockNumberOrTag;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NonceTag {
    Latest,
    /// Reflects transactions the endpoint has accepted into its pool,
    /// including anything the sweeper already has in flight.
    Pending,
}

#[derive(Clone, Copy, Debug)]
pub struct BlockHeader {
    pub number: u64,
    pub base_fee_per_gas: u128,
}

#[derive(Clone, Copy, Debug)]
pub struct TxReceipt {
    pub block_number: u64,
    pub gas_used: u64,
    pub status: bool,
}

/// Uniform view over one JSON-RPC endpoint. Object-safe so the engine can
/// hold a primary and any number of secondaries behind the same interface,
/// and so tests can script one.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    async fn latest_block(&self) -> Result<BlockHeader, RescueError>;

    async fn chain_id(&self) -> Result<u64, RescueError>;

    async fn nonce_at(&self, address: Address, tag: NonceTag) -> Result<u64, RescueError>;

    async fn balance(&self, address: Address) -> Result<U256, RescueError>;

    async fn code(&self, address: Address) -> Result<Bytes, RescueError>;

    async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
    ) -> Result<u64, RescueError>;

    /// Non-blocking on inclusion: returns once the pool accepts or rejects.
    async fn submit_raw(&self, raw: Bytes) -> Result<B256, RescueError>;

    async fn await_receipt(
        &self,
        hash: B256,
        confirmations: u64,
    ) -> Result<TxReceipt, RescueError>;
}

/// `ChainGateway` over an alloy HTTP provider with bounded retries on reads.
#[derive(Clone)]
pub struct RpcGateway {
    provider: HttpProvider,
    endpoint: String,
    receipt_poll: Duration,
    receipt_deadline: Duration,
}

impl RpcGateway {
    pub fn new(provider: HttpProvider, endpoint: impl Into<String>) -> Self {
        Self {
            provider,
            endpoint: endpoint.into(),
            receipt_poll: RECEIPT_POLL_INTERVAL,
            receipt_deadline: RECEIPT_DEADLINE,
        }
    }

    pub fn connect(rpc_url: &str) -> Result<Self, RescueError> {
        Ok(Self::new(connect_http(rpc_url)?, rpc_url))
    }

    pub fn with_receipt_timing(mut self, poll: Duration, deadline: Duration) -> Self {
        self.receipt_poll = poll;
        self.receipt_deadline = deadline;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChainGateway for RpcGateway {
    async fn latest_block(&self) -> Result<BlockHeader, RescueError> {
        let number = {
            let provider = self.provider.clone();
            retry_async(
                move |_| {
                    let provider = provider.clone();
                    async move { provider.get_block_number().await }
                },
                RPC_RETRY_ATTEMPTS,
                RPC_RETRY_DELAY,
            )
            .await
            .map_err(|e| RescueError::Connection(format!("Block number fetch failed: {}", e)))?
        };

        let provider = self.provider.clone();
        let history = retry_async(
            move |_| {
                let provider = provider.clone();
                async move {
                    provider
                        .get_fee_history(1, BlockNumberOrTag::Latest, &[])
                        .await
                }
            },
            RPC_RETRY_ATTEMPTS,
            RPC_RETRY_DELAY,
        )
        .await
        .map_err(|e| RescueError::Connection(format!("Fee history fetch failed: {}", e)))?;

        let base_fee_per_gas = history
            .base_fee_per_gas
            .first()
            .copied()
            .ok_or_else(|| RescueError::Connection("Fee history returned no base fee".into()))?;

        Ok(BlockHeader {
            number,
            base_fee_per_gas,
        })
    }

    async fn chain_id(&self) -> Result<u64, RescueError> {
        let provider = self.provider.clone();
        retry_async(
            move |_| {
                let provider = provider.clone();
                async move { provider.get_chain_id().await }
            },
            RPC_RETRY_ATTEMPTS,
            RPC_RETRY_DELAY,
        )
        .await
        .map_err(|e| RescueError::Connection(format!("Chain id fetch failed: {}", e)))
    }

    async fn nonce_at(&self, address: Address, tag: NonceTag) -> Result<u64, RescueError> {
        let provider = self.provider.clone();
        retry_async(
            move |_| {
                let provider = provider.clone();
                async move {
                    let call = provider.get_transaction_count(address);
                    match tag {
                        NonceTag::Latest => call.latest().await,
                        NonceTag::Pending => call.pending().await,
                    }
                }
            },
            RPC_RETRY_ATTEMPTS,
            RPC_RETRY_DELAY,
        )
        .await
        .map_err(|e| RescueError::Connection(format!("Nonce fetch failed: {}", e)))
    }

    async fn balance(&self, address: Address) -> Result<U256, RescueError> {
        let provider = self.provider.clone();
        retry_async(
            move |_| {
                let provider = provider.clone();
                async move { provider.get_balance(address).await }
            },
            RPC_RETRY_ATTEMPTS,
            RPC_RETRY_DELAY,
        )
        .await
        .map_err(|e| RescueError::Connection(format!("Balance fetch failed: {}", e)))
    }

    async fn code(&self, address: Address) -> Result<Bytes, RescueError> {
        let provider = self.provider.clone();
        retry_async(
            move |_| {
                let provider = provider.clone();
                async move { provider.get_code_at(address).await }
            },
            RPC_RETRY_ATTEMPTS,
            RPC_RETRY_DELAY,
        )
        .await
        .map_err(|e| RescueError::Connection(format!("Code fetch failed: {}", e)))
    }

    async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
    ) -> Result<u64, RescueError> {
        let req = TransactionRequest {
            from: Some(from),
            to: Some(TxKind::Call(to)),
            input: TransactionInput::new(data),
            ..Default::default()
        };
        self.provider
            .estimate_gas(req)
            .await
            .map_err(|e| RescueError::Connection(format!("Gas estimation failed: {}", e)))
    }

    async fn submit_raw(&self, raw: Bytes) -> Result<B256, RescueError> {
        // No retry wrapper: a replayed raw tx either dupes (harmless) or the
        // pool state has moved and the caller must re-plan, not re-send.
        let pending = self
            .provider
            .send_raw_transaction(raw.as_ref())
            .await
            .map_err(|e| RescueError::SubmissionRefused(e.to_string()))?;
        Ok(*pending.tx_hash())
    }

    async fn await_receipt(
        &self,
        hash: B256,
        confirmations: u64,
    ) -> Result<TxReceipt, RescueError> {
        let deadline = Instant::now() + self.receipt_deadline;
        loop {
            if let Some(rcpt) = self
                .provider
                .get_transaction_receipt(hash)
                .await
                .map_err(|e| RescueError::Connection(format!("Receipt fetch failed: {}", e)))?
            {
                let block_number = rcpt.block_number.unwrap_or_default();
                if confirmations > 1 {
                    self.wait_for_depth(block_number, confirmations, deadline)
                        .await?;
                }
                return Ok(TxReceipt {
                    block_number,
                    gas_used: rcpt.gas_used,
                    status: rcpt.status(),
                });
            }

            if Instant::now() >= deadline {
                return Err(RescueError::Timeout(format!(
                    "No receipt for {:#x} within {:?}",
                    hash, self.receipt_deadline
                )));
            }
            sleep(self.receipt_poll).await;
        }
    }
}

impl RpcGateway {
    async fn wait_for_depth(
        &self,
        included_at: u64,
        confirmations: u64,
        deadline: Instant,
    ) -> Result<(), RescueError> {
        let target = included_at.saturating_add(confirmations.saturating_sub(1));
        loop {
            let head = self
                .provider
                .get_block_number()
                .await
                .map_err(|e| RescueError::Connection(format!("Block number fetch failed: {}", e)))?;
            if head >= target {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(RescueError::Timeout(format!(
                    "Confirmation depth {} not reached within {:?}",
                    confirmations, self.receipt_deadline
                )));
            }
            sleep(self.receipt_poll).await;
        }
    }
}

/// A gateway used in fire-and-forget mode. Broadcast errors are logged and
/// swallowed; it never participates in receipt waits.
#[derive(Clone)]
pub struct PrivateGateway {
    inner: Arc<dyn ChainGateway>,
    endpoint: String,
}

impl PrivateGateway {
    pub fn new(inner: Arc<dyn ChainGateway>, endpoint: impl Into<String>) -> Self {
        Self {
            inner,
            endpoint: endpoint.into(),
        }
    }

    pub fn connect(rpc_url: &str) -> Result<Self, RescueError> {
        Ok(Self::new(Arc::new(RpcGateway::connect(rpc_url)?), rpc_url))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn broadcast(&self, raw: Bytes, label: &str) {
        match timeout(PRIVATE_BROADCAST_TIMEOUT, self.inner.submit_raw(raw)).await {
            Ok(Ok(hash)) => {
                tracing::info!(
                    target: "private_rpc",
                    endpoint = %self.endpoint,
                    tx = label,
                    hash = %format!("{:#x}", hash),
                    "Private broadcast accepted"
                );
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    target: "private_rpc",
                    endpoint = %self.endpoint,
                    tx = label,
                    error = %e,
                    "Private broadcast rejected; continuing"
                );
            }
            Err(_) => {
                tracing::warn!(
                    target: "private_rpc",
                    endpoint = %self.endpoint,
                    tx = label,
                    "Private broadcast timed out; continuing"
                );
            }
        }
    }
}
