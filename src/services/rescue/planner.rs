// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants::{
    FUNDING_GAS_LIMIT_DELEGATED, FUNDING_GAS_LIMIT_EOA, MAX_FEE_CAP_GWEI, WEI_PER_GWEI,
};
use crate::domain::error::RescueError;
use crate::domain::types::{FeeQuote, SignedRescueBundle, SignedTx, TransferCall};
use crate::infrastructure::network::gateway::{ChainGateway, NonceTag};
use crate::services::rescue::signing::{sign_transaction, TxTemplate};
use alloy::primitives::U256;
use alloy::signers::local::PrivateKeySigner;
use std::sync::Arc;

/// Scale-then-cap-then-floor fee arithmetic, integer wei throughout.
///
/// The cap bounds the escalation ladder: we out-tip typical sweepers, we do
/// not out-bid unbounded ones. The floor keeps the envelope includable
/// through one base-fee doubling between signing and inclusion.
pub fn effective_max_fee(
    base_fee: u128,
    priority_fee: u128,
    configured_max_fee: u128,
    gas_factor: u64,
) -> u128 {
    let scaled = configured_max_fee.saturating_mul(gas_factor as u128) / 100;
    let capped = scaled.min(MAX_FEE_CAP_GWEI * WEI_PER_GWEI);
    capped.max(base_fee.saturating_mul(2).saturating_add(priority_fee))
}

/// Reads chain state once per attempt and produces a fully signed bundle:
/// one sponsor-funded value transfer plus the executor's transfer txs at
/// sequential pending nonces.
pub struct BundlePlanner {
    gateway: Arc<dyn ChainGateway>,
    sponsor: PrivateKeySigner,
    executor: PrivateKeySigner,
    priority_fee: u128,
    max_fee: u128,
    executor_is_contract: bool,
}

impl BundlePlanner {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        sponsor: PrivateKeySigner,
        executor: PrivateKeySigner,
        priority_fee: u128,
        max_fee: u128,
        executor_is_contract: bool,
    ) -> Self {
        Self {
            gateway,
            sponsor,
            executor,
            priority_fee,
            max_fee,
            executor_is_contract,
        }
    }

    pub fn funding_gas_limit(&self) -> u64 {
        if self.executor_is_contract {
            FUNDING_GAS_LIMIT_DELEGATED
        } else {
            FUNDING_GAS_LIMIT_EOA
        }
    }

    /// Quote fees for one attempt at the given escalation factor (percent).
    pub async fn fee_quote(&self, gas_factor: u64) -> Result<FeeQuote, RescueError> {
        let block = self
            .gateway
            .latest_block()
            .await
            .map_err(|e| RescueError::Planning(format!("base fee read failed: {}", e)))?;
        Ok(FeeQuote {
            base_fee: block.base_fee_per_gas,
            priority_fee: self.priority_fee,
            max_fee: effective_max_fee(
                block.base_fee_per_gas,
                self.priority_fee,
                self.max_fee,
                gas_factor,
            ),
        })
    }

    pub async fn plan(
        &self,
        calls: &[TransferCall],
        gas_factor: u64,
    ) -> Result<SignedRescueBundle, RescueError> {
        if calls.is_empty() {
            return Err(RescueError::Planning("no transfer calls to plan".into()));
        }

        let (quote, chain_id) = tokio::try_join!(self.fee_quote(gas_factor), async {
            self.gateway
                .chain_id()
                .await
                .map_err(|e| RescueError::Planning(format!("chain id read failed: {}", e)))
        })?;

        // Pending tag on both: a sweep attempt may already sit in the pool,
        // and our transfers must queue behind it rather than collide with it.
        let executor_addr = self.executor.address();
        let sponsor_addr = self.sponsor.address();
        let (sponsor_nonce, executor_nonce) = tokio::try_join!(
            async {
                self.gateway
                    .nonce_at(sponsor_addr, NonceTag::Pending)
                    .await
                    .map_err(|e| RescueError::Planning(format!("sponsor nonce failed: {}", e)))
            },
            async {
                self.gateway
                    .nonce_at(executor_addr, NonceTag::Pending)
                    .await
                    .map_err(|e| RescueError::Planning(format!("executor nonce failed: {}", e)))
            }
        )?;

        let total_executor_gas: u64 = calls.iter().map(|c| c.gas_limit).sum();
        let funding_value = U256::from(total_executor_gas) * U256::from(quote.max_fee);

        let funding_tx = sign_transaction(
            &self.sponsor,
            &TxTemplate {
                chain_id,
                nonce: sponsor_nonce,
                to: executor_addr,
                value: funding_value,
                data: Default::default(),
                gas_limit: self.funding_gas_limit(),
                max_fee_per_gas: quote.max_fee,
                max_priority_fee_per_gas: quote.priority_fee,
            },
        )?;

        let transfer_txs = sign_transfer_set(
            &self.executor,
            calls,
            chain_id,
            executor_nonce,
            &quote,
        )?;

        tracing::info!(
            target: "plan",
            gas_factor,
            base_fee = quote.base_fee,
            max_fee = quote.max_fee,
            priority_fee = quote.priority_fee,
            funding_value = %funding_value,
            sponsor_nonce,
            executor_nonce,
            transfers = calls.len(),
            "Bundle planned"
        );

        Ok(SignedRescueBundle {
            funding_tx,
            transfer_txs,
            fee_quote: quote,
            executor_nonce,
            sponsor_nonce,
            total_executor_gas_cost: funding_value,
            chain_id,
        })
    }

    /// Collaborator pre-flight: refuse before the orchestrator runs when the
    /// sponsor cannot cover funding value plus the funding tx's own gas.
    pub async fn ensure_sponsor_funded(
        &self,
        calls: &[TransferCall],
        gas_factor: u64,
    ) -> Result<(), RescueError> {
        let quote = self.fee_quote(gas_factor).await?;
        let total_executor_gas: u64 = calls.iter().map(|c| c.gas_limit).sum();
        let funding_value = U256::from(total_executor_gas) * U256::from(quote.max_fee);
        let funding_gas_cost = U256::from(self.funding_gas_limit()) * U256::from(quote.max_fee);
        let required = funding_value + funding_gas_cost;

        let available = self
            .gateway
            .balance(self.sponsor.address())
            .await
            .map_err(|e| RescueError::Planning(format!("sponsor balance read failed: {}", e)))?;

        if available < required {
            return Err(RescueError::InsufficientFunds {
                required: required.to_string(),
                available: available.to_string(),
            });
        }
        Ok(())
    }
}

/// Sign the transfer set at sequential nonces starting from `base_nonce`,
/// in input order. Shared by the planner and the engine's staleness guard.
pub fn sign_transfer_set(
    executor: &PrivateKeySigner,
    calls: &[TransferCall],
    chain_id: u64,
    base_nonce: u64,
    quote: &FeeQuote,
) -> Result<Vec<SignedTx>, RescueError> {
    calls
        .iter()
        .enumerate()
        .map(|(i, call)| {
            sign_transaction(
                executor,
                &TxTemplate {
                    chain_id,
                    nonce: base_nonce + i as u64,
                    to: call.to,
                    value: U256::ZERO,
                    data: call.calldata.clone(),
                    gas_limit: call.gas_limit,
                    max_fee_per_gas: quote.max_fee,
                    max_priority_fee_per_gas: quote.priority_fee,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::gwei_to_wei;
    use crate::infrastructure::network::gateway::{BlockHeader, TxReceipt};
    use alloy::primitives::{Address, Bytes, B256};
    use async_trait::async_trait;

    struct StaticGateway {
        base_fee: u128,
        sponsor_nonce: u64,
        executor_nonce: u64,
    }

    #[async_trait]
    impl ChainGateway for StaticGateway {
        async fn latest_block(&self) -> Result<BlockHeader, RescueError> {
            Ok(BlockHeader {
                number: 100,
                base_fee_per_gas: self.base_fee,
            })
        }
        async fn chain_id(&self) -> Result<u64, RescueError> {
            Ok(10)
        }
        async fn nonce_at(&self, addr: Address, tag: NonceTag) -> Result<u64, RescueError> {
            assert_eq!(tag, NonceTag::Pending);
            // Sponsor and executor are distinguished by the caller's key.
            if addr == test_key(1).address() {
                Ok(self.sponsor_nonce)
            } else {
                Ok(self.executor_nonce)
            }
        }
        async fn balance(&self, _: Address) -> Result<U256, RescueError> {
            Ok(U256::from(10u64).pow(U256::from(18u64)))
        }
        async fn code(&self, _: Address) -> Result<Bytes, RescueError> {
            Ok(Bytes::new())
        }
        async fn estimate_gas(&self, _: Address, _: Address, _: Bytes) -> Result<u64, RescueError> {
            Ok(60_000)
        }
        async fn submit_raw(&self, _: Bytes) -> Result<B256, RescueError> {
            unreachable!("planner never submits")
        }
        async fn await_receipt(&self, _: B256, _: u64) -> Result<TxReceipt, RescueError> {
            unreachable!("planner never waits")
        }
    }

    fn test_key(which: u8) -> PrivateKeySigner {
        let mut raw = [0u8; 32];
        raw[31] = which;
        PrivateKeySigner::from_bytes(&raw.into()).expect("valid key")
    }

    fn calls(n: usize) -> Vec<TransferCall> {
        (0..n)
            .map(|i| TransferCall {
                to: Address::with_last_byte(i as u8 + 1),
                calldata: Bytes::from(vec![0xa9, 0x05, 0x9c, 0xbb, i as u8]),
                gas_limit: 65_000,
            })
            .collect()
    }

    fn planner(gateway: StaticGateway) -> BundlePlanner {
        BundlePlanner::new(
            Arc::new(gateway),
            test_key(1),
            test_key(2),
            gwei_to_wei(1.0),
            gwei_to_wei(2.0),
            false,
        )
    }

    #[test]
    fn fee_scaling_is_integer_and_capped() {
        let gwei = WEI_PER_GWEI;
        // 2 gwei * 130% = 2.6 gwei, above the floor.
        assert_eq!(effective_max_fee(0, 0, 2 * gwei, 130), 2_600_000_000);
        // Ladder runs into the 10 gwei cap.
        assert_eq!(effective_max_fee(0, 0, 9 * gwei, 130), 10 * gwei);
        // Floor: base_fee*2 + priority dominates a low configured max.
        assert_eq!(
            effective_max_fee(6 * gwei, gwei, 2 * gwei, 100),
            13 * gwei
        );
    }

    #[test]
    fn fee_floor_always_satisfied() {
        for base in [0u128, 1, 20_000_000, 5_000_000_000] {
            for factor in [100u64, 130, 169] {
                let fee = effective_max_fee(base, WEI_PER_GWEI, 2 * WEI_PER_GWEI, factor);
                assert!(fee >= base * 2 + WEI_PER_GWEI);
            }
        }
    }

    #[tokio::test]
    async fn plan_assigns_sequential_executor_nonces() {
        let planner = planner(StaticGateway {
            base_fee: 20_000_000,
            sponsor_nonce: 5,
            executor_nonce: 3,
        });
        let bundle = planner.plan(&calls(4), 100).await.expect("plan");

        assert!(bundle.nonces_are_sequential());
        let nonces: Vec<u64> = bundle.transfer_txs.iter().map(|t| t.nonce).collect();
        assert_eq!(nonces, vec![3, 4, 5, 6]);
        assert_eq!(bundle.funding_tx.nonce, 5);
        assert_eq!(bundle.chain_id, 10);
    }

    #[tokio::test]
    async fn funding_value_covers_total_transfer_gas() {
        let planner = planner(StaticGateway {
            base_fee: 20_000_000,
            sponsor_nonce: 0,
            executor_nonce: 0,
        });
        let bundle = planner.plan(&calls(3), 100).await.expect("plan");

        let expected =
            U256::from(3u64 * 65_000) * U256::from(bundle.fee_quote.max_fee);
        assert_eq!(bundle.total_executor_gas_cost, expected);
        assert!(bundle.fee_quote.has_headroom());
    }

    #[tokio::test]
    async fn empty_call_list_is_a_planning_error() {
        let planner = planner(StaticGateway {
            base_fee: 1,
            sponsor_nonce: 0,
            executor_nonce: 0,
        });
        let err = planner.plan(&[], 100).await.expect_err("must fail");
        assert!(matches!(err, RescueError::Planning(_)));
    }

    #[tokio::test]
    async fn delegated_executor_gets_larger_funding_gas() {
        let planner = BundlePlanner::new(
            Arc::new(StaticGateway {
                base_fee: 1,
                sponsor_nonce: 0,
                executor_nonce: 0,
            }),
            test_key(1),
            test_key(2),
            gwei_to_wei(1.0),
            gwei_to_wei(2.0),
            true,
        );
        assert_eq!(planner.funding_gas_limit(), FUNDING_GAS_LIMIT_DELEGATED);
    }
}
