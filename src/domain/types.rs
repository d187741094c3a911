// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::Serialize;

/// One token transfer the executor must emit. Immutable input to the core;
/// the calldata is already fully encoded by the collaborator.
#[derive(Clone, Debug)]
pub struct TransferCall {
    pub to: Address,
    pub calldata: Bytes,
    pub gas_limit: u64,
}

/// Per-attempt fee envelope, wei units throughout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeQuote {
    pub base_fee: u128,
    pub priority_fee: u128,
    pub max_fee: u128,
}

impl FeeQuote {
    /// The envelope must absorb one base-fee doubling between signing and
    /// inclusion.
    pub fn has_headroom(&self) -> bool {
        self.max_fee >= self.base_fee.saturating_mul(2).saturating_add(self.priority_fee)
    }
}

/// A signed, RLP-encoded type-2 transaction plus the metadata the engine
/// needs without re-decoding it.
#[derive(Clone, Debug)]
pub struct SignedTx {
    pub raw: Bytes,
    pub hash: B256,
    pub nonce: u64,
}

/// Everything one burst attempt submits, signed atomically against the
/// nonces observed at planning time.
#[derive(Clone, Debug)]
pub struct SignedRescueBundle {
    pub funding_tx: SignedTx,
    /// Same order as the input transfer calls, sequential executor nonces.
    pub transfer_txs: Vec<SignedTx>,
    pub fee_quote: FeeQuote,
    pub executor_nonce: u64,
    pub sponsor_nonce: u64,
    /// Value of the funding tx; retained for the funded-enough check.
    pub total_executor_gas_cost: U256,
    pub chain_id: u64,
}

impl SignedRescueBundle {
    /// Nonce layout invariant: transfer i sits at `executor_nonce + i` and
    /// the funding tx at the observed sponsor nonce.
    pub fn nonces_are_sequential(&self) -> bool {
        self.funding_tx.nonce == self.sponsor_nonce
            && self
                .transfer_txs
                .iter()
                .enumerate()
                .all(|(i, tx)| tx.nonce == self.executor_nonce + i as u64)
    }
}

/// Terminal state of a single submission attempt. The retry controller's
/// behavior is a total function of the variant.
#[derive(Clone, Debug)]
pub enum AttemptOutcome {
    Success {
        funding_hash: Option<B256>,
        transfer_hashes: Vec<B256>,
    },
    FundingFailed {
        reason: String,
    },
    FundingLandedTransfersFailed {
        funding_hash: B256,
        confirmed: Vec<B256>,
        /// Indexes into the original transfer-call list.
        failing: Vec<usize>,
        reason: String,
    },
    SubmissionRefused {
        reason: String,
    },
    Timeout {
        reason: String,
    },
}

/// Final report handed back to the caller and rendered by the CLI.
#[derive(Clone, Debug, Serialize)]
pub struct RescueResult {
    pub funding_hash: Option<B256>,
    pub transfer_hashes: Vec<B256>,
    pub success: bool,
    pub attempts: u32,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(nonce: u64) -> SignedTx {
        SignedTx {
            raw: Bytes::from(vec![0x02, nonce as u8]),
            hash: B256::with_last_byte(nonce as u8),
            nonce,
        }
    }

    #[test]
    fn sequential_nonce_invariant_holds() {
        let bundle = SignedRescueBundle {
            funding_tx: tx(5),
            transfer_txs: vec![tx(0), tx(1), tx(2)],
            fee_quote: FeeQuote {
                base_fee: 1,
                priority_fee: 1,
                max_fee: 3,
            },
            executor_nonce: 0,
            sponsor_nonce: 5,
            total_executor_gas_cost: U256::from(1u64),
            chain_id: 1,
        };
        assert!(bundle.nonces_are_sequential());

        let mut gapped = bundle.clone();
        gapped.transfer_txs[2] = tx(7);
        assert!(!gapped.nonces_are_sequential());
    }

    #[test]
    fn fee_quote_headroom_boundary() {
        let quote = FeeQuote {
            base_fee: 10,
            priority_fee: 3,
            max_fee: 23,
        };
        assert!(quote.has_headroom());
        let thin = FeeQuote {
            base_fee: 10,
            priority_fee: 3,
            max_fee: 22,
        };
        assert!(!thin.has_headroom());
    }
}
