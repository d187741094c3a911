// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::RescueError;
use crate::domain::types::SignedTx;
use alloy::consensus::{SignableTransaction, TxEip1559};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy_consensus::TxEnvelope;

/// Fully parametrized type-2 transaction. No defaults, no implicit type
/// selection; the planner fills every field explicitly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxTemplate {
    pub chain_id: u64,
    pub nonce: u64,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Pure signing: no network, deterministic for identical inputs.
pub fn sign_transaction(
    signer: &PrivateKeySigner,
    template: &TxTemplate,
) -> Result<SignedTx, RescueError> {
    let mut tx = TxEip1559 {
        chain_id: template.chain_id,
        nonce: template.nonce,
        max_priority_fee_per_gas: template.max_priority_fee_per_gas,
        max_fee_per_gas: template.max_fee_per_gas,
        gas_limit: template.gas_limit,
        to: TxKind::Call(template.to),
        value: template.value,
        access_list: Default::default(),
        input: template.data.clone(),
    };

    let sig = TxSignerSync::sign_transaction_sync(signer, &mut tx)
        .map_err(|e| RescueError::Signing(format!("EIP-1559 signing failed: {}", e)))?;
    let signed: TxEnvelope = tx.into_signed(sig).into();
    let raw = signed.encoded_2718();

    Ok(SignedTx {
        raw: raw.into(),
        hash: *signed.tx_hash(),
        nonce: template.nonce,
    })
}
