// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants::DEFAULT_TRANSFER_GAS;
use crate::domain::error::RescueError;
use crate::domain::types::TransferCall;
use crate::infrastructure::network::gateway::ChainGateway;
use crate::infrastructure::network::provider::HttpProvider;
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy_sol_types::SolCall;

sol! {
    #[sol(rpc)]
    contract IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

#[derive(Clone, Debug)]
pub struct TokenPosition {
    pub token: Address,
    pub symbol: String,
    pub decimals: u8,
    pub balance: U256,
}

/// Read one token's balance and metadata for the compromised account.
/// Returns `None` for empty positions so the caller can skip them.
pub async fn discover_position(
    provider: &HttpProvider,
    token: Address,
    holder: Address,
) -> Result<Option<TokenPosition>, RescueError> {
    let contract = IERC20::new(token, provider.clone());

    let balance = contract
        .balanceOf(holder)
        .call()
        .await
        .map_err(|e| RescueError::Connection(format!("balanceOf({:#x}) failed: {}", token, e)))?;
    if balance.is_zero() {
        tracing::info!(
            target: "plan",
            token = %format!("{:#x}", token),
            "Token balance is zero; skipping"
        );
        return Ok(None);
    }

    // Metadata is cosmetic; tokens with nonstandard or missing fields still
    // get rescued.
    let symbol = contract
        .symbol()
        .call()
        .await
        .unwrap_or_else(|_| "UNKNOWN".to_string());
    let decimals = contract.decimals().call().await.unwrap_or(18);

    Ok(Some(TokenPosition {
        token,
        symbol,
        decimals,
        balance,
    }))
}

/// ABI-encode `transfer(recipient, amount)`.
pub fn encode_transfer(recipient: Address, amount: U256) -> Bytes {
    IERC20::transferCall {
        to: recipient,
        amount,
    }
    .abi_encode()
    .into()
}

/// Build the transfer-call input for one position: encoded calldata plus a
/// gas limit from `eth_estimateGas`. Nodes commonly refuse to estimate for a
/// sender with no native balance, so estimation failure falls back to a
/// conservative default instead of aborting.
pub async fn build_transfer_call(
    gateway: &dyn ChainGateway,
    position: &TokenPosition,
    executor: Address,
    recipient: Address,
) -> TransferCall {
    let calldata = encode_transfer(recipient, position.balance);

    let gas_limit = match gateway
        .estimate_gas(executor, position.token, calldata.clone())
        .await
    {
        Ok(gas) => gas,
        Err(e) => {
            tracing::warn!(
                target: "plan",
                token = %format!("{:#x}", position.token),
                error = %e,
                fallback = DEFAULT_TRANSFER_GAS,
                "Gas estimation refused; using default transfer gas"
            );
            DEFAULT_TRANSFER_GAS
        }
    };

    TransferCall {
        to: position.token,
        calldata,
        gas_limit,
    }
}
