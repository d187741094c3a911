// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use std::time::Duration;

pub const WEI_PER_GWEI: u128 = 1_000_000_000;

// =============================================================================
// RETRY & ESCALATION
// =============================================================================

pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Percent multiplier applied to the gas factor on each retry (100, 130, 169).
pub const GAS_ESCALATION_FACTOR: u64 = 130;

/// Ceiling for the escalation ladder. An uncapped ladder on a low-fee chain
/// burns sponsor balance against an opponent whose own tip is bounded.
pub const MAX_FEE_CAP_GWEI: u128 = 10;

// =============================================================================
// GAS LIMITS
// =============================================================================

/// Plain value transfer into an EOA.
pub const FUNDING_GAS_LIMIT_EOA: u64 = 21_000;

/// Value transfer into an EIP-7702 delegated account; the delegated code may
/// run on receive, so 21000 is not enough.
pub const FUNDING_GAS_LIMIT_DELEGATED: u64 = 100_000;

/// Fallback when `eth_estimateGas` refuses because the executor holds no
/// native balance yet. Covers a standard ERC-20 transfer.
pub const DEFAULT_TRANSFER_GAS: u64 = 65_000;

// =============================================================================
// GATEWAY TIMING
// =============================================================================

pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(1_500);
pub const RECEIPT_DEADLINE: Duration = Duration::from_secs(90);

/// Hard cap on a single private-endpoint broadcast. Keeps the detached
/// broadcast tasks bounded so draining them after an attempt cannot stall.
pub const PRIVATE_BROADCAST_TIMEOUT: Duration = Duration::from_millis(2_500);

pub const RPC_RETRY_ATTEMPTS: usize = 3;
pub const RPC_RETRY_DELAY: Duration = Duration::from_millis(100);

// =============================================================================
// LOGGING DEFAULTS
// =============================================================================

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub fn gwei_to_wei(gwei: f64) -> u128 {
    if gwei <= 0.0 {
        return 0;
    }
    (gwei * WEI_PER_GWEI as f64).round() as u128
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gwei_conversion_is_integer_wei() {
        assert_eq!(gwei_to_wei(1.0), 1_000_000_000);
        assert_eq!(gwei_to_wei(0.5), 500_000_000);
        assert_eq!(gwei_to_wei(0.0), 0);
        assert_eq!(gwei_to_wei(-3.0), 0);
    }
}
