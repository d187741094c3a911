// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RescueError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection failed to endpoint: {0}")]
    Connection(String),

    #[error("Bundle planning failed: {0}")]
    Planning(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Submission refused: {0}")]
    SubmissionRefused(String),

    #[error("Transaction {hash} reverted in block {block}")]
    Reverted { hash: String, block: u64 },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Insufficient sponsor funds. Required: {required}, available: {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("Validation failed for {field}: {message}")]
    Validation { field: String, message: String },

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl From<config::ConfigError> for RescueError {
    fn from(err: config::ConfigError) -> Self {
        RescueError::Config(err.to_string())
    }
}
