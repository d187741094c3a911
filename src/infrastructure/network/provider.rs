// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::error::RescueError;
use alloy::network::Ethereum;
use alloy::providers::RootProvider;
use url::Url;

pub type HttpProvider = RootProvider<Ethereum>;

/// Open an HTTP(S) provider for one endpoint. Streaming transports are
/// rejected up front: a one-shot rescue run has no subscription surface, and
/// a pasted `ws://` URL should fail loudly here instead of inside the first
/// RPC call.
pub fn connect_http(rpc_url: &str) -> Result<HttpProvider, RescueError> {
    let url: Url = rpc_url.parse().map_err(|e| {
        RescueError::Config(format!("RPC endpoint {} is not a valid URL: {}", rpc_url, e))
    })?;
    match url.scheme() {
        "http" | "https" => Ok(RootProvider::new_http(url)),
        scheme => Err(RescueError::Config(format!(
            "RPC endpoint {} uses unsupported scheme {}; only http(s) is handled",
            rpc_url, scheme
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_url() {
        let err = connect_http("not a url").expect_err("must reject");
        assert!(matches!(err, RescueError::Config(msg) if msg.contains("not a valid URL")));
    }

    #[test]
    fn rejects_streaming_schemes() {
        let err = connect_http("ws://127.0.0.1:8546").expect_err("must reject");
        assert!(matches!(err, RescueError::Config(msg) if msg.contains("unsupported scheme")));
    }

    #[test]
    fn accepts_http_and_https() {
        connect_http("http://127.0.0.1:8545").expect("http url");
        connect_http("https://rpc.example.org").expect("https url");
    }
}
