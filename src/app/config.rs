// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::error::RescueError;
use alloy::primitives::Address;
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalSettings {
    // General
    #[serde(default = "default_debug")]
    pub debug: bool,
    #[serde(default = "default_log_json")]
    pub log_json: bool,

    // Identity. Keys are hex-encoded 32-byte secp256k1 scalars, usually
    // injected via RESCUE_EXECUTOR_KEY / RESCUE_SPONSOR_KEY.
    pub executor_key: String,
    pub sponsor_key: String,
    /// Safe destination; falls back to the sponsor address when unset.
    pub recipient: Option<Address>,

    // Endpoints
    pub rpc_url: String,
    #[serde(default, deserialize_with = "deserialize_url_list")]
    pub private_rpc_urls: Vec<String>,

    // Tokens to rescue; the CLI may extend this list.
    #[serde(default)]
    pub tokens: Vec<Address>,

    // Fees (gwei is the display/config unit; the core runs on wei)
    #[serde(default = "default_priority_fee")]
    pub priority_fee_gwei: f64,
    #[serde(default = "default_max_fee")]
    pub max_fee_gwei: f64,
}

// Defaults
fn default_debug() -> bool {
    false
}
fn default_log_json() -> bool {
    false
}
fn default_priority_fee() -> f64 {
    1.0
}
fn default_max_fee() -> f64 {
    2.0
}

/// Accepts either a sequence or a comma-separated string, so the list can be
/// supplied through a single environment variable.
fn deserialize_url_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{SeqAccess, Visitor};
    use std::fmt;

    struct UrlListVisitor;

    impl<'de> Visitor<'de> for UrlListVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a sequence of URLs or a comma-separated string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(split_url_list(v))
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut out = Vec::new();
            while let Some(item) = seq.next_element::<String>()? {
                out.extend(split_url_list(&item));
            }
            Ok(out)
        }
    }

    deserializer.deserialize_any(UrlListVisitor)
}

fn split_url_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

impl GlobalSettings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, RescueError> {
        let mut builder = Config::builder();
        builder = match path {
            Some(explicit) => builder.add_source(File::with_name(explicit)),
            None => builder.add_source(File::with_name("config").required(false)),
        };
        let settings: GlobalSettings = builder
            .add_source(Environment::with_prefix("RESCUE"))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), RescueError> {
        if self.priority_fee_gwei <= 0.0 {
            return Err(RescueError::Validation {
                field: "priority_fee_gwei".into(),
                message: "must be positive".into(),
            });
        }
        if self.max_fee_gwei < self.priority_fee_gwei {
            return Err(RescueError::Validation {
                field: "max_fee_gwei".into(),
                message: "must be at least priority_fee_gwei".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_list_splits_comma_separated_strings() {
        assert_eq!(
            split_url_list("https://a.example, https://b.example ,"),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(split_url_list("").is_empty());
    }

    #[test]
    fn fee_validation_rejects_inverted_envelope() {
        let settings = GlobalSettings {
            debug: false,
            log_json: false,
            executor_key: "0x01".into(),
            sponsor_key: "0x02".into(),
            recipient: None,
            rpc_url: "http://127.0.0.1:8545".into(),
            private_rpc_urls: Vec::new(),
            tokens: Vec::new(),
            priority_fee_gwei: 3.0,
            max_fee_gwei: 2.0,
        };
        let err = settings.validate().expect_err("must reject");
        assert!(matches!(err, RescueError::Validation { field, .. } if field == "max_fee_gwei"));
    }
}
