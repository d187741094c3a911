// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use std::str::FromStr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Dependencies that log on every HTTP round-trip. A bare `debug` would
/// drown the rescue narration in transport chatter, so they are pinned to
/// `info` unless the caller writes their own directive string.
const QUIET_DEPS: [&str; 4] = [
    "hyper",
    "hyper_util",
    "alloy_transport_http",
    "alloy_rpc_client",
];

fn filter_directives(requested: &str) -> String {
    let requested = requested.trim();
    // Anything already carrying directives is taken verbatim.
    if requested.contains(',') || requested.contains('=') {
        return requested.to_string();
    }
    let mut spec = String::from(requested);
    for dep in QUIET_DEPS {
        spec.push(',');
        spec.push_str(dep);
        spec.push_str("=info");
    }
    spec
}

pub fn setup_logging(requested_level: &str, json_output: bool) {
    let spec = filter_directives(requested_level);
    let env_filter = EnvFilter::from_str(&spec).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    if json_output {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(false))
            .init();
    } else {
        registry.with(fmt::layer().compact().with_target(true)).init();
    }

    tracing::info!(
        target: "plan",
        filter = %spec,
        format = if json_output { "json" } else { "compact" },
        "Log stream ready"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_level_pins_noisy_dependencies() {
        let spec = filter_directives("debug");
        assert!(spec.starts_with("debug,"));
        for dep in QUIET_DEPS {
            assert!(spec.contains(&format!("{}=info", dep)));
        }
    }

    #[test]
    fn explicit_directive_strings_pass_through() {
        let custom = "info,oxidity_rescue=trace";
        assert_eq!(filter_directives(custom), custom);
        assert_eq!(filter_directives(" warn=off "), "warn=off");
    }
}
