// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use clap::Parser;
use oxidity_rescue::app::config::GlobalSettings;
use oxidity_rescue::app::logging::setup_logging;
use oxidity_rescue::domain::constants::gwei_to_wei;
use oxidity_rescue::domain::error::RescueError;
use oxidity_rescue::domain::types::TransferCall;
use oxidity_rescue::infrastructure::network::gateway::{ChainGateway, PrivateGateway, RpcGateway};
use oxidity_rescue::infrastructure::network::provider::connect_http;
use oxidity_rescue::services::discovery;
use oxidity_rescue::services::rescue::planner::BundlePlanner;
use oxidity_rescue::services::rescue::{rescue, RescueRequest};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Oxidity Rescue")]
struct Cli {
    /// Path to config file (default: config.{toml,yaml,...})
    #[arg(long)]
    config: Option<String>,

    /// Token contract to rescue (repeatable; extends the configured list)
    #[arg(long = "token")]
    tokens: Vec<Address>,

    /// Safe destination address (default: sponsor address)
    #[arg(long)]
    recipient: Option<Address>,

    /// Priority fee in gwei (overrides config)
    #[arg(long)]
    priority_fee_gwei: Option<f64>,

    /// Max fee in gwei, pre-escalation (overrides config)
    #[arg(long)]
    max_fee_gwei: Option<f64>,

    /// Private / MEV-protected RPC endpoint (repeatable)
    #[arg(long = "private-rpc")]
    private_rpcs: Vec<String>,

    /// Plan and print the bundle without submitting anything
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Log filter (overrides the config debug flag)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), RescueError> {
    let cli = Cli::parse();

    let settings = GlobalSettings::load_with_path(cli.config.as_deref())?;
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| if settings.debug { "debug".into() } else { "info".into() });
    setup_logging(&level, settings.log_json);

    let executor = PrivateKeySigner::from_str(settings.executor_key.trim())
        .map_err(|e| RescueError::Config(format!("Invalid executor key: {}", e)))?;
    let sponsor = PrivateKeySigner::from_str(settings.sponsor_key.trim())
        .map_err(|e| RescueError::Config(format!("Invalid sponsor key: {}", e)))?;
    if executor.address() == sponsor.address() {
        return Err(RescueError::Validation {
            field: "sponsor_key".into(),
            message: "sponsor must differ from the compromised executor".into(),
        });
    }

    let mut tokens = settings.tokens.clone();
    for token in &cli.tokens {
        if !tokens.contains(token) {
            tokens.push(*token);
        }
    }
    if tokens.is_empty() {
        return Err(RescueError::Validation {
            field: "tokens".into(),
            message: "no token contracts supplied".into(),
        });
    }

    let recipient = cli
        .recipient
        .or(settings.recipient)
        .unwrap_or_else(|| sponsor.address());

    let provider = connect_http(&settings.rpc_url)?;
    let primary: Arc<dyn ChainGateway> =
        Arc::new(RpcGateway::new(provider.clone(), settings.rpc_url.clone()));

    let mut private_rpcs = Vec::new();
    let mut private_urls = settings.private_rpc_urls.clone();
    for url in &cli.private_rpcs {
        if !private_urls.contains(url) {
            private_urls.push(url.clone());
        }
    }
    for url in &private_urls {
        match PrivateGateway::connect(url) {
            Ok(gateway) => {
                tracing::info!(target: "private_rpc", endpoint = %url, "Private endpoint configured");
                private_rpcs.push(gateway);
            }
            Err(e) => {
                tracing::warn!(target: "private_rpc", endpoint = %url, error = %e, "Skipping private endpoint");
            }
        }
    }

    // EIP-7702 delegation changes how much gas a plain value transfer into
    // the executor may burn, so probe the account code up front.
    let code = primary.code(executor.address()).await?;
    let executor_is_contract = !code.is_empty();
    if executor_is_contract {
        tracing::info!(
            target: "plan",
            executor = %format!("{:#x}", executor.address()),
            code_len = code.len(),
            "Executor carries account code (delegated); widening funding gas"
        );
    }

    let mut transfer_calls: Vec<TransferCall> = Vec::new();
    for token in &tokens {
        if let Some(position) =
            discovery::discover_position(&provider, *token, executor.address()).await?
        {
            tracing::info!(
                target: "plan",
                token = %format!("{:#x}", position.token),
                symbol = %position.symbol,
                decimals = position.decimals,
                balance = %position.balance,
                "Token position discovered"
            );
            let call = discovery::build_transfer_call(
                primary.as_ref(),
                &position,
                executor.address(),
                recipient,
            )
            .await;
            transfer_calls.push(call);
        }
    }
    if transfer_calls.is_empty() {
        return Err(RescueError::Validation {
            field: "tokens".into(),
            message: "executor holds none of the supplied tokens".into(),
        });
    }

    let priority_fee = gwei_to_wei(cli.priority_fee_gwei.unwrap_or(settings.priority_fee_gwei));
    let max_fee = gwei_to_wei(cli.max_fee_gwei.unwrap_or(settings.max_fee_gwei));

    let planner = BundlePlanner::new(
        primary.clone(),
        sponsor.clone(),
        executor.clone(),
        priority_fee,
        max_fee,
        executor_is_contract,
    );
    planner.ensure_sponsor_funded(&transfer_calls, 100).await?;

    if cli.dry_run {
        let bundle = planner.plan(&transfer_calls, 100).await?;
        let rendered = json!({
            "chain_id": bundle.chain_id,
            "fee_quote": {
                "base_fee": bundle.fee_quote.base_fee,
                "priority_fee": bundle.fee_quote.priority_fee,
                "max_fee": bundle.fee_quote.max_fee,
            },
            "sponsor_nonce": bundle.sponsor_nonce,
            "executor_nonce": bundle.executor_nonce,
            "funding_value": bundle.total_executor_gas_cost.to_string(),
            "funding_tx": format!("{:#x}", bundle.funding_tx.hash),
            "funding_raw": format!("0x{}", hex::encode(&bundle.funding_tx.raw)),
            "transfer_txs": bundle
                .transfer_txs
                .iter()
                .map(|tx| format!("{:#x}", tx.hash))
                .collect::<Vec<_>>(),
            "transfer_raws": bundle
                .transfer_txs
                .iter()
                .map(|tx| format!("0x{}", hex::encode(&tx.raw)))
                .collect::<Vec<_>>(),
        });
        tracing::info!(target: "plan", "Dry-run: bundle planned, nothing submitted");
        println!("{}", serde_json::to_string_pretty(&rendered).unwrap_or_default());
        return Ok(());
    }

    let result = rescue(
        primary,
        private_rpcs,
        RescueRequest {
            executor,
            sponsor,
            recipient,
            transfer_calls,
            priority_fee,
            max_fee,
            executor_is_contract,
        },
    )
    .await;

    if result.success {
        println!("Rescue complete in {} attempt(s).", result.attempts);
        if let Some(hash) = result.funding_hash {
            println!("  funding:  {:#x}", hash);
        }
        for hash in &result.transfer_hashes {
            println!("  transfer: {:#x}", hash);
        }
        Ok(())
    } else {
        println!(
            "Rescue FAILED after {} attempt(s): {}",
            result.attempts,
            result.last_error.as_deref().unwrap_or("unknown error")
        );
        if let Some(hash) = result.funding_hash {
            println!("  observed funding:  {:#x}", hash);
        }
        for hash in &result.transfer_hashes {
            println!("  observed transfer: {:#x}", hash);
        }
        std::process::exit(1);
    }
}
