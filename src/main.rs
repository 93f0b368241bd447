//! mint-issuer
//!
//! Creates a new SPL token mint, its owner's associated token account and the
//! initial supply in a single atomic transaction, then prints the receipt.

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use solana_sdk::signature::Keypair;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mint_issuer::config::Config;
use mint_issuer::metrics::metrics;
use mint_issuer::rpc_manager::SolanaRpc;
use mint_issuer::tx_builder::{IssuanceError, IssuanceReceipt, MintTxBuilder};
use mint_issuer::wallet::WalletManager;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "MINT_CONFIG")]
    config: Option<PathBuf>,

    /// RPC endpoint URL
    #[arg(long)]
    rpc_endpoint: Option<String>,

    /// Fee payer keypair file
    #[arg(short, long)]
    keypair: Option<String>,

    /// Decimal places of the new mint
    #[arg(short, long)]
    decimals: Option<u8>,

    /// Initial supply in whole tokens
    #[arg(short, long)]
    supply: Option<u64>,

    /// Owner of the initial supply (defaults to the fee payer)
    #[arg(long)]
    owner: Option<String>,

    /// Create the mint without a freeze authority
    #[arg(long)]
    no_freeze_authority: bool,

    /// Commitment to wait for: processed, confirmed or finalized
    #[arg(long)]
    confirmation: Option<String>,

    /// Print the receipt as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    print_metrics: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(endpoint) = &self.rpc_endpoint {
            config.rpc.endpoint = endpoint.clone();
        }
        // An explicit keypair file outranks SECRET from the environment
        if let Some(path) = &self.keypair {
            config.wallet.keypair_path = Some(path.clone());
            config.wallet.secret = None;
        }
        if let Some(decimals) = self.decimals {
            config.issuance.decimals = decimals;
        }
        if let Some(supply) = self.supply {
            config.issuance.supply_tokens = supply;
        }
        if let Some(owner) = &self.owner {
            config.issuance.owner = Some(owner.clone());
        }
        if let Some(confirmation) = &self.confirmation {
            config.issuance.confirmation = confirmation.clone();
        }
        config.issuance.no_freeze_authority |= self.no_freeze_authority;
        config.monitoring.json_logs |= self.json_logs;
        config.monitoring.print_metrics |= self.print_metrics;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    init_logging(args.verbose, config.monitoring.json_logs)?;
    info!(version = env!("CARGO_PKG_VERSION"), endpoint = %config.rpc.endpoint, "Starting mint-issuer");

    let outcome = run(&config).await;

    if config.monitoring.print_metrics {
        println!("{}", metrics().render()?);
    }

    match outcome {
        Ok(receipt) => {
            print_receipt(&receipt, args.json)?;
            Ok(())
        }
        Err(RunError::Issuance(e)) => {
            error!(stage = %e.stage(), category = e.category(), retryable = e.is_retryable(), error = %e, "Issuance failed");
            eprintln!(
                "issuance failed at stage {} ({}, retryable: {}): {}",
                e.stage(),
                e.category(),
                e.is_retryable(),
                e
            );
            std::process::exit(1);
        }
        Err(RunError::Setup(e)) => Err(e),
    }
}

enum RunError {
    Setup(anyhow::Error),
    Issuance(IssuanceError),
}

async fn run(config: &Config) -> Result<IssuanceReceipt, RunError> {
    let commitment = config
        .commitment()
        .map_err(|e| RunError::Setup(e.into()))?;
    let rpc = Arc::new(SolanaRpc::new(
        config.rpc.endpoint.clone(),
        commitment,
        config.request_timeout(),
        config.retry_policy(),
    ));

    let wallet = WalletManager::resolve(&config.wallet, rpc.as_ref())
        .await
        .context("Failed to resolve fee payer")
        .map_err(RunError::Setup)?;
    info!(fee_payer = %wallet.pubkey(), source = %wallet.source(), "Fee payer ready");

    let request = config
        .issuance_request(wallet.pubkey())
        .map_err(RunError::Issuance)?;
    let builder = MintTxBuilder::new(
        rpc,
        config.submission_config().map_err(RunError::Issuance)?,
    )
    .with_max_attempts(config.issuance.max_attempts);

    let mint = Keypair::new();
    builder
        .issue_with_refresh(&request, &mint, &[wallet.keypair()])
        .await
        .map_err(RunError::Issuance)
}

fn print_receipt(receipt: &IssuanceReceipt, json: bool) -> Result<()> {
    if json {
        println!("{}", receipt.to_json()?);
        return Ok(());
    }

    println!("mint:            {}", receipt.mint);
    println!("holding account: {}", receipt.holding_account);
    println!("signature:       {}", receipt.signature);
    println!(
        "supply:          {} base units ({} decimals)",
        receipt.base_units, receipt.decimals
    );
    println!("slot:            {}", receipt.slot);
    println!("attempts:        {}", receipt.attempts);
    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let default_filter = if verbose {
        "mint_issuer=debug,info"
    } else {
        "mint_issuer=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    Ok(())
}
