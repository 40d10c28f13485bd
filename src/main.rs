//! Storage Probe - deploy, call and estimate against a local node
//!
//! Run with: cargo run
//!
//! Steps:
//! - Read sender, balance, chain id and block number
//! - Compile Storage.sol with solc and deploy it
//! - store() a message, retrieve() it back
//! - Estimate gas and maximum fee for the same store() call

use alloy_primitives::{utils::format_ether, Address, Bytes, U256};
use alloy_provider::DynProvider;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use console::style;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod compiler;
mod config;
mod contract;
mod estimator;
mod node;

use compiler::SolcCompiler;
use config::{Config, RunReport};
use contract::StorageContract;
use estimator::{CallRequest, EstimationResult, FeeEstimator, RpcFeeSource};
use node::NodeSession;

// ============================================
// CLI
// ============================================

#[derive(Debug, Parser)]
#[command(
    name = "storage-probe",
    version,
    about = "Deploy a Storage contract and estimate call fees"
)]
struct Cli {
    /// TOML config file (overrides environment)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Full run: compile, deploy, store, retrieve, estimate (default)
    Run,

    /// Estimate gas and max fee for a call to an already deployed contract
    Estimate {
        /// Target contract
        #[arg(long)]
        to: Address,

        /// Hex-encoded call data
        #[arg(long)]
        data: Bytes,

        /// Sender (defaults to the configured signer / first node account;
        /// when given, neither is needed)
        #[arg(long)]
        from: Option<Address>,
    },

    /// Print the effective configuration
    Config {
        /// Also write it to this TOML file
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 📦 STORAGE PROBE - Deploy, Call & Estimate").cyan().bold()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn print_step(title: &str) {
    println!();
    println!("{}", style(title).blue().bold());
}

/// Gwei with three decimals, truncated
fn format_gwei(wei: U256) -> String {
    let gwei = U256::from(1_000_000_000u64);
    let milli = (wei % gwei).to::<u64>() / 1_000_000;
    format!("{}.{:03} gwei", wei / gwei, milli)
}

fn print_estimate(label: &str, result: &EstimationResult) {
    let fees = &result.fees;
    println!(
        "{} Estimated gas ({}): {}",
        style("✓").green(),
        label,
        result.gas_units
    );
    println!(
        "   Max fee per gas:      {} ({})",
        format_gwei(result.max_fee_per_gas()),
        fees.max_fee_per_gas.origin
    );
    println!(
        "   Priority fee per gas: {} ({})",
        format_gwei(fees.max_priority_fee_per_gas.wei),
        fees.max_priority_fee_per_gas.origin
    );
    println!(
        "   Base fee per gas:     {} ({})",
        format_gwei(fees.base_fee_per_gas.wei),
        fees.base_fee_per_gas.origin
    );
    println!(
        "{} Estimated max cost (wei): {} ({} ETH)",
        style("✓").green(),
        result.max_cost_wei,
        format_ether(result.max_cost_wei)
    );
}

// ============================================
// MAIN
// ============================================

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("storage_probe=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Config { save } => {
            config.print_summary();
            if let Some(path) = save {
                config.save_to_file(&path)?;
                info!("📝 Configuration written to {}", path.display());
            }
            config.validate()
        }
        Command::Run => {
            config.validate()?;
            print_banner();
            run(&config).await
        }
        Command::Estimate { to, data, from } => {
            config.validate()?;
            estimate_only(&config, to, data, from).await
        }
    }
}

/// The full sequential run
async fn run(config: &Config) -> Result<()> {
    let start = Instant::now();

    // ========== Node ==========
    print_step("Step 1: Connecting to node...");
    let session = NodeSession::connect(&config.rpc_url, config.local_signer()?).await?;
    let snapshot = session.snapshot().await?;

    let signed_by = if session.node_signed {
        "node account"
    } else {
        "local key"
    };
    println!("   Address:       {:?} ({})", snapshot.sender, signed_by);
    println!(
        "   Balance:       {} wei ({} ETH)",
        snapshot.balance,
        format_ether(snapshot.balance)
    );
    println!("   Chain ID:      {}", snapshot.chain_id);
    println!("   Current Block: {}", snapshot.block_number);

    if snapshot.balance == U256::ZERO {
        warn!(
            "Sender {:?} has no balance, transactions will likely fail",
            snapshot.sender
        );
    }

    let mut report = RunReport::new(snapshot.chain_id, snapshot.sender, snapshot.block_number);

    // ========== Compile ==========
    print_step("Step 2: Compiling contract...");
    let compiler = SolcCompiler::new(&config.solc_path);
    println!("   Compiler: {}", compiler.version().await?);
    let compiled = compiler
        .compile(&config.contract_file, &config.contract_name)
        .await?;
    println!(
        "{} Compiled {} ({} bytes, functions: {})",
        style("✓").green(),
        compiled.name,
        compiled.bytecode.len(),
        compiled.function_names().join(", ")
    );

    // ========== Deploy ==========
    print_step("Step 3: Deploying...");
    let (storage, deploy_tx) =
        StorageContract::deploy(session.provider.clone(), session.sender, compiled.bytecode)
            .await?;
    println!("   Deployment Tx Hash: {:?}", deploy_tx);
    println!("   Contract Address:   {:?}", storage.address());
    report.contract = Some(storage.address());
    report.deploy_tx = Some(format!("{:?}", deploy_tx));

    // ========== Call ==========
    print_step("Step 4: Storing message...");
    let store_tx = storage.store(&config.store_message).await?;
    println!("   Storage Tx Hash: {:?}", store_tx);
    report.store_tx = Some(format!("{:?}", store_tx));

    let message = storage.retrieve().await?;
    println!("   Message: {}", message);
    report.stored_message = Some(message);

    let latest_block = session.block_number().await?;
    println!("   Latest Block: {}", latest_block);
    report.end_block = Some(latest_block);

    // ========== Estimate ==========
    print_step("Step 5: Estimating gas...");
    let request = storage.store_call_request(&config.store_message);
    let fee_source = RpcFeeSource::new(session.provider.clone());

    match FeeEstimator::new().estimate(&request, &fee_source).await {
        Ok(result) => {
            print_estimate("store", &result);
            report.estimated_gas = Some(result.gas_units);
            report.estimated_max_cost_wei = Some(result.max_cost_wei.to_string());
        }
        Err(e) => {
            error!("Gas estimation failed: {}", e);
            report.estimation_error = Some(e.to_string());
        }
    }

    if let Some(path) = &config.report_path {
        report.append_to_file(path)?;
        info!("📝 Run report appended to {}", path);
    }

    println!();
    println!("{} Done in {:?}", style("✓").green(), start.elapsed());
    Ok(())
}

/// Estimate a single call against an existing contract
async fn estimate_only(
    config: &Config,
    to: Address,
    data: Bytes,
    from: Option<Address>,
) -> Result<()> {
    let (provider, request) = estimation_request(config, to, data, from).await?;

    let fee_source = RpcFeeSource::new(provider);
    let result = FeeEstimator::new()
        .estimate(&request, &fee_source)
        .await
        .map_err(|e| eyre!("Gas estimation failed: {}", e))?;

    print_estimate(&format!("{:?}", to), &result);
    Ok(())
}

/// Provider and call to estimate.
///
/// An explicit sender needs nothing from the node up front; otherwise the
/// sender comes from the configured key or the node's first account.
async fn estimation_request(
    config: &Config,
    to: Address,
    data: Bytes,
    from: Option<Address>,
) -> Result<(DynProvider, CallRequest)> {
    match from {
        Some(sender) => {
            let provider = node::read_only_provider(&config.rpc_url)?;
            Ok((provider, CallRequest::new(sender, to, data)))
        }
        None => {
            let session = NodeSession::connect(&config.rpc_url, config.local_signer()?).await?;
            Ok((session.provider, CallRequest::new(session.sender, to, data)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_cli_defaults_to_run() {
        let cli = Cli::try_parse_from(["storage-probe"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_estimate_args() {
        let cli = Cli::try_parse_from([
            "storage-probe",
            "estimate",
            "--to",
            "0x5FbDB2315678afecb367f032d93F642f64180aa3",
            "--data",
            "0x2e64cec1",
            "--config",
            "probe.toml",
        ])
        .unwrap();

        match cli.command {
            Some(Command::Estimate { to, data, from }) => {
                assert_eq!(format!("{:?}", to), "0x5fbdb2315678afecb367f032d93f642f64180aa3");
                assert_eq!(data.as_ref(), &[0x2e, 0x64, 0xce, 0xc1]);
                assert!(from.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(cli.config, Some(PathBuf::from("probe.toml")));
    }

    #[test]
    fn test_cli_config_save() {
        let cli =
            Cli::try_parse_from(["storage-probe", "config", "--save", "probe.toml"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Config { save: Some(ref p) }) if p == &PathBuf::from("probe.toml")
        ));
    }

    #[test]
    fn test_cli_rejects_bad_address() {
        let parsed =
            Cli::try_parse_from(["storage-probe", "estimate", "--to", "0x12", "--data", "0x"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_format_gwei() {
        assert_eq!(format_gwei(U256::from(32_000_000_000u64)), "32.000 gwei");
        assert_eq!(format_gwei(U256::from(2_500_000_000u64)), "2.500 gwei");
        assert_eq!(format_gwei(U256::from(999_999u64)), "0.000 gwei");

        let above_u128 = U256::from(u128::MAX) * U256::from(2u8);
        assert!(format_gwei(above_u128).ends_with(" gwei"));
    }

    #[tokio::test]
    async fn test_explicit_sender_skips_account_lookup() {
        // Nothing listens here, so any account or signer lookup would fail
        let config = Config {
            rpc_url: "http://127.0.0.1:1".to_string(),
            signer_private_key: Some("not a key".to_string()),
            ..Config::default()
        };
        let sender = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
        let to = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

        let (_provider, request) =
            estimation_request(&config, to, Bytes::from(vec![0x2e, 0x64]), Some(sender))
                .await
                .unwrap();

        assert_eq!(request.sender, sender);
        assert_eq!(request.target, to);
    }

    #[tokio::test]
    async fn test_default_sender_needs_the_node() {
        let config = Config {
            rpc_url: "http://127.0.0.1:1".to_string(),
            ..Config::default()
        };
        let to = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

        assert!(estimation_request(&config, to, Bytes::new(), None).await.is_err());
    }
}
