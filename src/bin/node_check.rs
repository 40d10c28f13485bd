//! Node Check Utility
//!
//! Run with: cargo run --bin node-check
//!
//! Verifies the node, signer, compiler and contract source are ready
//! before a storage-probe run.

use alloy_primitives::{utils::format_ether, Address, U256};
use alloy_provider::{Provider, ProviderBuilder};
use std::env;
use std::path::Path;
use std::str::FromStr;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    println!();
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              STORAGE PROBE - NODE CHECK                    ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    let mut issues: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    // ==========================================
    // CHECK 1: RPC URL
    // ==========================================
    println!("📡 CHECKING RPC CONNECTION...");

    let rpc_url = env::var("RPC_URL").unwrap_or_else(|_| "http://127.0.0.1:8545".to_string());
    let mut rpc_ok = false;
    match check_rpc(&rpc_url).await {
        Ok((block, chain_id)) => {
            rpc_ok = true;
            println!("   ✅ RPC connected: {}", rpc_url);
            println!("   ✅ Chain ID: {}, current block: {}", chain_id, block);
        }
        Err(e) => {
            issues.push(format!("RPC connection failed: {}", e));
            println!("   ❌ RPC connection failed: {}", e);
        }
    }
    println!();

    // ==========================================
    // CHECK 2: Signer
    // ==========================================
    println!("🔐 CHECKING SIGNER...");

    let key = env::var("SIGNER_PRIVATE_KEY").unwrap_or_default();
    let mut sender: Option<Address> = None;
    if key.trim().is_empty() {
        println!("   ℹ️  SIGNER_PRIVATE_KEY: Not set (node account will sign)");
        if rpc_ok {
            match check_accounts(&rpc_url).await {
                Ok(accounts) if !accounts.is_empty() => {
                    println!("   ✅ Node exposes {} unlocked accounts", accounts.len());
                    sender = accounts.first().copied();
                }
                Ok(_) => {
                    issues.push(
                        "Node has no unlocked accounts and no SIGNER_PRIVATE_KEY".to_string(),
                    );
                    println!("   ❌ Node has no unlocked accounts");
                }
                Err(e) => {
                    issues.push(format!("eth_accounts failed: {}", e));
                    println!("   ❌ eth_accounts failed: {}", e);
                }
            }
        }
    } else {
        let key = key.trim().trim_start_matches("0x");
        if key.len() != 64 {
            issues.push("SIGNER_PRIVATE_KEY invalid format".to_string());
            println!("   ❌ SIGNER_PRIVATE_KEY: Invalid format (should be 64 hex chars)");
        } else {
            match alloy_signer_local::PrivateKeySigner::from_str(key) {
                Ok(signer) => {
                    println!("   ✅ SIGNER_PRIVATE_KEY: {:?}", signer.address());
                    sender = Some(signer.address());
                }
                Err(e) => {
                    issues.push(format!("SIGNER_PRIVATE_KEY parse error: {}", e));
                    println!("   ❌ SIGNER_PRIVATE_KEY: Parse error - {}", e);
                }
            }
        }
    }

    if let (true, Some(address)) = (rpc_ok, sender) {
        match check_balance(&rpc_url, address).await {
            Ok(balance) if balance > U256::ZERO => {
                println!("   ✅ Balance: {} ETH", format_ether(balance));
            }
            Ok(_) => {
                warnings.push("Sender balance is zero".to_string());
                println!("   ⚠️  Balance: 0 (deployment will fail unless gas is free)");
            }
            Err(e) => {
                warnings.push(format!("Could not read balance: {}", e));
                println!("   ⚠️  Balance: unknown ({})", e);
            }
        }
    }
    println!();

    // ==========================================
    // CHECK 3: Compiler
    // ==========================================
    println!("🛠  CHECKING COMPILER...");

    let solc = env::var("SOLC_PATH").unwrap_or_else(|_| "solc".to_string());
    match check_solc(&solc).await {
        Ok(version) => println!("   ✅ {}: {}", solc, version),
        Err(e) => {
            issues.push(format!("solc unavailable: {}", e));
            println!("   ❌ {}: {}", solc, e);
            println!("   💡 Install solc or set SOLC_PATH");
        }
    }
    println!();

    // ==========================================
    // CHECK 4: Contract source
    // ==========================================
    println!("📜 CHECKING CONTRACT SOURCE...");

    let contract_file =
        env::var("CONTRACT_FILE").unwrap_or_else(|_| "./contracts/Storage.sol".to_string());
    if Path::new(&contract_file).is_file() {
        println!("   ✅ CONTRACT_FILE: {}", contract_file);
    } else {
        issues.push(format!("CONTRACT_FILE not found: {}", contract_file));
        println!("   ❌ CONTRACT_FILE: {} (not found)", contract_file);
    }

    if env::var("REPORT_PATH").is_err() {
        println!("   ℹ️  REPORT_PATH: Not set (run reports disabled)");
    }
    println!();

    // ==========================================
    // SUMMARY
    // ==========================================
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    if issues.is_empty() && warnings.is_empty() {
        println!("✅ ALL CHECKS PASSED!");
        println!();
        println!("   Run: cargo run");
    } else if issues.is_empty() {
        println!("⚠️  READY WITH WARNINGS ({} warnings)", warnings.len());
        println!();
        for w in &warnings {
            println!("   • {}", w);
        }
    } else {
        println!("❌ NOT READY ({} issues, {} warnings)", issues.len(), warnings.len());
        println!();
        println!("   MUST FIX:");
        for i in &issues {
            println!("   • {}", i);
        }
        if !warnings.is_empty() {
            println!();
            println!("   WARNINGS:");
            for w in &warnings {
                println!("   • {}", w);
            }
        }
    }

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
}

async fn check_rpc(url: &str) -> Result<(u64, u64), String> {
    let provider = ProviderBuilder::new()
        .connect_http(url.parse().map_err(|e| format!("Invalid URL: {}", e))?);

    let block = provider.get_block_number().await
        .map_err(|e| format!("Connection failed: {}", e))?;
    let chain_id = provider.get_chain_id().await
        .map_err(|e| format!("eth_chainId failed: {}", e))?;

    Ok((block, chain_id))
}

async fn check_accounts(url: &str) -> Result<Vec<Address>, String> {
    let provider = ProviderBuilder::new()
        .connect_http(url.parse().map_err(|e| format!("Invalid URL: {}", e))?);

    provider.get_accounts().await
        .map_err(|e| format!("{}", e))
}

async fn check_balance(url: &str, address: Address) -> Result<U256, String> {
    let provider = ProviderBuilder::new()
        .connect_http(url.parse().map_err(|e| format!("Invalid URL: {}", e))?);

    provider.get_balance(address).await
        .map_err(|e| format!("{}", e))
}

async fn check_solc(path: &str) -> Result<String, String> {
    let output = tokio::process::Command::new(path)
        .arg("--version")
        .output()
        .await
        .map_err(|e| format!("not runnable ({})", e))?;

    if !output.status.success() {
        return Err(format!("exited with {}", output.status));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .last()
        .unwrap_or_default()
        .trim()
        .to_string())
}
