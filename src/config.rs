//! Configuration for storage-probe
//!
//! Loaded from environment variables (and `.env`), or from a TOML file.

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use chrono::{DateTime, Utc};
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // ========== Network Settings ==========
    /// JSON-RPC endpoint of the node
    pub rpc_url: String,

    // ========== Contract Settings ==========
    /// Solidity source file to compile
    pub contract_file: String,

    /// Contract to deploy from that file
    pub contract_name: String,

    /// Message passed to `store(string)`
    pub store_message: String,

    /// Path to the solc binary
    pub solc_path: String,

    // ========== Signer Settings ==========
    /// Local signing key (KEEP SECRET!)
    /// Unset = use the node's first unlocked account
    pub signer_private_key: Option<String>,

    // ========== Output ==========
    /// Append a JSON line per run to this file
    pub report_path: Option<String>,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Ok(Self {
            rpc_url: env::var("RPC_URL").unwrap_or(defaults.rpc_url),
            contract_file: env::var("CONTRACT_FILE").unwrap_or(defaults.contract_file),
            contract_name: env::var("CONTRACT_NAME").unwrap_or(defaults.contract_name),
            store_message: env::var("STORE_MESSAGE").unwrap_or(defaults.store_message),
            solc_path: env::var("SOLC_PATH").unwrap_or(defaults.solc_path),
            signer_private_key: env::var("SIGNER_PRIVATE_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            report_path: env::var("REPORT_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty()),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Parse the configured signing key, if any
    pub fn local_signer(&self) -> Result<Option<PrivateKeySigner>> {
        self.signer_private_key
            .as_deref()
            .map(|key| {
                PrivateKeySigner::from_str(key.trim().trim_start_matches("0x"))
                    .map_err(|e| eyre!("Invalid SIGNER_PRIVATE_KEY: {}", e))
            })
            .transpose()
    }

    /// Validate configuration before touching the node
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() {
            return Err(eyre!("RPC_URL is empty"));
        }
        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            return Err(eyre!("RPC_URL must be an http(s) endpoint, got '{}'", self.rpc_url));
        }

        if !self.contract_file.ends_with(".sol") {
            return Err(eyre!(
                "CONTRACT_FILE should be a Solidity source (*.sol), got '{}'",
                self.contract_file
            ));
        }
        if self.contract_name.trim().is_empty() {
            return Err(eyre!("CONTRACT_NAME is empty"));
        }

        if let Some(key) = &self.signer_private_key {
            if key.trim().trim_start_matches("0x").len() != 64 {
                return Err(eyre!("SIGNER_PRIVATE_KEY should be 64 hex chars"));
            }
        }

        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║              STORAGE PROBE - CONFIGURATION                 ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ RPC URL:           {:<40} ║", truncate(&self.rpc_url, 40));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ CONTRACT                                                   ║");
        println!("║ • Source:          {:<40} ║", truncate(&self.contract_file, 40));
        println!("║ • Name:            {:<40} ║", truncate(&self.contract_name, 40));
        println!("║ • Message:         {:<40} ║", truncate(&self.store_message, 40));
        println!("║ • solc:            {:<40} ║", truncate(&self.solc_path, 40));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ SIGNER                                                     ║");
        let signer = if self.signer_private_key.is_some() {
            "✓ Configured"
        } else {
            "✗ Using node account"
        };
        println!("║ • Private Key:     {:<40} ║", signer);
        let report = self
            .report_path
            .as_deref()
            .map(|p| truncate(p, 40))
            .unwrap_or_else(|| "✗ Disabled".to_string());
        println!("║ • Run Report:      {:<40} ║", report);
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            contract_file: "./contracts/Storage.sol".to_string(),
            contract_name: "Storage".to_string(),
            store_message: "This message is stored using alloy.".to_string(),
            solc_path: "solc".to_string(),
            signer_private_key: None,
            report_path: None,
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head)
    }
}

// ============================================
// RUN REPORT
// ============================================

/// One line in the run report file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub timestamp: DateTime<Utc>,
    pub chain_id: u64,
    pub sender: Address,
    pub contract: Option<Address>,
    pub deploy_tx: Option<String>,
    pub store_tx: Option<String>,
    pub stored_message: Option<String>,
    pub start_block: u64,
    pub end_block: Option<u64>,
    pub estimated_gas: Option<u64>,
    /// Decimal string, may exceed u128
    pub estimated_max_cost_wei: Option<String>,
    pub estimation_error: Option<String>,
}

impl RunReport {
    pub fn new(chain_id: u64, sender: Address, start_block: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            chain_id,
            sender,
            contract: None,
            deploy_tx: None,
            store_tx: None,
            stored_message: None,
            start_block,
            end_block: None,
            estimated_gas: None,
            estimated_max_cost_wei: None,
            estimation_error: None,
        }
    }

    /// Append this report to a file
    pub fn append_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        // Create parent directories if needed
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        let json = serde_json::to_string(self)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    // anvil/hardhat account #0
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.contract_name, "Storage");
        assert!(config.signer_private_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.rpc_url = String::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rpc_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.contract_file = "./contracts/Storage.json".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.signer_private_key = Some("0x1234".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_local_signer() {
        let mut config = Config::default();
        assert!(config.local_signer().unwrap().is_none());

        config.signer_private_key = Some(DEV_KEY.to_string());
        assert!(config.validate().is_ok());
        let signer = config.local_signer().unwrap().unwrap();
        assert_eq!(
            signer.address(),
            Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap()
        );
    }

    #[test]
    fn test_toml_file_round_trip() {
        let path =
            env::temp_dir().join(format!("storage-probe-config-{}.toml", std::process::id()));
        let mut config = Config::default();
        config.report_path = Some("./logs/runs.jsonl".to_string());

        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_run_report_appends_lines() {
        let dir = env::temp_dir().join(format!("storage-probe-report-{}", std::process::id()));
        let path = dir.join("runs.jsonl");

        let mut report = RunReport::new(31337, Address::ZERO, 1);
        report.estimated_gas = Some(21_000);
        report.append_to_file(&path).unwrap();
        report.estimation_error = Some("Network unavailable: refused".to_string());
        report.append_to_file(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        fs::remove_dir_all(&dir).ok();

        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: RunReport = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.chain_id, 31337);
        assert_eq!(second.estimated_gas, Some(21_000));
        assert!(second.estimation_error.is_some());
    }
}
