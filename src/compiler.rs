//! Solidity compilation through `solc --standard-json`
//!
//! The compiler is an external collaborator: we build the standard JSON
//! input, pipe it to solc and pick the ABI and creation bytecode out of the
//! output. Nothing here knows Solidity.

use alloy_primitives::Bytes;
use eyre::{bail, eyre, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

// ============================================
// OUTPUT TYPES
// ============================================

#[derive(Debug, Deserialize)]
struct StandardJsonOutput {
    #[serde(default)]
    errors: Vec<Diagnostic>,
    #[serde(default)]
    contracts: HashMap<String, HashMap<String, ContractOutput>>,
}

#[derive(Debug, Deserialize)]
struct Diagnostic {
    severity: String,
    #[serde(rename = "formattedMessage")]
    formatted_message: Option<String>,
    message: String,
}

impl Diagnostic {
    fn text(&self) -> &str {
        self.formatted_message.as_deref().unwrap_or(&self.message).trim()
    }
}

#[derive(Debug, Deserialize)]
struct ContractOutput {
    #[serde(default)]
    abi: Value,
    evm: Option<EvmOutput>,
}

#[derive(Debug, Deserialize)]
struct EvmOutput {
    bytecode: Option<BytecodeOutput>,
}

#[derive(Debug, Deserialize)]
struct BytecodeOutput {
    object: String,
}

/// A compiled contract ready for deployment
#[derive(Debug, Clone)]
pub struct CompiledContract {
    pub name: String,
    pub abi: Value,
    pub bytecode: Bytes,
}

impl CompiledContract {
    /// Names of the functions in the ABI
    pub fn function_names(&self) -> Vec<&str> {
        self.abi
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item["type"] == "function")
                    .filter_map(|item| item["name"].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ============================================
// COMPILER
// ============================================

pub struct SolcCompiler {
    solc_path: String,
}

impl SolcCompiler {
    pub fn new(solc_path: impl Into<String>) -> Self {
        Self { solc_path: solc_path.into() }
    }

    /// `solc --version`, last line (e.g. "Version: 0.8.26+commit...")
    pub async fn version(&self) -> Result<String> {
        let output = Command::new(&self.solc_path)
            .arg("--version")
            .output()
            .await
            .map_err(|e| eyre!("Failed to run '{}': {}", self.solc_path, e))?;

        if !output.status.success() {
            bail!("'{} --version' exited with {}", self.solc_path, output.status);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().last().unwrap_or_default().trim().to_string())
    }

    /// Compile `source_path` and return `contract_name`
    pub async fn compile(
        &self,
        source_path: &str,
        contract_name: &str,
    ) -> Result<CompiledContract> {
        let content = tokio::fs::read_to_string(Path::new(source_path))
            .await
            .map_err(|e| eyre!("Failed to read {}: {}", source_path, e))?;

        let input = standard_json_input(source_path, &content);
        debug!("Running {} --standard-json on {}", self.solc_path, source_path);

        let mut child = Command::new(&self.solc_path)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| eyre!("Failed to run '{}': {}", self.solc_path, e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| eyre!("solc stdin unavailable"))?;
        stdin.write_all(input.to_string().as_bytes()).await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            bail!(
                "solc exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        extract_contract(&output.stdout, source_path, contract_name)
    }
}

/// Standard JSON input for a single source, all outputs selected
pub fn standard_json_input(source_path: &str, content: &str) -> Value {
    json!({
        "language": "Solidity",
        "sources": {
            source_path: { "content": content }
        },
        "settings": {
            "outputSelection": {
                "*": { "*": ["*"] }
            }
        }
    })
}

/// Pull one contract out of solc's standard JSON output
pub fn extract_contract(
    raw: &[u8],
    source_path: &str,
    contract_name: &str,
) -> Result<CompiledContract> {
    let output: StandardJsonOutput = serde_json::from_slice(raw)
        .map_err(|e| eyre!("Unreadable solc output: {}", e))?;

    let (errors, warnings): (Vec<_>, Vec<_>) = output
        .errors
        .iter()
        .partition(|d| d.severity.eq_ignore_ascii_case("error"));

    for w in &warnings {
        warn!("solc: {}", w.text());
    }
    if !errors.is_empty() {
        let messages: Vec<_> = errors.iter().map(|d| d.text()).collect();
        bail!("Compilation failed:\n{}", messages.join("\n"));
    }

    let contract = output
        .contracts
        .get(source_path)
        .and_then(|contracts| contracts.get(contract_name))
        .ok_or_else(|| eyre!("Contract {} not found in {}", contract_name, source_path))?;

    let object = contract
        .evm
        .as_ref()
        .and_then(|evm| evm.bytecode.as_ref())
        .map(|b| b.object.trim_start_matches("0x"))
        .unwrap_or_default();

    if object.is_empty() {
        bail!("Contract {} has no bytecode (abstract or interface?)", contract_name);
    }

    let bytecode = hex::decode(object)
        .map_err(|e| eyre!("Invalid bytecode for {}: {}", contract_name, e))?;

    Ok(CompiledContract {
        name: contract_name.to_string(),
        abi: contract.abi.clone(),
        bytecode: bytecode.into(),
    })
}
