//! Node session
//!
//! Connects to the node, decides who sends transactions, and reads the
//! basic chain facts printed at the start of a run.

use alloy_primitives::{Address, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_signer_local::PrivateKeySigner;
use eyre::{eyre, Result};
use tracing::{debug, info};

/// A connected provider plus the account transactions are sent from
#[derive(Clone)]
pub struct NodeSession {
    pub provider: DynProvider,
    pub sender: Address,
    /// true when the node signs (`eth_sendTransaction` from an unlocked account)
    pub node_signed: bool,
}

/// Chain facts read at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub sender: Address,
    pub balance: U256,
    pub chain_id: u64,
    pub block_number: u64,
}

impl NodeSession {
    /// Connect to `rpc_url`.
    ///
    /// With a local signer every transaction is signed here; without one the
    /// node's first unlocked account is used.
    pub async fn connect(rpc_url: &str, signer: Option<PrivateKeySigner>) -> Result<Self> {
        match signer {
            Some(signer) => {
                let sender = signer.address();
                let provider = ProviderBuilder::new()
                    .wallet(signer)
                    .connect_http(
                        rpc_url
                            .parse()
                            .map_err(|e| eyre!("Invalid RPC URL '{}': {}", rpc_url, e))?,
                    )
                    .erased();
                info!("🔐 Using local signer {:?}", sender);
                Ok(Self { provider, sender, node_signed: false })
            }
            None => {
                let provider = read_only_provider(rpc_url)?;
                let accounts = provider
                    .get_accounts()
                    .await
                    .map_err(|e| eyre!("Failed to list node accounts: {}", e))?;
                let sender = first_account(&accounts)?;
                debug!("Node exposes {} unlocked accounts", accounts.len());
                info!("🔐 Using node account {:?}", sender);
                Ok(Self { provider, sender, node_signed: true })
            }
        }
    }

    /// Read address, balance, chain id and block number, in that order
    pub async fn snapshot(&self) -> Result<NodeSnapshot> {
        let balance = self.provider.get_balance(self.sender).await?;
        let chain_id = self.provider.get_chain_id().await?;
        let block_number = self.block_number().await?;

        Ok(NodeSnapshot {
            sender: self.sender,
            balance,
            chain_id,
            block_number,
        })
    }

    pub async fn block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| eyre!("Failed to fetch block number: {}", e))
    }
}

/// Provider for reads only: no signer, no account lookup, no request sent
pub fn read_only_provider(rpc_url: &str) -> Result<DynProvider> {
    let provider = ProviderBuilder::new()
        .connect_http(
            rpc_url
                .parse()
                .map_err(|e| eyre!("Invalid RPC URL '{}': {}", rpc_url, e))?,
        )
        .erased();
    Ok(provider)
}

fn first_account(accounts: &[Address]) -> Result<Address> {
    accounts.first().copied().ok_or_else(|| {
        eyre!("Node has no unlocked accounts; set SIGNER_PRIVATE_KEY to sign locally")
    })
}
