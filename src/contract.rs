//! Storage contract client
//!
//! Deploys the compiled contract, stores a message and reads it back.

use alloy_network::{ReceiptResponse, TransactionBuilder};
use alloy_primitives::{Address, Bytes, TxHash};
use alloy_provider::{DynProvider, Provider};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use eyre::{bail, eyre, Result};
use tracing::{debug, info};

use crate::estimator::CallRequest;

// ============================================
// STORAGE INTERFACE
// ============================================

sol! {
    interface IStorage {
        function store(string calldata message) external;
        function retrieve() external view returns (string memory);
    }
}

/// Encoded `store(message)` call data
pub fn encode_store(message: &str) -> Bytes {
    IStorage::storeCall { message: message.to_string() }.abi_encode().into()
}

/// Estimation request for `store(message)` sent by `sender`
pub fn store_call_request(sender: Address, target: Address, message: &str) -> CallRequest {
    CallRequest::new(sender, target, encode_store(message))
}

// ============================================
// DEPLOYED CONTRACT
// ============================================

pub struct StorageContract {
    provider: DynProvider,
    sender: Address,
    address: Address,
}

impl StorageContract {
    /// Attach to an already deployed contract
    pub fn at(provider: DynProvider, sender: Address, address: Address) -> Self {
        Self { provider, sender, address }
    }

    /// Deploy `bytecode` and wait for the receipt
    pub async fn deploy(
        provider: DynProvider,
        sender: Address,
        bytecode: Bytes,
    ) -> Result<(Self, TxHash)> {
        let tx = TransactionRequest::default()
            .from(sender)
            .with_deploy_code(bytecode);

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| eyre!("Deployment failed: {}", e))?;
        let tx_hash = *pending.tx_hash();
        debug!("Deployment tx sent: {:?}", tx_hash);

        let receipt = pending.get_receipt().await?;
        if !receipt.status() {
            bail!("Deployment transaction {:?} reverted", tx_hash);
        }
        let address = receipt
            .contract_address()
            .ok_or_else(|| eyre!("Deployment receipt {:?} has no contract address", tx_hash))?;

        info!("📜 Contract deployed at {:?}", address);
        Ok((Self::at(provider, sender, address), tx_hash))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Send `store(message)` and wait until it is mined
    pub async fn store(&self, message: &str) -> Result<TxHash> {
        let tx = TransactionRequest::default()
            .from(self.sender)
            .to(self.address)
            .input(encode_store(message).into());

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| eyre!("store() failed: {}", e))?;
        let tx_hash = *pending.tx_hash();

        let receipt = pending.get_receipt().await?;
        if !receipt.status() {
            bail!("store() transaction {:?} reverted", tx_hash);
        }

        Ok(tx_hash)
    }

    /// `retrieve()` through eth_call
    pub async fn retrieve(&self) -> Result<String> {
        let calldata = IStorage::retrieveCall {}.abi_encode();

        let tx = TransactionRequest::default()
            .from(self.sender)
            .to(self.address)
            .input(calldata.into());

        let result = self
            .provider
            .call(tx)
            .await
            .map_err(|e| eyre!("retrieve() failed: {}", e))?;

        IStorage::retrieveCall::abi_decode_returns(&result)
            .map_err(|e| eyre!("Failed to decode retrieve() result: {}", e))
    }

    /// Estimation request for `store(message)` against this contract
    pub fn store_call_request(&self, message: &str) -> CallRequest {
        store_call_request(self.sender, self.address, message)
    }
}
