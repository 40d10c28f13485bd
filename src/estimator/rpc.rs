//! JSON-RPC fee source
//!
//! Answers the estimator's three queries against a live node:
//! - `eth_estimateGas` for the simulation
//! - `eth_gasPrice` + latest block + `eth_maxPriorityFeePerGas` for fee data
//! - latest block for the header base fee

use alloy_eips::BlockId;
use alloy_json_rpc::RpcError;
use alloy_provider::{DynProvider, Provider};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::decode_revert_reason;
use alloy_transport::TransportError;
use async_trait::async_trait;
use std::future::IntoFuture;
use tracing::{debug, trace};

use super::types::{BlockFees, CallRequest, EstimationError, FeeData, ONE_GWEI};
use super::FeeDataProvider;

/// Fee source backed by an alloy provider
#[derive(Clone)]
pub struct RpcFeeSource {
    provider: DynProvider,
}

impl RpcFeeSource {
    pub fn new(provider: DynProvider) -> Self {
        Self { provider }
    }

    fn call_to_request(request: &CallRequest) -> TransactionRequest {
        TransactionRequest::default()
            .from(request.sender)
            .to(request.target)
            .input(request.data.clone().into())
    }
}

#[async_trait]
impl FeeDataProvider for RpcFeeSource {
    async fn simulate_gas(&self, request: &CallRequest) -> Result<u64, EstimationError> {
        let tx = Self::call_to_request(request);

        self.provider
            .estimate_gas(tx)
            .await
            .map_err(classify_simulation_error)
    }

    async fn get_fee_data(&self) -> Result<FeeData, EstimationError> {
        // Independent reads, no ordering between them
        let (gas_price, block, priority_fee) = futures::join!(
            self.provider.get_gas_price().into_future(),
            self.provider.get_block(BlockId::latest()).into_future(),
            self.provider.get_max_priority_fee_per_gas().into_future(),
        );

        // Only the block is required; the two suggestions are optional
        let gas_price = match gas_price {
            Ok(price) => Some(price),
            Err(e) => {
                debug!("eth_gasPrice unavailable: {}", e);
                None
            }
        };
        let base_fee = block
            .map_err(EstimationError::network)?
            .and_then(|b| b.header.base_fee_per_gas)
            .map(u128::from);

        let priority_fee = match priority_fee {
            Ok(fee) => Some(fee),
            Err(e) => {
                debug!("eth_maxPriorityFeePerGas unavailable: {}", e);
                None
            }
        };

        let fee_data = fee_data_from_parts(gas_price, base_fee, priority_fee);
        trace!("Fee data: {:?}", fee_data);

        Ok(fee_data)
    }

    async fn get_latest_block_header(&self) -> Result<BlockFees, EstimationError> {
        let block = self
            .provider
            .get_block(BlockId::latest())
            .await
            .map_err(EstimationError::network)?;

        Ok(BlockFees {
            base_fee_per_gas: block
                .and_then(|b| b.header.base_fee_per_gas)
                .map(u128::from),
        })
    }
}

/// Build fee data the way wallet libraries do.
///
/// EIP-1559 fields are only filled when the latest block has a base fee; the
/// max fee leaves room for the base fee to double. A max fee that does not fit
/// in `u128` is left unreported and the estimator computes `base + priority`.
pub(crate) fn fee_data_from_parts(
    gas_price: Option<u128>,
    base_fee: Option<u128>,
    node_priority_fee: Option<u128>,
) -> FeeData {
    match base_fee {
        Some(base) => {
            let priority = node_priority_fee.unwrap_or(ONE_GWEI);
            let max_fee = base
                .checked_mul(2)
                .and_then(|doubled| doubled.checked_add(priority));
            if max_fee.is_none() {
                debug!("2 * base fee + priority fee overflows, max fee left unreported");
            }
            FeeData {
                max_priority_fee_per_gas: Some(priority),
                max_fee_per_gas: max_fee,
                last_base_fee_per_gas: Some(base),
                gas_price,
            }
        }
        None => FeeData {
            gas_price,
            ..Default::default()
        },
    }
}

/// A JSON-RPC error response to `eth_estimateGas` means the call itself is
/// rejected; anything else is the transport's fault.
pub(crate) fn classify_simulation_error(err: TransportError) -> EstimationError {
    match err {
        RpcError::ErrorResp(payload) => {
            let reason = payload
                .as_revert_data()
                .and_then(|data| decode_revert_reason(&data))
                .unwrap_or_else(|| payload.message.to_string());
            EstimationError::simulation_failed(reason)
        }
        other => EstimationError::network(other),
    }
}
