//! Gas and fee estimation
//!
//! Given a prepared call and a fee-data source, estimates the gas units the
//! call needs and the maximum it may cost:
//! - gas units come from a simulation (`eth_estimateGas`)
//! - fees fall back from reported fee data, to the latest block header,
//!   to a one-gwei default
//!
//! Single pass, no retries. Any failed query aborts the estimation.

mod fees;
mod rpc;
mod types;

pub use rpc::RpcFeeSource;
pub use types::{
    BlockFees,
    CallRequest,
    EstimationError,
    EstimationResult,
    FeeData,
};

use fees::{max_cost_wei, needs_block_header, resolve_fees};

use async_trait::async_trait;
use tracing::debug;

/// Everything the estimator needs to ask the network
#[async_trait]
pub trait FeeDataProvider: Send + Sync {
    /// Gas units needed to execute `request` (no state change)
    async fn simulate_gas(&self, request: &CallRequest) -> Result<u64, EstimationError>;

    /// Current fee data
    async fn get_fee_data(&self) -> Result<FeeData, EstimationError>;

    /// Fee view of the latest block header
    async fn get_latest_block_header(&self) -> Result<BlockFees, EstimationError>;
}

/// Stateless fee estimator
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeEstimator;

impl FeeEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Estimate gas units and maximum cost for `request`.
    ///
    /// Queries run in order: simulation, fee data, then the block header only
    /// if the fee data has no last base fee.
    pub async fn estimate<P>(
        &self,
        request: &CallRequest,
        fee_source: &P,
    ) -> Result<EstimationResult, EstimationError>
    where
        P: FeeDataProvider + ?Sized,
    {
        let gas_units = fee_source.simulate_gas(request).await?;
        debug!("⛽ Simulated {} gas for call to {:?}", gas_units, request.target);

        let fee_data = fee_source.get_fee_data().await?;

        let header_base_fee = if needs_block_header(&fee_data) {
            let header = fee_source.get_latest_block_header().await?;
            debug!("No last base fee in fee data, header base fee: {:?}", header.base_fee_per_gas);
            header.base_fee_per_gas
        } else {
            None
        };

        let fees = resolve_fees(&fee_data, header_base_fee);
        debug!(
            "Resolved fees: priority {} ({}), base {} ({}), max {} ({})",
            fees.max_priority_fee_per_gas.wei,
            fees.max_priority_fee_per_gas.origin,
            fees.base_fee_per_gas.wei,
            fees.base_fee_per_gas.origin,
            fees.max_fee_per_gas.wei,
            fees.max_fee_per_gas.origin,
        );

        Ok(EstimationResult {
            gas_units,
            max_cost_wei: max_cost_wei(gas_units, fees.max_fee_per_gas.wei),
            fees,
        })
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::types::{FeeOrigin, ONE_GWEI};
    use super::*;
    use alloy_primitives::{address, Bytes, U256};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn wei(value: u128) -> U256 {
        U256::from(value)
    }

    struct MockFeeSource {
        gas: Result<u64, EstimationError>,
        fee_data: Result<FeeData, EstimationError>,
        header: Result<BlockFees, EstimationError>,
        simulate_calls: AtomicUsize,
        fee_data_calls: AtomicUsize,
        header_calls: AtomicUsize,
    }

    impl MockFeeSource {
        fn new(gas: u64, fee_data: FeeData, header_base_fee: Option<u128>) -> Self {
            Self {
                gas: Ok(gas),
                fee_data: Ok(fee_data),
                header: Ok(BlockFees { base_fee_per_gas: header_base_fee }),
                simulate_calls: AtomicUsize::new(0),
                fee_data_calls: AtomicUsize::new(0),
                header_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FeeDataProvider for MockFeeSource {
        async fn simulate_gas(&self, _request: &CallRequest) -> Result<u64, EstimationError> {
            self.simulate_calls.fetch_add(1, Ordering::SeqCst);
            self.gas.clone()
        }

        async fn get_fee_data(&self) -> Result<FeeData, EstimationError> {
            self.fee_data_calls.fetch_add(1, Ordering::SeqCst);
            self.fee_data.clone()
        }

        async fn get_latest_block_header(&self) -> Result<BlockFees, EstimationError> {
            self.header_calls.fetch_add(1, Ordering::SeqCst);
            self.header.clone()
        }
    }

    fn store_request() -> CallRequest {
        CallRequest::new(
            address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
            address!("5FbDB2315678afecb367f032d93F642f64180aa3"),
            Bytes::from(vec![0x13, 0x1a, 0x06, 0x80]),
        )
    }

    #[tokio::test]
    async fn test_priority_plus_last_base_fee() {
        let source = MockFeeSource::new(
            21_000,
            FeeData {
                max_priority_fee_per_gas: Some(2_000_000_000),
                max_fee_per_gas: None,
                last_base_fee_per_gas: Some(30_000_000_000),
                gas_price: None,
            },
            Some(1),
        );

        let result = FeeEstimator::new().estimate(&store_request(), &source).await.unwrap();

        assert_eq!(result.gas_units, 21_000);
        assert_eq!(result.max_fee_per_gas(), wei(32_000_000_000));
        assert_eq!(result.max_cost_wei, U256::from(672_000_000_000_000u64));
        // last base fee present: header never fetched
        assert_eq!(source.header_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_everything_absent_uses_one_gwei() {
        let source = MockFeeSource::new(50_000, FeeData::default(), None);

        let result = FeeEstimator::new().estimate(&store_request(), &source).await.unwrap();

        assert_eq!(result.fees.max_priority_fee_per_gas.wei, wei(ONE_GWEI));
        assert_eq!(result.fees.base_fee_per_gas.wei, wei(ONE_GWEI));
        // max fee = base + priority when not reported
        assert_eq!(result.max_fee_per_gas(), wei(2 * ONE_GWEI));
        assert_eq!(result.max_cost_wei, U256::from(100_000_000_000_000u64));
        assert_eq!(source.header_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_everything_absent_with_reported_max_fee() {
        let source = MockFeeSource::new(
            50_000,
            FeeData {
                max_fee_per_gas: Some(ONE_GWEI),
                ..Default::default()
            },
            None,
        );

        let result = FeeEstimator::new().estimate(&store_request(), &source).await.unwrap();

        assert_eq!(result.fees.max_priority_fee_per_gas.wei, wei(ONE_GWEI));
        assert_eq!(result.fees.base_fee_per_gas.wei, wei(ONE_GWEI));
        assert_eq!(result.max_fee_per_gas(), wei(ONE_GWEI));
        assert_eq!(result.max_cost_wei, U256::from(50_000_000_000_000u64));
    }

    #[tokio::test]
    async fn test_header_base_fee_used_when_last_base_fee_missing() {
        let source = MockFeeSource::new(
            100_000,
            FeeData {
                max_priority_fee_per_gas: Some(1_500_000_000),
                ..Default::default()
            },
            Some(12_000_000_000),
        );

        let result = FeeEstimator::new().estimate(&store_request(), &source).await.unwrap();

        assert_eq!(result.fees.base_fee_per_gas.origin, FeeOrigin::BlockHeader);
        assert_eq!(result.max_fee_per_gas(), wei(13_500_000_000));
        assert_eq!(result.max_cost_wei, U256::from(1_350_000_000_000_000u64));
        assert_eq!(source.header_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reported_max_fee_always_wins() {
        let source = MockFeeSource::new(
            21_000,
            FeeData {
                max_priority_fee_per_gas: Some(2_000_000_000),
                max_fee_per_gas: Some(61_000_000_000),
                last_base_fee_per_gas: Some(30_000_000_000),
                gas_price: Some(31_000_000_000),
            },
            None,
        );

        let result = FeeEstimator::new().estimate(&store_request(), &source).await.unwrap();

        assert_eq!(result.max_fee_per_gas(), wei(61_000_000_000));
        assert_eq!(result.max_cost_wei, U256::from(21_000u64 * 61_000_000_000));
    }

    #[tokio::test]
    async fn test_cost_beyond_u64() {
        let fee = 10u128.pow(20);
        let source = MockFeeSource::new(
            30_000_000,
            FeeData {
                max_fee_per_gas: Some(fee),
                last_base_fee_per_gas: Some(1),
                ..Default::default()
            },
            None,
        );

        let result = FeeEstimator::new().estimate(&store_request(), &source).await.unwrap();

        assert_eq!(result.max_cost_wei, U256::from(30_000_000u128 * fee));
        assert!(result.max_cost_wei > U256::from(u64::MAX));
    }

    #[tokio::test]
    async fn test_simulation_revert_stops_estimation() {
        let mut source = MockFeeSource::new(0, FeeData::default(), None);
        source.gas = Err(EstimationError::simulation_failed("execution reverted: nope"));

        let err = FeeEstimator::new().estimate(&store_request(), &source).await.unwrap_err();

        assert_eq!(
            err,
            EstimationError::SimulationFailed { reason: "execution reverted: nope".into() }
        );
        assert_eq!(source.fee_data_calls.load(Ordering::SeqCst), 0);
        assert_eq!(source.header_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fee_data_failure_is_network_error() {
        let mut source = MockFeeSource::new(21_000, FeeData::default(), None);
        source.fee_data = Err(EstimationError::network("connection refused"));

        let err = FeeEstimator::new().estimate(&store_request(), &source).await.unwrap_err();

        assert!(matches!(err, EstimationError::NetworkUnavailable(_)));
        assert_eq!(source.header_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_header_failure_is_network_error() {
        let mut source = MockFeeSource::new(21_000, FeeData::default(), None);
        source.header = Err(EstimationError::network("timed out"));

        let err = tokio_test::block_on(FeeEstimator::new().estimate(&store_request(), &source))
            .unwrap_err();

        assert_eq!(err, EstimationError::NetworkUnavailable("timed out".into()));
        assert_eq!(source.simulate_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.fee_data_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_estimator_accepts_trait_objects() {
        let source = MockFeeSource::new(
            21_000,
            FeeData {
                last_base_fee_per_gas: Some(ONE_GWEI),
                ..Default::default()
            },
            None,
        );
        let dyn_source: &dyn FeeDataProvider = &source;

        let result =
            tokio_test::block_on(FeeEstimator::new().estimate(&store_request(), dyn_source))
                .unwrap();

        assert_eq!(result.max_fee_per_gas(), wei(2 * ONE_GWEI));
    }
}
