//! Fee estimation data model
//!
//! Plain values: built once per estimation, never mutated, never cached.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================
// CONSTANTS
// ============================================

/// One gwei in wei. Default for any fee quantity no source can supply.
pub const ONE_GWEI: u128 = 1_000_000_000;

// ============================================
// INPUTS
// ============================================

/// A prepared call to estimate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    /// Account the call is simulated from
    pub sender: Address,

    /// Deployed contract being called
    pub target: Address,

    /// ABI-encoded call data
    pub data: Bytes,
}

impl CallRequest {
    pub fn new(sender: Address, target: Address, data: impl Into<Bytes>) -> Self {
        Self {
            sender,
            target,
            data: data.into(),
        }
    }
}

/// Fee data as reported by the node (all values in wei per gas)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeData {
    pub max_priority_fee_per_gas: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub last_base_fee_per_gas: Option<u128>,

    /// Legacy gas price. Informational only, never used for resolution.
    pub gas_price: Option<u128>,
}

/// The part of the latest block header the estimator cares about
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockFees {
    pub base_fee_per_gas: Option<u128>,
}

// ============================================
// OUTPUTS
// ============================================

/// Where a resolved fee value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeOrigin {
    /// Reported by the fee-data query
    FeeData,

    /// Read from the latest block header
    BlockHeader,

    /// base fee + priority fee
    Computed,

    /// One-gwei default
    Default,
}

impl std::fmt::Display for FeeOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeeOrigin::FeeData => write!(f, "fee data"),
            FeeOrigin::BlockHeader => write!(f, "block header"),
            FeeOrigin::Computed => write!(f, "base + priority"),
            FeeOrigin::Default => write!(f, "1 gwei default"),
        }
    }
}

/// A fee value together with its origin.
///
/// 256 bits wide: a computed max fee is the sum of two `u128` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFee {
    pub wei: U256,
    pub origin: FeeOrigin,
}

/// The three fee quantities after applying the fallback rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFees {
    pub max_priority_fee_per_gas: ResolvedFee,
    pub base_fee_per_gas: ResolvedFee,
    pub max_fee_per_gas: ResolvedFee,
}

/// Result of a successful estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimationResult {
    /// Gas units the node expects the call to consume
    pub gas_units: u64,

    /// `gas_units * max_fee_per_gas`, exact
    pub max_cost_wei: U256,

    pub fees: ResolvedFees,
}

impl EstimationResult {
    pub fn max_fee_per_gas(&self) -> U256 {
        self.fees.max_fee_per_gas.wei
    }
}

// ============================================
// ERRORS
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EstimationError {
    /// The simulated call would revert
    #[error("Simulation failed: {reason}")]
    SimulationFailed { reason: String },

    /// A read query could not complete
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),
}

impl EstimationError {
    pub fn simulation_failed(reason: impl Into<String>) -> Self {
        EstimationError::SimulationFailed { reason: reason.into() }
    }

    pub fn network(msg: impl std::fmt::Display) -> Self {
        EstimationError::NetworkUnavailable(msg.to_string())
    }
}
