//! Fee resolution
//!
//! Each fee quantity is an ordered list of candidate sources; the first one
//! that is present wins, otherwise the one-gwei default applies.

use alloy_primitives::U256;

use super::types::{FeeData, FeeOrigin, ResolvedFee, ResolvedFees, ONE_GWEI};

/// First present candidate in priority order, or `default`
pub fn first_present<T, I>(candidates: I, default: T) -> T
where
    I: IntoIterator<Item = Option<T>>,
{
    candidates.into_iter().flatten().next().unwrap_or(default)
}

/// Same as [`first_present`] but keeps track of which source answered
fn first_present_tagged<I>(candidates: I) -> ResolvedFee
where
    I: IntoIterator<Item = (Option<U256>, FeeOrigin)>,
{
    first_present(
        candidates
            .into_iter()
            .map(|(value, origin)| value.map(|wei| ResolvedFee { wei, origin })),
        ResolvedFee {
            wei: U256::from(ONE_GWEI),
            origin: FeeOrigin::Default,
        },
    )
}

/// Whether the latest block header is needed to resolve the base fee
pub fn needs_block_header(fee_data: &FeeData) -> bool {
    fee_data.last_base_fee_per_gas.is_none()
}

/// Apply the fallback rules.
///
/// `header_base_fee` is only consulted when the fee data has no last base fee.
pub fn resolve_fees(fee_data: &FeeData, header_base_fee: Option<u128>) -> ResolvedFees {
    let max_priority_fee_per_gas = first_present_tagged([(
        fee_data.max_priority_fee_per_gas.map(U256::from),
        FeeOrigin::FeeData,
    )]);

    let base_fee_per_gas = first_present_tagged([
        (fee_data.last_base_fee_per_gas.map(U256::from), FeeOrigin::FeeData),
        (header_base_fee.map(U256::from), FeeOrigin::BlockHeader),
    ]);

    // Two u128 operands: the sum always fits
    let computed = base_fee_per_gas.wei + max_priority_fee_per_gas.wei;
    let max_fee_per_gas = first_present_tagged([
        (fee_data.max_fee_per_gas.map(U256::from), FeeOrigin::FeeData),
        (Some(computed), FeeOrigin::Computed),
    ]);

    ResolvedFees {
        max_priority_fee_per_gas,
        base_fee_per_gas,
        max_fee_per_gas,
    }
}

/// `gas_units * fee_per_gas` in 256-bit arithmetic.
///
/// Resolved fees stay below 2^129, so the product is below 2^193.
pub fn max_cost_wei(gas_units: u64, fee_per_gas: U256) -> U256 {
    U256::from(gas_units) * fee_per_gas
}
