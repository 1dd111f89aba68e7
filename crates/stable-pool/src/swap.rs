//! Swaps between two tokens of the pool at constant invariant.

use {
    crate::{
        error::{Error, PoolError},
        fees::FeeMint,
        fixed_point::Bfp,
        rates::ScalingFactors,
        stable_math,
    },
    ethereum_types::U256,
    serde::{Deserialize, Serialize},
};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SwapKind {
    /// The input amount is fixed and the output is computed.
    GivenIn,
    /// The output amount is fixed and the input is computed.
    GivenOut,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SwapRequest {
    pub kind: SwapKind,
    pub token_in: usize,
    pub token_out: usize,
    /// Raw amount of `token_in` for given in swaps, of `token_out` for given
    /// out swaps.
    pub amount: U256,
    /// Minimum output of a given in swap, maximum input of a given out swap.
    pub limit: Option<U256>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapOutcome {
    pub amount_in: U256,
    pub amount_out: U256,
    /// Swap fee paid in `token_in`, included in `amount_in`.
    pub fee: U256,
    pub protocol_fee: FeeMint,
}

/// Raw amounts of a swap before it is applied to the ledger.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct SwapAmounts {
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee: U256,
}

pub(crate) fn add_swap_fee_amount(amount: U256, swap_fee: Bfp) -> Result<U256, Error> {
    let amount_with_fees = Bfp::from_wei(amount).div_up(swap_fee.complement())?;
    Ok(amount_with_fees.as_uint256())
}

pub(crate) fn subtract_swap_fee_amount(amount: U256, swap_fee: Bfp) -> Result<U256, Error> {
    let amount = Bfp::from_wei(amount);
    let fee_amount = amount.mul_up(swap_fee)?;
    let amount_without_fees = amount.sub(fee_amount)?;
    Ok(amount_without_fees.as_uint256())
}

/// Computes the amounts of `request` against the raw `balances` and their
/// scaled counterparts.
pub(crate) fn compute(
    request: &SwapRequest,
    amplification: U256,
    swap_fee: Bfp,
    scaling: &ScalingFactors,
    balances: &[U256],
    scaled_balances: &[Bfp],
) -> Result<SwapAmounts, PoolError> {
    if request.token_in == request.token_out {
        return Err(PoolError::InvalidSwap("token in and token out are the same"));
    }
    if request.amount.is_zero() {
        return Err(PoolError::InvalidSwap("zero amount"));
    }
    let mut scaled_balances = scaled_balances.to_vec();

    let amounts = match request.kind {
        SwapKind::GivenIn => {
            let amount_in_after_fee = subtract_swap_fee_amount(request.amount, swap_fee)?;
            if amount_in_after_fee.is_zero() {
                return Err(PoolError::InvalidSwap("amount after fees rounds to zero"));
            }
            let scaled_out = stable_math::calc_out_given_in(
                amplification,
                &mut scaled_balances,
                request.token_in,
                request.token_out,
                scaling.upscale(request.token_in, amount_in_after_fee)?,
            )?;
            let amount_out = scaling.downscale_down(request.token_out, scaled_out)?;
            if amount_out.is_zero() {
                return Err(PoolError::InvalidSwap("output rounds to zero"));
            }
            if let Some(minimum) = request.limit.filter(|minimum| amount_out < *minimum) {
                return Err(PoolError::BelowMinimum {
                    actual: amount_out,
                    minimum,
                });
            }
            SwapAmounts {
                amount_in: request.amount,
                amount_out,
                fee: request.amount - amount_in_after_fee,
            }
        }
        SwapKind::GivenOut => {
            if request.amount >= balances[request.token_out] {
                return Err(PoolError::InsufficientBalance("token balance"));
            }
            let scaled_in = stable_math::calc_in_given_out(
                amplification,
                &mut scaled_balances,
                request.token_in,
                request.token_out,
                scaling.upscale_up(request.token_out, request.amount)?,
            )?;
            let amount_in_before_fee = scaling.downscale_up(request.token_in, scaled_in)?;
            let amount_in = add_swap_fee_amount(amount_in_before_fee, swap_fee)?;
            if let Some(maximum) = request.limit.filter(|maximum| amount_in > *maximum) {
                return Err(PoolError::AboveMaximum {
                    actual: amount_in,
                    maximum,
                });
            }
            SwapAmounts {
                amount_in,
                amount_out: request.amount,
                fee: amount_in - amount_in_before_fee,
            }
        }
    };
    Ok(amounts)
}
