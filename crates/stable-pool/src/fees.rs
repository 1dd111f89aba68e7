//! Protocol fee accrual from invariant growth.
//!
//! Between two settlements the invariant grows through swap fees paid into
//! the pool and through rate increases of its tokens (yield). The protocol
//! takes a share of both by minting BPT to its fee recipient, diluting the
//! other holders by exactly its share of the growth.

use {
    crate::{
        config::{ProtocolFees, TokenConfig},
        error::{Error, PoolError},
        fixed_point::Bfp,
        rates::ScalingFactors,
        stable_math,
    },
    ethereum_types::{H160, U256},
    itertools::izip,
    serde::Serialize,
};

/// BPT minted to the protocol fee recipient by a settlement.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct FeeMint {
    pub recipient: H160,
    pub amount: U256,
}

/// State of the pool at the last fee settlement.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvariantSnapshot {
    pub invariant: U256,
    /// BPT supply right after the snapshot was taken. Only reported, the
    /// settlement works on the current supply.
    pub supply: U256,
    /// Amplification (at [`crate::config::AMP_PRECISION`]) `invariant` was
    /// computed with.
    pub amplification: U256,
    /// Token rates at the time of the snapshot.
    pub rates: Vec<Bfp>,
}

/// Invariants of the current balances under different rate assumptions, all
/// at the snapshot amplification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GrowthInvariants {
    /// Every token at its snapshot rate, so only swap fees are counted.
    pub swap_fee: U256,
    /// Tokens exempt from yield fees at their snapshot rate, all others at
    /// their current rate.
    pub non_exempt: U256,
    /// Every token at its current rate.
    pub total: U256,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Settlement {
    pub bpt_to_mint: U256,
    pub snapshot: InvariantSnapshot,
}

impl InvariantSnapshot {
    pub fn growth_invariants(
        &self,
        tokens: &[TokenConfig],
        balances: &[U256],
        current_rates: &[Bfp],
    ) -> Result<GrowthInvariants, Error> {
        let invariant = |rates: &[Bfp]| -> Result<U256, Error> {
            let scaled = ScalingFactors::new(tokens, rates)?.upscale_all(balances)?;
            stable_math::calculate_invariant(self.amplification, &scaled)
        };

        let non_exempt_rates: Vec<_> = izip!(tokens, &self.rates, current_rates)
            .map(|(token, old, current)| {
                if token.exempt_from_yield_fee {
                    *old
                } else {
                    *current
                }
            })
            .collect();

        Ok(GrowthInvariants {
            swap_fee: invariant(&self.rates)?,
            non_exempt: invariant(&non_exempt_rates)?,
            total: invariant(current_rates)?,
        })
    }
}

/// Computes the BPT owed to the protocol since the last snapshot.
pub struct FeeAccountant<'a> {
    pub tokens: &'a [TokenConfig],
    pub protocol_fees: &'a ProtocolFees,
}

impl FeeAccountant<'_> {
    /// Settles the fees accrued since `snapshot` for the pool holding
    /// `balances` with `supply` BPT outstanding. Settling again without an
    /// intervening change mints nothing.
    pub fn settle(
        &self,
        snapshot: &InvariantSnapshot,
        balances: &[U256],
        current_rates: &[Bfp],
        supply: U256,
    ) -> Result<Settlement, PoolError> {
        let growth = snapshot
            .growth_invariants(self.tokens, balances, current_rates)
            .map_err(fee_error)?;

        if growth.total <= snapshot.invariant {
            return Ok(Settlement {
                bpt_to_mint: U256::zero(),
                snapshot: snapshot.clone(),
            });
        }

        let bpt_to_mint = if self.protocol_fees.is_zero() {
            U256::zero()
        } else {
            self.protocol_fee_bpt(snapshot.invariant, &growth, supply)
                .map_err(fee_error)?
        };
        let new_supply = supply.checked_add(bpt_to_mint).ok_or(PoolError::FeeOverflow)?;

        tracing::debug!(
            invariant = %growth.total,
            previous_invariant = %snapshot.invariant,
            previous_supply = %snapshot.supply,
            supply = %supply,
            bpt_to_mint = %bpt_to_mint,
            "settled protocol fees"
        );

        Ok(Settlement {
            bpt_to_mint,
            snapshot: InvariantSnapshot {
                invariant: growth.total,
                supply: new_supply,
                amplification: snapshot.amplification,
                rates: current_rates.to_vec(),
            },
        })
    }

    fn protocol_fee_bpt(
        &self,
        previous_invariant: U256,
        growth: &GrowthInvariants,
        supply: U256,
    ) -> Result<U256, Error> {
        let swap_fee_delta = growth.swap_fee.saturating_sub(previous_invariant);
        let yield_delta = growth
            .non_exempt
            .saturating_sub(growth.swap_fee.max(previous_invariant));

        let protocol_value = Bfp::from_wei(swap_fee_delta)
            .mul_down(self.protocol_fees.swap_fee_percentage())?
            .add(Bfp::from_wei(yield_delta).mul_down(self.protocol_fees.yield_fee_percentage())?)?;
        let ownership = protocol_value.div_down(Bfp::from_wei(growth.total))?;
        if ownership.is_zero() {
            return Ok(U256::zero());
        }

        // Minting `supply * p / (1 - p)` leaves the recipient with a share
        // `p` of the new supply.
        Ok(Bfp::from_wei(supply)
            .mul_down(ownership)?
            .div_down(ownership.complement())?
            .as_uint256())
    }
}

/// Convergence failures keep their meaning; any other math error in the fee
/// computation is an overflow.
fn fee_error(err: Error) -> PoolError {
    match PoolError::from(err) {
        err @ PoolError::ConvergenceFailure(_) => err,
        _ => PoolError::FeeOverflow,
    }
}
