//! Joins and exits: turning a typed request into a ledger delta.

use {
    crate::{
        error::{Error, PoolError, TokenRef},
        fees::FeeMint,
        fixed_point::Bfp,
        ledger::{Flow, LedgerDelta, minimum_bpt},
        math,
        rates::ScalingFactors,
        stable_math,
    },
    ethereum_types::U256,
    serde::Serialize,
};

/// A join or exit together with the caller's slippage bounds. Token indices
/// refer to the tradable tokens only.
#[derive(Clone, Debug, Eq, PartialEq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum JoinExitRequest {
    /// First join of the pool.
    Init { amounts_in: Vec<U256> },
    ExactTokensInForBptOut {
        amounts_in: Vec<U256>,
        min_bpt_out: U256,
    },
    TokenInForExactBptOut {
        token_index: usize,
        bpt_out: U256,
        max_amount_in: U256,
    },
    AllTokensInForExactBptOut {
        bpt_out: U256,
        max_amounts_in: Vec<U256>,
    },
    ExactBptInForOneTokenOut {
        bpt_in: U256,
        token_index: usize,
        min_amount_out: U256,
    },
    ExactBptInForTokensOut {
        bpt_in: U256,
        min_amounts_out: Vec<U256>,
    },
    BptInForExactTokensOut {
        amounts_out: Vec<U256>,
        max_bpt_in: U256,
    },
}

impl JoinExitRequest {
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    pub fn flow(&self) -> Flow {
        match self {
            Self::Init { .. }
            | Self::ExactTokensInForBptOut { .. }
            | Self::TokenInForExactBptOut { .. }
            | Self::AllTokensInForExactBptOut { .. } => Flow::In,
            Self::ExactBptInForOneTokenOut { .. }
            | Self::ExactBptInForTokensOut { .. }
            | Self::BptInForExactTokensOut { .. } => Flow::Out,
        }
    }
}

/// Result of a committed join or exit.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinExitOutcome {
    pub kind: &'static str,
    pub flow: Flow,
    /// BPT minted to (joins) or burned from (exits) the caller.
    pub bpt_amount: U256,
    /// Raw token amounts paid in (joins) or out (exits), per token.
    pub amounts: Vec<U256>,
    pub protocol_fee: FeeMint,
}

/// Pool state a non-initializing join or exit is computed against. Fees are
/// already settled, so `supply` includes any protocol fee mint.
pub(crate) struct PoolSnapshot<'a> {
    pub amplification: U256,
    pub swap_fee: Bfp,
    pub scaling: &'a ScalingFactors,
    pub balances: &'a [U256],
    pub scaled_balances: &'a [Bfp],
    pub supply: U256,
    pub invariant: U256,
}

/// Computes the delta of an [`JoinExitRequest::Init`] and the invariant of
/// the resulting pool. One BPT is minted per unit of invariant, of which
/// [`crate::ledger::MINIMUM_BPT`] is locked.
pub(crate) fn compute_init(
    amounts_in: &[U256],
    amplification: U256,
    scaling: &ScalingFactors,
) -> Result<(LedgerDelta, U256), PoolError> {
    check_len(scaling.token_count(), amounts_in)?;
    if amounts_in.iter().any(U256::is_zero) {
        return Err(PoolError::BelowMinimum {
            actual: U256::zero(),
            minimum: U256::one(),
        });
    }

    let scaled = scaling.upscale_all(amounts_in)?;
    let invariant = stable_math::calculate_invariant(amplification, &scaled)?;
    if invariant <= minimum_bpt() {
        return Err(PoolError::BelowMinimum {
            actual: invariant,
            minimum: minimum_bpt() + 1,
        });
    }

    Ok((
        LedgerDelta {
            flow: Flow::In,
            amounts: amounts_in.to_vec(),
            bpt_amount: invariant,
        },
        invariant,
    ))
}

/// Computes the ledger delta of any request other than `Init`.
pub(crate) fn compute(
    request: &JoinExitRequest,
    pool: &PoolSnapshot,
) -> Result<LedgerDelta, PoolError> {
    let n = pool.balances.len();

    match request {
        JoinExitRequest::Init { .. } => Err(PoolError::AlreadyInitialized),
        JoinExitRequest::ExactTokensInForBptOut {
            amounts_in,
            min_bpt_out,
        } => {
            check_len(n, amounts_in)?;
            let scaled_amounts = pool.scaling.upscale_all(amounts_in)?;
            let bpt_out = stable_math::calc_bpt_out_given_exact_tokens_in(
                pool.amplification,
                pool.scaled_balances,
                &scaled_amounts,
                pool.supply,
                pool.invariant,
                pool.swap_fee,
            )?;
            let minimum = (*min_bpt_out).max(U256::one());
            if bpt_out < minimum {
                return Err(PoolError::BelowMinimum {
                    actual: bpt_out,
                    minimum,
                });
            }
            Ok(LedgerDelta {
                flow: Flow::In,
                amounts: amounts_in.clone(),
                bpt_amount: bpt_out,
            })
        }
        JoinExitRequest::TokenInForExactBptOut {
            token_index,
            bpt_out,
            max_amount_in,
        } => {
            check_index(n, *token_index)?;
            check_bpt(*bpt_out)?;
            let scaled_in = stable_math::calc_token_in_given_exact_bpt_out(
                pool.amplification,
                pool.scaled_balances,
                *token_index,
                *bpt_out,
                pool.supply,
                pool.invariant,
                pool.swap_fee,
            )?;
            let amount_in = pool.scaling.downscale_up(*token_index, scaled_in)?;
            if amount_in > *max_amount_in {
                return Err(PoolError::AboveMaximum {
                    actual: amount_in,
                    maximum: *max_amount_in,
                });
            }
            Ok(LedgerDelta {
                flow: Flow::In,
                amounts: single(n, *token_index, amount_in),
                bpt_amount: *bpt_out,
            })
        }
        JoinExitRequest::AllTokensInForExactBptOut {
            bpt_out,
            max_amounts_in,
        } => {
            check_len(n, max_amounts_in)?;
            check_bpt(*bpt_out)?;
            let amounts_in = pool
                .balances
                .iter()
                .zip(max_amounts_in)
                .map(|(balance, maximum)| -> Result<U256, PoolError> {
                    let amount = math::mul_div_up(*balance, *bpt_out, pool.supply)?;
                    if amount > *maximum {
                        return Err(PoolError::AboveMaximum {
                            actual: amount,
                            maximum: *maximum,
                        });
                    }
                    Ok(amount)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(LedgerDelta {
                flow: Flow::In,
                amounts: amounts_in,
                bpt_amount: *bpt_out,
            })
        }
        JoinExitRequest::ExactBptInForOneTokenOut {
            bpt_in,
            token_index,
            min_amount_out,
        } => {
            check_index(n, *token_index)?;
            check_bpt(*bpt_in)?;
            check_burnable(pool.supply, *bpt_in)?;
            let scaled_out = stable_math::calc_token_out_given_exact_bpt_in(
                pool.amplification,
                pool.scaled_balances,
                *token_index,
                *bpt_in,
                pool.supply,
                pool.invariant,
                pool.swap_fee,
            )?;
            let amount_out = pool.scaling.downscale_down(*token_index, scaled_out)?;
            let minimum = (*min_amount_out).max(U256::one());
            if amount_out < minimum {
                return Err(PoolError::BelowMinimum {
                    actual: amount_out,
                    minimum,
                });
            }
            Ok(LedgerDelta {
                flow: Flow::Out,
                amounts: single(n, *token_index, amount_out),
                bpt_amount: *bpt_in,
            })
        }
        JoinExitRequest::ExactBptInForTokensOut {
            bpt_in,
            min_amounts_out,
        } => {
            check_len(n, min_amounts_out)?;
            check_bpt(*bpt_in)?;
            check_burnable(pool.supply, *bpt_in)?;
            let amounts_out = pool
                .balances
                .iter()
                .zip(min_amounts_out)
                .map(|(balance, minimum)| -> Result<U256, PoolError> {
                    let amount = math::mul_div_down(*balance, *bpt_in, pool.supply)?;
                    if amount < *minimum {
                        return Err(PoolError::BelowMinimum {
                            actual: amount,
                            minimum: *minimum,
                        });
                    }
                    Ok(amount)
                })
                .collect::<Result<Vec<_>, _>>()?;
            if amounts_out.iter().all(U256::is_zero) {
                return Err(PoolError::BelowMinimum {
                    actual: U256::zero(),
                    minimum: U256::one(),
                });
            }
            Ok(LedgerDelta {
                flow: Flow::Out,
                amounts: amounts_out,
                bpt_amount: *bpt_in,
            })
        }
        JoinExitRequest::BptInForExactTokensOut {
            amounts_out,
            max_bpt_in,
        } => {
            check_len(n, amounts_out)?;
            if amounts_out.iter().all(U256::is_zero) {
                return Err(PoolError::BelowMinimum {
                    actual: U256::zero(),
                    minimum: U256::one(),
                });
            }
            let scaled_amounts = amounts_out
                .iter()
                .enumerate()
                .map(|(index, amount)| pool.scaling.upscale_up(index, *amount))
                .collect::<Result<Vec<_>, _>>()?;
            let bpt_in = stable_math::calc_bpt_in_given_exact_tokens_out(
                pool.amplification,
                pool.scaled_balances,
                &scaled_amounts,
                pool.supply,
                pool.invariant,
                pool.swap_fee,
            )
            .map_err(|err| match err {
                // Taking more than the pool holds.
                Error::SubOverflow => {
                    PoolError::InsufficientBalance("token balance")
                }
                err => err.into(),
            })?;
            check_bpt(bpt_in)?;
            if bpt_in > *max_bpt_in {
                return Err(PoolError::AboveMaximum {
                    actual: bpt_in,
                    maximum: *max_bpt_in,
                });
            }
            check_burnable(pool.supply, bpt_in)?;
            Ok(LedgerDelta {
                flow: Flow::Out,
                amounts: amounts_out.clone(),
                bpt_amount: bpt_in,
            })
        }
    }
}

fn check_len(expected: usize, values: &[U256]) -> Result<(), PoolError> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(PoolError::InputLengthMismatch {
            expected,
            actual: values.len(),
        })
    }
}

fn check_index(token_count: usize, index: usize) -> Result<(), PoolError> {
    if index < token_count {
        Ok(())
    } else {
        Err(PoolError::InvalidTokenIndex(TokenRef::Index(index)))
    }
}

/// BPT deltas are never zero.
fn check_bpt(amount: U256) -> Result<(), PoolError> {
    if amount.is_zero() {
        Err(PoolError::BelowMinimum {
            actual: amount,
            minimum: U256::one(),
        })
    } else {
        Ok(())
    }
}

fn check_burnable(supply: U256, amount: U256) -> Result<(), PoolError> {
    if amount > supply.saturating_sub(minimum_bpt()) {
        Err(PoolError::InsufficientBalance("BPT supply"))
    } else {
        Ok(())
    }
}

fn single(token_count: usize, index: usize, amount: U256) -> Vec<U256> {
    let mut amounts = vec![U256::zero(); token_count];
    amounts[index] = amount;
    amounts
}
