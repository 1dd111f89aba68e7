//! Stable swap invariant math operating on scaled balances.
//!
//! Follows the `StableMath` library of the Balancer V2 contracts. The
//! amplification is expressed at [`AMP_PRECISION`] and `Ann` below denotes
//! `amplification * n`.

use {
    crate::{
        config::AMP_PRECISION,
        error::Error,
        fixed_point::Bfp,
        math::{self, BalU256},
    },
    ethereum_types::U256,
    itertools::izip,
};

const MAX_ITERATIONS: usize = 255;

fn amp_precision() -> U256 {
    U256::from(AMP_PRECISION)
}

fn sum(balances: &[Bfp]) -> Result<Bfp, Error> {
    balances
        .iter()
        .try_fold(Bfp::zero(), |acc, balance| acc.add(*balance))
}

/// Computes the invariant `D` for the given scaled balances, rounding down.
///
/// The invariant of balances that sum to zero, or that contain a zero
/// balance, is zero. A single balance is its own invariant.
pub fn calculate_invariant(amplification_parameter: U256, balances: &[Bfp]) -> Result<U256, Error> {
    let sum = sum(balances)?.as_uint256();
    if sum.is_zero() || balances.iter().any(Bfp::is_zero) {
        return Ok(U256::zero());
    }
    if balances.len() == 1 {
        return Ok(sum);
    }

    let num_tokens = U256::from(balances.len());
    let amp_times_total = amplification_parameter.bmul(num_tokens)?;
    let mut invariant = sum;

    for _ in 0..MAX_ITERATIONS {
        let mut d_p = invariant;
        for balance in balances {
            d_p = math::mul_div_down(d_p, invariant, balance.as_uint256().bmul(num_tokens)?)?;
        }
        let prev_invariant = invariant;

        let numerator = math::mul_div_down(amp_times_total, sum, amp_precision())?
            .badd(d_p.bmul(num_tokens)?)?;
        let denominator = math::mul_div_down(
            amp_times_total.bsub(amp_precision())?,
            invariant,
            amp_precision(),
        )?
        .badd(num_tokens.badd(1.into())?.bmul(d_p)?)?;
        invariant = math::mul_div_down(numerator, invariant, denominator)?;

        if math::abs_diff(invariant, prev_invariant) <= U256::one() {
            return Ok(invariant);
        }
    }

    Err(Error::StableInvariantDidntConverge)
}

/// Solves for the balance of `token_index` that yields `invariant` together
/// with all other balances, rounding up. The current balance at
/// `token_index` is ignored.
pub fn get_token_balance_given_invariant_and_all_other_balances(
    amplification_parameter: U256,
    balances: &[Bfp],
    invariant: U256,
    token_index: usize,
) -> Result<Bfp, Error> {
    if balances.len() == 1 {
        return Ok(Bfp::from_wei(invariant));
    }

    let num_tokens = U256::from(balances.len());
    let amp_times_total = amplification_parameter.bmul(num_tokens)?;

    // c = D^(n+1) * P / (Ann * n^n * prod(other balances))
    // b = sum(other balances) + D * P / Ann
    let mut c = invariant;
    let mut other_sum = U256::zero();
    for (j, balance) in balances.iter().enumerate() {
        if j == token_index {
            continue;
        }
        let balance = balance.as_uint256();
        c = math::mul_div_up(c, invariant, balance.bmul(num_tokens)?)?;
        other_sum = other_sum.badd(balance)?;
    }
    c = math::mul_div_up(
        c,
        invariant.bmul(amp_precision())?,
        amp_times_total.bmul(num_tokens)?,
    )?;
    let b = other_sum.badd(math::mul_div_down(
        invariant,
        amp_precision(),
        amp_times_total,
    )?)?;

    let inv2 = invariant.bmul(invariant)?;
    let mut token_balance = inv2.badd(c)?.bdiv_up(invariant.badd(b)?)?;

    for _ in 0..MAX_ITERATIONS {
        let prev_token_balance = token_balance;
        token_balance = token_balance
            .bmul(token_balance)?
            .badd(c)?
            .bdiv_up(token_balance.bmul(2.into())?.badd(b)?.bsub(invariant)?)?;

        if math::abs_diff(token_balance, prev_token_balance) <= U256::one() {
            return Ok(Bfp::from_wei(token_balance));
        }
    }

    Err(Error::StableGetBalanceDidntConverge)
}

/// Computes how many tokens can be taken out of the pool for
/// `token_amount_in` of another token, keeping the invariant of `balances`
/// constant. `balances` is restored before returning.
pub fn calc_out_given_in(
    amplification_parameter: U256,
    balances: &mut [Bfp],
    token_index_in: usize,
    token_index_out: usize,
    token_amount_in: Bfp,
) -> Result<Bfp, Error> {
    let invariant = calculate_invariant(amplification_parameter, balances)?;

    balances[token_index_in] = balances[token_index_in].add(token_amount_in)?;
    let final_balance_out = get_token_balance_given_invariant_and_all_other_balances(
        amplification_parameter,
        balances,
        invariant,
        token_index_out,
    );
    balances[token_index_in] = balances[token_index_in].sub(token_amount_in)?;
    let final_balance_out = final_balance_out?;

    // Rounding in the pool's favour; an output that rounds to nothing is
    // reported as zero.
    Ok(Bfp::from_wei(
        balances[token_index_out]
            .as_uint256()
            .saturating_sub(final_balance_out.as_uint256())
            .saturating_sub(U256::one()),
    ))
}

/// Computes how many tokens must be sent to the pool to take
/// `token_amount_out` of another token, keeping the invariant of `balances`
/// constant. `balances` is restored before returning.
pub fn calc_in_given_out(
    amplification_parameter: U256,
    balances: &mut [Bfp],
    token_index_in: usize,
    token_index_out: usize,
    token_amount_out: Bfp,
) -> Result<Bfp, Error> {
    let invariant = calculate_invariant(amplification_parameter, balances)?;

    balances[token_index_out] = balances[token_index_out].sub(token_amount_out)?;
    let final_balance_in = get_token_balance_given_invariant_and_all_other_balances(
        amplification_parameter,
        balances,
        invariant,
        token_index_in,
    );
    balances[token_index_out] = balances[token_index_out].add(token_amount_out)?;
    let final_balance_in = final_balance_in?;

    final_balance_in
        .sub(balances[token_index_in])?
        .add(Bfp::from_wei(U256::one()))
}

/// BPT minted for an unbalanced deposit. Amounts deviating from the current
/// balance proportions pay the swap fee.
pub fn calc_bpt_out_given_exact_tokens_in(
    amplification_parameter: U256,
    balances: &[Bfp],
    amounts_in: &[Bfp],
    bpt_total_supply: U256,
    current_invariant: U256,
    swap_fee_percentage: Bfp,
) -> Result<U256, Error> {
    let sum_balances = sum(balances)?;

    let mut balance_ratios_with_fee = Vec::with_capacity(balances.len());
    let mut invariant_ratio_with_fees = Bfp::zero();
    for (balance, amount_in) in balances.iter().zip(amounts_in) {
        let current_weight = balance.div_down(sum_balances)?;
        let ratio = balance.add(*amount_in)?.div_down(*balance)?;
        invariant_ratio_with_fees = invariant_ratio_with_fees.add(ratio.mul_down(current_weight)?)?;
        balance_ratios_with_fee.push(ratio);
    }

    let mut new_balances = Vec::with_capacity(balances.len());
    for (balance, amount_in, ratio) in izip!(balances, amounts_in, &balance_ratios_with_fee) {
        let amount_in_without_fee = if *ratio > invariant_ratio_with_fees {
            let non_taxable_amount = if invariant_ratio_with_fees > Bfp::one() {
                balance.mul_down(invariant_ratio_with_fees.sub(Bfp::one())?)?
            } else {
                Bfp::zero()
            };
            let swap_fee = amount_in
                .sub(non_taxable_amount)?
                .mul_up(swap_fee_percentage)?;
            amount_in.sub(swap_fee)?
        } else {
            *amount_in
        };
        new_balances.push(balance.add(amount_in_without_fee)?);
    }

    let new_invariant = Bfp::from_wei(calculate_invariant(amplification_parameter, &new_balances)?);
    let invariant_ratio = new_invariant.div_down(Bfp::from_wei(current_invariant))?;
    if invariant_ratio > Bfp::one() {
        Ok(Bfp::from_wei(bpt_total_supply)
            .mul_down(invariant_ratio.sub(Bfp::one())?)?
            .as_uint256())
    } else {
        Ok(U256::zero())
    }
}

/// Amount of a single token required to mint exactly `bpt_amount_out`.
pub fn calc_token_in_given_exact_bpt_out(
    amplification_parameter: U256,
    balances: &[Bfp],
    token_index: usize,
    bpt_amount_out: U256,
    bpt_total_supply: U256,
    current_invariant: U256,
    swap_fee_percentage: Bfp,
) -> Result<Bfp, Error> {
    let supply = Bfp::from_wei(bpt_total_supply);
    let new_invariant = supply
        .add(Bfp::from_wei(bpt_amount_out))?
        .div_up(supply)?
        .mul_up(Bfp::from_wei(current_invariant))?;

    let new_balance = get_token_balance_given_invariant_and_all_other_balances(
        amplification_parameter,
        balances,
        new_invariant.as_uint256(),
        token_index,
    )?;
    let amount_in_without_fee = new_balance.sub(balances[token_index])?;

    let current_weight = balances[token_index].div_down(sum(balances)?)?;
    let taxable_percentage = current_weight.complement();
    let taxable_amount = amount_in_without_fee.mul_up(taxable_percentage)?;
    let non_taxable_amount = amount_in_without_fee.sub(taxable_amount)?;

    non_taxable_amount.add(taxable_amount.div_up(swap_fee_percentage.complement())?)
}

/// BPT burned for an unbalanced withdrawal, rounding up.
pub fn calc_bpt_in_given_exact_tokens_out(
    amplification_parameter: U256,
    balances: &[Bfp],
    amounts_out: &[Bfp],
    bpt_total_supply: U256,
    current_invariant: U256,
    swap_fee_percentage: Bfp,
) -> Result<U256, Error> {
    let sum_balances = sum(balances)?;

    let mut balance_ratios_without_fee = Vec::with_capacity(balances.len());
    let mut invariant_ratio_without_fees = Bfp::zero();
    for (balance, amount_out) in balances.iter().zip(amounts_out) {
        let current_weight = balance.div_up(sum_balances)?;
        let ratio = balance.sub(*amount_out)?.div_up(*balance)?;
        invariant_ratio_without_fees =
            invariant_ratio_without_fees.add(ratio.mul_up(current_weight)?)?;
        balance_ratios_without_fee.push(ratio);
    }

    let mut new_balances = Vec::with_capacity(balances.len());
    for (balance, amount_out, ratio) in izip!(balances, amounts_out, &balance_ratios_without_fee) {
        let amount_out_with_fee = if invariant_ratio_without_fees > *ratio {
            let non_taxable_amount = balance.mul_down(invariant_ratio_without_fees.complement())?;
            let taxable_amount = amount_out.sub(non_taxable_amount)?;
            non_taxable_amount.add(taxable_amount.div_up(swap_fee_percentage.complement())?)?
        } else {
            *amount_out
        };
        new_balances.push(balance.sub(amount_out_with_fee)?);
    }

    let new_invariant = Bfp::from_wei(calculate_invariant(amplification_parameter, &new_balances)?);
    let invariant_ratio = new_invariant.div_down(Bfp::from_wei(current_invariant))?;
    Ok(Bfp::from_wei(bpt_total_supply)
        .mul_up(invariant_ratio.complement())?
        .as_uint256())
}

/// Amount of a single token paid out for burning exactly `bpt_amount_in`.
pub fn calc_token_out_given_exact_bpt_in(
    amplification_parameter: U256,
    balances: &[Bfp],
    token_index: usize,
    bpt_amount_in: U256,
    bpt_total_supply: U256,
    current_invariant: U256,
    swap_fee_percentage: Bfp,
) -> Result<Bfp, Error> {
    let supply = Bfp::from_wei(bpt_total_supply);
    let new_invariant = supply
        .sub(Bfp::from_wei(bpt_amount_in))?
        .div_up(supply)?
        .mul_up(Bfp::from_wei(current_invariant))?;

    let new_balance = get_token_balance_given_invariant_and_all_other_balances(
        amplification_parameter,
        balances,
        new_invariant.as_uint256(),
        token_index,
    )?;
    let amount_out_without_fee = balances[token_index].sub(new_balance)?;

    let current_weight = balances[token_index].div_down(sum(balances)?)?;
    let taxable_percentage = current_weight.complement();
    let taxable_amount = amount_out_without_fee.mul_up(taxable_percentage)?;
    let non_taxable_amount = amount_out_without_fee.sub(taxable_amount)?;

    non_taxable_amount.add(taxable_amount.mul_down(swap_fee_percentage.complement())?)
}
