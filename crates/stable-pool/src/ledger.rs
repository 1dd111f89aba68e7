//! Raw token balances and BPT supply of a pool.
//!
//! Every mutation returns a new ledger and leaves `self` untouched, so an
//! operation can compute all of its effects before committing any of them.

use {
    crate::error::{Error, PoolError},
    ethereum_types::U256,
    itertools::izip,
};

/// BPT minted to the zero address on initialization. It can never be burned,
/// so the supply of an initialized pool never drops back to zero.
pub const MINIMUM_BPT: u64 = 1_000_000;

pub fn minimum_bpt() -> U256 {
    U256::from(MINIMUM_BPT)
}

/// Direction of a ledger update.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    /// Tokens enter the pool and BPT is minted.
    In,
    /// Tokens leave the pool and BPT is burned.
    Out,
}

/// Token and BPT amounts moved by a join or exit.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LedgerDelta {
    pub flow: Flow,
    pub amounts: Vec<U256>,
    pub bpt_amount: U256,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PoolTokenLedger {
    balances: Vec<U256>,
    bpt_supply: U256,
}

impl PoolTokenLedger {
    /// Ledger of a pool that was never initialized.
    pub fn empty(token_count: usize) -> Self {
        Self {
            balances: vec![U256::zero(); token_count],
            bpt_supply: U256::zero(),
        }
    }

    pub fn balances(&self) -> &[U256] {
        &self.balances
    }

    pub fn bpt_supply(&self) -> U256 {
        self.bpt_supply
    }

    pub fn is_initialized(&self) -> bool {
        !self.bpt_supply.is_zero()
    }

    /// Largest amount of BPT exits may still burn.
    pub fn burnable_supply(&self) -> U256 {
        self.bpt_supply.saturating_sub(minimum_bpt())
    }

    pub fn apply(&self, delta: &LedgerDelta) -> Result<Self, PoolError> {
        if delta.amounts.len() != self.balances.len() {
            return Err(PoolError::InputLengthMismatch {
                expected: self.balances.len(),
                actual: delta.amounts.len(),
            });
        }

        let (balances, bpt_supply) = match delta.flow {
            Flow::In => (
                izip!(&self.balances, &delta.amounts)
                    .map(|(balance, amount)| {
                        balance.checked_add(*amount).ok_or(Error::AddOverflow)
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                self.bpt_supply
                    .checked_add(delta.bpt_amount)
                    .ok_or(Error::AddOverflow)?,
            ),
            Flow::Out => {
                if delta.bpt_amount > self.burnable_supply() {
                    return Err(PoolError::InsufficientBalance("BPT supply"));
                }
                (
                    izip!(&self.balances, &delta.amounts)
                        .map(|(balance, amount)| {
                            balance
                                .checked_sub(*amount)
                                .ok_or(PoolError::InsufficientBalance("token balance"))
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                    self.bpt_supply - delta.bpt_amount,
                )
            }
        };

        Ok(Self {
            balances,
            bpt_supply,
        })
    }

    /// Mints BPT without moving tokens, as done for protocol fees.
    pub fn mint(&self, amount: U256) -> Result<Self, PoolError> {
        Ok(Self {
            balances: self.balances.clone(),
            bpt_supply: self
                .bpt_supply
                .checked_add(amount)
                .ok_or(PoolError::FeeOverflow)?,
        })
    }

    /// Moves tokens for a swap. The output may never drain a balance.
    pub fn swap(
        &self,
        token_in: usize,
        amount_in: U256,
        token_out: usize,
        amount_out: U256,
    ) -> Result<Self, PoolError> {
        let mut balances = self.balances.clone();
        if amount_out >= balances[token_out] {
            return Err(PoolError::InsufficientBalance("token balance"));
        }
        balances[token_out] -= amount_out;
        balances[token_in] = balances[token_in]
            .checked_add(amount_in)
            .ok_or(Error::AddOverflow)?;
        Ok(Self {
            balances,
            bpt_supply: self.bpt_supply,
        })
    }
}
