//! Checked integer arithmetic emulating the `Math` library used by the
//! Balancer contracts.
//!
//! Products that feed a division are computed at 512 bits so that only a
//! quotient which does not fit 256 bits is reported as an overflow.

use {
    crate::error::Error,
    ethereum_types::{U256, U512},
};

pub trait BalU256: Sized {
    fn badd(self, b: Self) -> Result<Self, Error>;
    fn bsub(self, b: Self) -> Result<Self, Error>;
    fn bmul(self, b: Self) -> Result<Self, Error>;
    fn bdiv_down(self, b: Self) -> Result<Self, Error>;
    fn bdiv_up(self, b: Self) -> Result<Self, Error>;
}

impl BalU256 for U256 {
    fn badd(self, b: Self) -> Result<Self, Error> {
        self.checked_add(b).ok_or(Error::AddOverflow)
    }

    fn bsub(self, b: Self) -> Result<Self, Error> {
        self.checked_sub(b).ok_or(Error::SubOverflow)
    }

    fn bmul(self, b: Self) -> Result<Self, Error> {
        self.checked_mul(b).ok_or(Error::MulOverflow)
    }

    fn bdiv_down(self, b: Self) -> Result<Self, Error> {
        if b.is_zero() {
            return Err(Error::ZeroDivision);
        }
        Ok(self / b)
    }

    fn bdiv_up(self, b: Self) -> Result<Self, Error> {
        if b.is_zero() {
            return Err(Error::ZeroDivision);
        }
        if self.is_zero() {
            return Ok(U256::zero());
        }
        Ok(U256::one() + (self - 1) / b)
    }
}

/// Computes `a * b / c` rounding down, with a 512-bit intermediate product.
pub fn mul_div_down(a: U256, b: U256, c: U256) -> Result<U256, Error> {
    if c.is_zero() {
        return Err(Error::ZeroDivision);
    }
    narrow(a.full_mul(b) / U512::from(c))
}

/// Computes `a * b / c` rounding up, with a 512-bit intermediate product.
pub fn mul_div_up(a: U256, b: U256, c: U256) -> Result<U256, Error> {
    if c.is_zero() {
        return Err(Error::ZeroDivision);
    }
    let product = a.full_mul(b);
    if product.is_zero() {
        return Ok(U256::zero());
    }
    narrow((product - 1) / U512::from(c) + 1)
}

fn narrow(value: U512) -> Result<U256, Error> {
    U256::try_from(value).map_err(|_| Error::MulOverflow)
}

/// Absolute difference of two values, used for Newton convergence checks.
pub fn abs_diff(a: U256, b: U256) -> U256 {
    if a > b { a - b } else { b - a }
}
