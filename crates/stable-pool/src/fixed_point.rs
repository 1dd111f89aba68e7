//! Module emulating the operations on fixed points with exactly 18 decimals
//! as used in the Balancer smart contracts.

use {
    crate::{
        error::Error,
        math::{self, BalU256},
    },
    anyhow::{Context, Result, bail, ensure},
    ethereum_types::U256,
    std::{
        fmt::{self, Debug, Display, Formatter},
        str::FromStr,
        sync::LazyLock,
    },
};

/// Parses a decimal string literal into a [`Bfp`], panicking on invalid
/// input. Meant for constants and tests.
#[macro_export]
macro_rules! bfp {
    ($value:expr) => {
        $value
            .parse::<$crate::fixed_point::Bfp>()
            .expect("valid fixed point literal")
    };
}

static ONE_18: LazyLock<U256> = LazyLock::new(|| U256::exp10(18));
const DECIMALS: usize = 18;

/// Balancer fixed point number: an unsigned integer scaled by `10^18`.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Bfp(U256);

impl Bfp {
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    pub fn one() -> Self {
        Self(*ONE_18)
    }

    /// The fixed point value `10^exp`.
    pub fn exp10(exp: usize) -> Self {
        Self(U256::exp10(exp + DECIMALS))
    }

    pub fn from_wei(num: U256) -> Self {
        Self(num)
    }

    pub fn as_uint256(self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(self, other: Self) -> Result<Self, Error> {
        Ok(Self(self.0.badd(other.0)?))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(self, other: Self) -> Result<Self, Error> {
        Ok(Self(self.0.bsub(other.0)?))
    }

    pub fn mul_down(self, other: Self) -> Result<Self, Error> {
        Ok(Self(math::mul_div_down(self.0, other.0, *ONE_18)?))
    }

    pub fn mul_up(self, other: Self) -> Result<Self, Error> {
        Ok(Self(math::mul_div_up(self.0, other.0, *ONE_18)?))
    }

    pub fn div_down(self, other: Self) -> Result<Self, Error> {
        if other.is_zero() {
            return Err(Error::ZeroDivision);
        }
        Ok(Self(math::mul_div_down(self.0, *ONE_18, other.0)?))
    }

    pub fn div_up(self, other: Self) -> Result<Self, Error> {
        if other.is_zero() {
            return Err(Error::ZeroDivision);
        }
        Ok(Self(math::mul_div_up(self.0, *ONE_18, other.0)?))
    }

    /// Returns `1 - self`, or zero when `self` is at least one.
    pub fn complement(self) -> Self {
        if self.0 < *ONE_18 {
            Self(*ONE_18 - self.0)
        } else {
            Self::zero()
        }
    }
}

impl FromStr for Bfp {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (units, decimals) = s.split_once('.').unwrap_or((s, "0"));
        if units.is_empty() || decimals.is_empty() {
            bail!("Invalid decimal representation");
        }
        ensure!(
            decimals.len() <= DECIMALS,
            "Decimal precision {} exceeds the supported {DECIMALS} decimals",
            decimals.len(),
        );

        let units = U256::from_dec_str(units)?;
        let decimals = U256::from_dec_str(&format!("{decimals:0<DECIMALS$}"))?;
        let value = units
            .checked_mul(*ONE_18)
            .and_then(|units| units.checked_add(decimals))
            .context("Number too large for 18 decimal fixed point")?;
        Ok(Self(value))
    }
}

impl<'de> serde::Deserialize<'de> for Bfp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl serde::Serialize for Bfp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl Display for Bfp {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "{}.{:0>18}",
            self.0 / *ONE_18,
            (self.0 % *ONE_18).as_u128()
        )
    }
}

impl Debug for Bfp {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        Display::fmt(self, formatter)
    }
}
