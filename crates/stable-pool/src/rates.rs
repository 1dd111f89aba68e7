//! Token rates and the scaling of raw balances into the 18 decimal, rate
//! adjusted values the stable math operates on.

use {
    crate::{
        config::TokenConfig,
        error::{Error, PoolError},
        fixed_point::Bfp,
    },
    ethereum_types::U256,
};

/// External source of a token's exchange rate, as an 18 decimal fixed point
/// integer.
#[cfg_attr(test, mockall::automock)]
pub trait RateProvider {
    fn get_rate(&self) -> anyhow::Result<U256>;
}

/// Cached rate of one token. Timestamps and durations are in seconds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TokenRateCache {
    /// The token has no rate provider; its rate is always one.
    Unit,
    /// The token has a rate provider that was never queried.
    Empty { duration: u64 },
    Cached {
        rate: Bfp,
        updated_at: u64,
        duration: u64,
    },
}

impl TokenRateCache {
    pub fn for_token(token: &TokenConfig) -> Self {
        match token.rate_provider {
            Some(_) => Self::Empty {
                duration: token.cache_duration.as_secs(),
            },
            None => Self::Unit,
        }
    }

    /// The cached rate, if it is still fresh at `now`.
    pub fn rate_at(&self, now: u64) -> Option<Bfp> {
        match *self {
            Self::Unit => Some(Bfp::one()),
            Self::Empty { .. } => None,
            Self::Cached {
                rate,
                updated_at,
                duration,
            } => (now.saturating_sub(updated_at) < duration).then_some(rate),
        }
    }

    /// Fetches a new rate from `provider`. Fails without touching the cache
    /// when the provider errors or reports a zero rate.
    pub fn refreshed(
        &self,
        token: &TokenConfig,
        provider: &dyn RateProvider,
        now: u64,
    ) -> Result<Self, PoolError> {
        let duration = match *self {
            Self::Unit => {
                return Err(PoolError::InvalidConfig(format!(
                    "token {:?} has no rate provider",
                    token.address
                )));
            }
            Self::Empty { duration } | Self::Cached { duration, .. } => duration,
        };

        let rate = provider
            .get_rate()
            .and_then(|rate| {
                anyhow::ensure!(!rate.is_zero(), "provider returned a zero rate");
                Ok(rate)
            })
            .map_err(|source| {
                tracing::warn!(token = ?token.address, ?source, "rejected token rate update");
                PoolError::RateProviderFailure {
                    token: token.address,
                    source,
                }
            })?;

        Ok(Self::Cached {
            rate: Bfp::from_wei(rate),
            updated_at: now,
            duration,
        })
    }
}

/// The current rate of every token, failing with [`PoolError::StaleRate`] for
/// the first token whose cache expired.
pub fn current_rates(
    tokens: &[TokenConfig],
    caches: &[TokenRateCache],
    now: u64,
) -> Result<Vec<Bfp>, PoolError> {
    tokens
        .iter()
        .zip(caches)
        .map(|(token, cache)| {
            cache.rate_at(now).ok_or(PoolError::StaleRate {
                token: token.address,
            })
        })
        .collect()
}

/// Per token factors converting raw amounts into scaled amounts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScalingFactors(Vec<Bfp>);

impl ScalingFactors {
    /// The factor of a token is `10^(18 - decimals) * rate`.
    pub fn new(tokens: &[TokenConfig], rates: &[Bfp]) -> Result<Self, Error> {
        tokens
            .iter()
            .zip(rates)
            .map(|(token, rate)| Bfp::exp10(18 - usize::from(token.decimals)).mul_down(*rate))
            .collect::<Result<_, _>>()
            .map(Self)
    }

    pub fn token_count(&self) -> usize {
        self.0.len()
    }

    /// Scales the input token amount to the value that is used by the stable
    /// math, rounding down.
    pub fn upscale(&self, index: usize, amount: U256) -> Result<Bfp, Error> {
        Bfp::from_wei(amount).mul_down(self.0[index])
    }

    /// Like [`Self::upscale`] but rounding up, for amounts leaving the pool.
    pub fn upscale_up(&self, index: usize, amount: U256) -> Result<Bfp, Error> {
        Bfp::from_wei(amount).mul_up(self.0[index])
    }

    pub fn upscale_all(&self, amounts: &[U256]) -> Result<Vec<Bfp>, Error> {
        amounts
            .iter()
            .enumerate()
            .map(|(index, amount)| self.upscale(index, *amount))
            .collect()
    }

    /// Returns the token amount corresponding to the scaled amount, rounding
    /// up.
    pub fn downscale_up(&self, index: usize, amount: Bfp) -> Result<U256, Error> {
        Ok(amount.div_up(self.0[index])?.as_uint256())
    }

    pub fn downscale_down(&self, index: usize, amount: Bfp) -> Result<U256, Error> {
        Ok(amount.div_down(self.0[index])?.as_uint256())
    }
}

/// Scales raw balances with the current token rates.
pub fn scale(
    balances: &[U256],
    tokens: &[TokenConfig],
    caches: &[TokenRateCache],
    now: u64,
) -> Result<Vec<Bfp>, PoolError> {
    let rates = current_rates(tokens, caches, now)?;
    Ok(ScalingFactors::new(tokens, &rates)?.upscale_all(balances)?)
}
