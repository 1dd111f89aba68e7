//! Static pool configuration: tokens, amplification, swap fee and protocol
//! fee percentages.

use {
    crate::{
        error::{PoolError, TokenRef},
        fixed_point::Bfp,
    },
    anyhow::{Context, Result, ensure},
    ethereum_types::{H160, U256},
    serde::{Deserialize, Deserializer, Serializer, de, de::DeserializeOwned},
    serde_with::{DeserializeAs, SerializeAs},
    std::{path::Path, time::Duration},
};

/// Precision the stable math expects the amplification to be expressed in.
pub const AMP_PRECISION: u64 = 1_000;
pub const MIN_AMP: u64 = 1;
pub const MAX_AMP: u64 = 5_000;
pub const MAX_TOKENS: usize = 5;

/// Largest protocol fee percentage the pool accepts (50%).
const MAX_PROTOCOL_FEE_PERCENTAGE: &str = "0.5";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AmplificationParameter {
    factor: U256,
    precision: U256,
}

impl AmplificationParameter {
    pub fn try_new(factor: U256, precision: U256) -> Result<Self> {
        ensure!(!precision.is_zero(), "Zero precision not allowed");
        let amp = Self { factor, precision };
        let value = amp
            .with_base(AMP_PRECISION.into())
            .context("amplification overflows")?;
        ensure!(
            value >= U256::from(MIN_AMP * AMP_PRECISION)
                && value <= U256::from(MAX_AMP * AMP_PRECISION),
            "amplification {factor}/{precision} outside of [{MIN_AMP}, {MAX_AMP}]",
        );
        Ok(amp)
    }

    /// Amplification given as a plain integer, e.g. `200`.
    pub fn from_value(value: u64) -> Result<Self> {
        Self::try_new(value.into(), 1.into())
    }

    /// This is the format the stable math works with.
    pub fn with_base(&self, base: U256) -> Option<U256> {
        Some(self.factor.checked_mul(base)? / self.precision)
    }

    /// The amplification at [`AMP_PRECISION`], as passed to the stable math.
    pub fn scaled(&self) -> U256 {
        // Range checked on construction, so this neither overflows nor
        // leaves the bounds.
        self.with_base(AMP_PRECISION.into())
            .unwrap_or_else(|| U256::from(MAX_AMP * AMP_PRECISION))
    }

    pub fn factor(&self) -> U256 {
        self.factor
    }

    pub fn precision(&self) -> U256 {
        self.precision
    }
}

impl<'de> Deserialize<'de> for AmplificationParameter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = u64::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TokenConfig {
    pub address: H160,
    pub decimals: u8,
    #[serde(default)]
    pub rate_provider: Option<H160>,
    #[serde(default, with = "humantime_serde")]
    pub cache_duration: Duration,
    #[serde(default)]
    pub exempt_from_yield_fee: bool,
}

impl TokenConfig {
    /// A token without a rate provider.
    pub fn new(address: H160, decimals: u8) -> Self {
        Self {
            address,
            decimals,
            rate_provider: None,
            cache_duration: Duration::ZERO,
            exempt_from_yield_fee: false,
        }
    }

    pub fn with_rate_provider(mut self, provider: H160, cache_duration: Duration) -> Self {
        self.rate_provider = Some(provider);
        self.cache_duration = cache_duration;
        self
    }

    pub fn exempt_from_yield_fee(mut self) -> Self {
        self.exempt_from_yield_fee = true;
        self
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawPoolConfig {
    address: H160,
    tokens: Vec<TokenConfig>,
    amplification: AmplificationParameter,
    swap_fee: Bfp,
}

/// Configuration of a stable pool. Token order is the tradable index order
/// and never changes after construction.
#[derive(Clone, Debug, Deserialize)]
#[serde(try_from = "RawPoolConfig")]
pub struct PoolConfig {
    address: H160,
    tokens: Vec<TokenConfig>,
    amplification: AmplificationParameter,
    swap_fee: Bfp,
}

impl PoolConfig {
    pub fn new(
        address: H160,
        tokens: Vec<TokenConfig>,
        amplification: AmplificationParameter,
        swap_fee: Bfp,
    ) -> Result<Self, PoolError> {
        let invalid = |reason: String| Err(PoolError::InvalidConfig(reason));

        if tokens.is_empty() || tokens.len() > MAX_TOKENS {
            return invalid(format!(
                "pool needs between 1 and {MAX_TOKENS} tokens, got {}",
                tokens.len()
            ));
        }
        if !tokens.windows(2).all(|pair| pair[0].address < pair[1].address) {
            return invalid("token addresses must be unique and sorted".into());
        }
        if tokens.iter().any(|token| token.address == address) {
            return invalid("the pool token cannot be a tradable token".into());
        }
        for token in &tokens {
            if token.decimals > 18 {
                return invalid(format!(
                    "token {:?} has {} decimals, at most 18 are supported",
                    token.address, token.decimals
                ));
            }
            match token.rate_provider {
                Some(_) if token.cache_duration.is_zero() => {
                    return invalid(format!(
                        "token {:?} has a rate provider but no cache duration",
                        token.address
                    ));
                }
                None if token.exempt_from_yield_fee => {
                    return invalid(format!(
                        "token {:?} is exempt from yield fees but has no rate provider",
                        token.address
                    ));
                }
                _ => {}
            }
        }
        if swap_fee >= Bfp::one() {
            return invalid(format!("swap fee {swap_fee} must be below 1"));
        }

        Ok(Self {
            address,
            tokens,
            amplification,
            swap_fee,
        })
    }

    /// Address of the pool, which is also the identity of its BPT.
    pub fn address(&self) -> H160 {
        self.address
    }

    pub fn tokens(&self) -> &[TokenConfig] {
        &self.tokens
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn amplification(&self) -> AmplificationParameter {
        self.amplification
    }

    pub fn swap_fee(&self) -> Bfp {
        self.swap_fee
    }

    /// All tokens registered for the pool, the BPT included, sorted by
    /// address.
    pub fn registered_tokens(&self) -> Vec<H160> {
        let mut tokens: Vec<_> = self.tokens.iter().map(|token| token.address).collect();
        tokens.push(self.address);
        tokens.sort();
        tokens
    }

    /// Maps a token address to its tradable index.
    pub fn token_index(&self, address: H160) -> Result<usize, PoolError> {
        self.tokens
            .iter()
            .position(|token| token.address == address)
            .ok_or(PoolError::InvalidTokenIndex(TokenRef::Address(address)))
    }

    pub(crate) fn check_index(&self, index: usize) -> Result<(), PoolError> {
        if index < self.tokens.len() {
            Ok(())
        } else {
            Err(PoolError::InvalidTokenIndex(TokenRef::Index(index)))
        }
    }
}

impl TryFrom<RawPoolConfig> for PoolConfig {
    type Error = PoolError;

    fn try_from(raw: RawPoolConfig) -> Result<Self, Self::Error> {
        Self::new(raw.address, raw.tokens, raw.amplification, raw.swap_fee)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawProtocolFees {
    recipient: H160,
    swap_fee_percentage: Bfp,
    yield_fee_percentage: Bfp,
}

/// Protocol share of swap fees and of yield, and where the BPT minted for
/// them goes.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(try_from = "RawProtocolFees")]
pub struct ProtocolFees {
    recipient: H160,
    swap_fee_percentage: Bfp,
    yield_fee_percentage: Bfp,
}

impl ProtocolFees {
    pub fn try_new(
        recipient: H160,
        swap_fee_percentage: Bfp,
        yield_fee_percentage: Bfp,
    ) -> Result<Self, PoolError> {
        let max = MAX_PROTOCOL_FEE_PERCENTAGE
            .parse::<Bfp>()
            .map_err(|err| PoolError::InvalidConfig(err.to_string()))?;
        for (name, value) in [
            ("swap", swap_fee_percentage),
            ("yield", yield_fee_percentage),
        ] {
            if value > max {
                return Err(PoolError::InvalidConfig(format!(
                    "protocol {name} fee percentage {value} exceeds {max}"
                )));
            }
        }
        Ok(Self {
            recipient,
            swap_fee_percentage,
            yield_fee_percentage,
        })
    }

    pub fn recipient(&self) -> H160 {
        self.recipient
    }

    pub fn swap_fee_percentage(&self) -> Bfp {
        self.swap_fee_percentage
    }

    pub fn yield_fee_percentage(&self) -> Bfp {
        self.yield_fee_percentage
    }

    pub fn is_zero(&self) -> bool {
        self.swap_fee_percentage.is_zero() && self.yield_fee_percentage.is_zero()
    }
}

impl TryFrom<RawProtocolFees> for ProtocolFees {
    type Error = PoolError;

    fn try_from(raw: RawProtocolFees) -> Result<Self, Self::Error> {
        Self::try_new(
            raw.recipient,
            raw.swap_fee_percentage,
            raw.yield_fee_percentage,
        )
    }
}

/// Reads and deserializes a TOML file.
pub fn from_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

/// Amounts written as decimal integer strings, for use with
/// `#[serde_as(as = "DecimalU256")]`.
pub struct DecimalU256;

impl<'de> DeserializeAs<'de, U256> for DecimalU256 {
    fn deserialize_as<D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        U256::from_dec_str(&s)
            .map_err(|err| de::Error::custom(format!("invalid decimal amount {s}: {err:?}")))
    }
}

impl SerializeAs<U256> for DecimalU256 {
    fn serialize_as<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(value)
    }
}
