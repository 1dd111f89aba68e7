//! End to end scenarios driving a [`StablePool`] through sequences of
//! operations.

use {
    crate::{
        bfp,
        config::{AmplificationParameter, PoolConfig, ProtocolFees, TokenConfig},
        fixed_point::Bfp,
        join_exit::JoinExitRequest,
        pool::{OperationContext, StablePool},
        rates::MockRateProvider,
    },
    ethereum_types::{H160, U256},
    std::{collections::HashMap, time::Duration},
};

mod cases;

pub const START: u64 = 1_700_000_000;
pub const CACHE_DURATION: Duration = Duration::from_secs(300);

pub fn token_address(index: usize) -> H160 {
    H160::from_low_u64_be(0x1000 + index as u64)
}

pub fn fee_recipient() -> H160 {
    H160::repeat_byte(0xfe)
}

/// A provider that must be queried exactly once.
pub fn provider(rate: &'static str) -> MockRateProvider {
    let mut provider = MockRateProvider::new();
    provider
        .expect_get_rate()
        .times(1)
        .returning(move || Ok(rate.parse::<Bfp>()?.as_uint256()));
    provider
}

pub struct Harness {
    pub pool: StablePool,
    pub ctx: OperationContext,
}

impl Harness {
    /// A pool of 18 decimal tokens. Tokens with an entry in `rates` get a
    /// rate provider, those listed in `exempt` are exempt from yield fees.
    pub fn new(token_count: usize, rates: HashMap<usize, &'static str>, exempt: &[usize]) -> Self {
        let tokens = (0..token_count)
            .map(|index| {
                let token = TokenConfig::new(token_address(index), 18);
                if !rates.contains_key(&index) {
                    return token;
                }
                let token = token.with_rate_provider(H160::repeat_byte(0xe0), CACHE_DURATION);
                if exempt.contains(&index) {
                    token.exempt_from_yield_fee()
                } else {
                    token
                }
            })
            .collect();
        let config = PoolConfig::new(
            H160::repeat_byte(0xb0),
            tokens,
            AmplificationParameter::from_value(200).unwrap(),
            bfp!("0.001"),
        )
        .unwrap();

        let mut pool = StablePool::new(config);
        let ctx = OperationContext::at(START, pool.config());
        for (index, rate) in rates {
            pool.update_token_rate_cache(index, &provider(rate), START)
                .unwrap();
        }
        Self { pool, ctx }
    }

    pub fn with_protocol_fees(mut self, swap: &str, yield_: &str) -> Self {
        self.ctx = self.ctx.with_protocol_fees(
            ProtocolFees::try_new(fee_recipient(), swap.parse().unwrap(), yield_.parse().unwrap())
                .unwrap(),
        );
        self
    }

    /// Initializes the pool with `amount` whole tokens of each token.
    pub fn init(mut self, amount: &str) -> Self {
        let amount = amount.parse::<Bfp>().unwrap().as_uint256();
        let amounts_in = vec![amount; self.pool.config().token_count()];
        self.pool
            .join_exit(&JoinExitRequest::Init { amounts_in }, &self.ctx)
            .unwrap();
        self
    }

    /// Moves the clock and refreshes the given rates.
    pub fn advance(&mut self, seconds: u64, rates: HashMap<usize, &'static str>) {
        self.ctx.timestamp += seconds;
        for (index, rate) in rates {
            self.pool
                .update_token_rate_cache(index, &provider(rate), self.ctx.timestamp)
                .unwrap();
        }
    }

    pub fn supply(&self) -> U256 {
        self.pool.ledger().bpt_supply()
    }
}

/// Asserts `actual` is within `tolerance` of `expected`, both in whole units.
pub fn assert_close(actual: U256, expected: &str, tolerance: &str) {
    let expected = expected.parse::<Bfp>().unwrap().as_uint256();
    let tolerance = tolerance.parse::<Bfp>().unwrap().as_uint256();
    let diff = crate::math::abs_diff(actual, expected);
    assert!(
        diff <= tolerance,
        "{} is not within {} of {}",
        Bfp::from_wei(actual),
        Bfp::from_wei(tolerance),
        Bfp::from_wei(expected),
    );
}
