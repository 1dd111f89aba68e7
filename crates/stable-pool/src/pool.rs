//! The stable pool: configuration, rate caches, ledger and fee snapshot
//! behind the operations exposed to the vault.
//!
//! Operations on one pool must be serialized by the caller; `&mut self`
//! enforces this within a process. Every operation computes its complete
//! effect on copies of the state and commits it by assignment at the very
//! end, so a failing operation leaves the pool untouched.

use {
    crate::{
        config::{AmplificationParameter, PoolConfig, ProtocolFees},
        error::PoolError,
        fees::{FeeAccountant, FeeMint, InvariantSnapshot},
        fixed_point::Bfp,
        join_exit::{self, JoinExitOutcome, JoinExitRequest, PoolSnapshot},
        ledger::{PoolTokenLedger, minimum_bpt},
        rates::{self, RateProvider, ScalingFactors, TokenRateCache},
        stable_math,
        swap::{self, SwapOutcome, SwapRequest},
    },
    ethereum_types::U256,
};

/// Caller owned, time varying parameters of an operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OperationContext {
    /// Current time in seconds, used for rate cache expiry.
    pub timestamp: u64,
    /// Current amplification, which may be ramping.
    pub amplification: AmplificationParameter,
    pub protocol_fees: ProtocolFees,
}

impl OperationContext {
    /// Context using the configured amplification and no protocol fees.
    pub fn at(timestamp: u64, config: &PoolConfig) -> Self {
        Self {
            timestamp,
            amplification: config.amplification(),
            protocol_fees: ProtocolFees::default(),
        }
    }

    pub fn with_protocol_fees(mut self, protocol_fees: ProtocolFees) -> Self {
        self.protocol_fees = protocol_fees;
        self
    }
}

/// Pool state after fees were settled, before the operation itself.
struct Settled {
    ledger: PoolTokenLedger,
    snapshot: InvariantSnapshot,
    protocol_fee: FeeMint,
}

#[derive(Clone, Debug)]
pub struct StablePool {
    config: PoolConfig,
    rate_caches: Vec<TokenRateCache>,
    ledger: PoolTokenLedger,
    snapshot: Option<InvariantSnapshot>,
}

impl StablePool {
    pub fn new(config: PoolConfig) -> Self {
        let rate_caches = config.tokens().iter().map(TokenRateCache::for_token).collect();
        let ledger = PoolTokenLedger::empty(config.token_count());
        Self {
            config,
            rate_caches,
            ledger,
            snapshot: None,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn ledger(&self) -> &PoolTokenLedger {
        &self.ledger
    }

    pub fn rate_caches(&self) -> &[TokenRateCache] {
        &self.rate_caches
    }

    /// The snapshot of the last fee settlement, `None` before initialization.
    pub fn snapshot(&self) -> Option<&InvariantSnapshot> {
        self.snapshot.as_ref()
    }

    /// Refreshes the cached rate of the token at `index` from its provider.
    pub fn update_token_rate_cache(
        &mut self,
        index: usize,
        provider: &dyn RateProvider,
        now: u64,
    ) -> Result<Bfp, PoolError> {
        self.config.check_index(index)?;
        let token = &self.config.tokens()[index];
        let cache = self.rate_caches[index].refreshed(token, provider, now)?;
        let rate = cache.rate_at(now).unwrap_or_default();
        tracing::debug!(token = ?token.address, %rate, now, "updated token rate cache");
        self.rate_caches[index] = cache;
        Ok(rate)
    }

    /// Balances upscaled with the current rates. Fails if any rate is stale.
    pub fn scaled_balances(&self, now: u64) -> Result<Vec<Bfp>, PoolError> {
        rates::scale(
            self.ledger.balances(),
            self.config.tokens(),
            &self.rate_caches,
            now,
        )
    }

    /// The invariant of the current balances.
    pub fn invariant(&self, ctx: &OperationContext) -> Result<U256, PoolError> {
        Ok(stable_math::calculate_invariant(
            ctx.amplification.scaled(),
            &self.scaled_balances(ctx.timestamp)?,
        )?)
    }

    /// BPT supply including the protocol fees that would be minted by
    /// settling now.
    pub fn actual_supply(&self, ctx: &OperationContext) -> Result<U256, PoolError> {
        if !self.ledger.is_initialized() {
            return Ok(U256::zero());
        }
        let rates = self.current_rates(ctx.timestamp)?;
        Ok(self.settle(&rates, ctx)?.ledger.bpt_supply())
    }

    /// Value of one BPT in units of the invariant.
    pub fn rate(&self, ctx: &OperationContext) -> Result<Bfp, PoolError> {
        let supply = self.actual_supply(ctx)?;
        if supply.is_zero() {
            return Err(PoolError::NotInitialized);
        }
        Ok(Bfp::from_wei(self.invariant(ctx)?).div_down(Bfp::from_wei(supply))?)
    }

    #[tracing::instrument(skip_all, fields(kind = request.kind()))]
    pub fn join_exit(
        &mut self,
        request: &JoinExitRequest,
        ctx: &OperationContext,
    ) -> Result<JoinExitOutcome, PoolError> {
        let rates = self.current_rates(ctx.timestamp)?;
        let scaling = ScalingFactors::new(self.config.tokens(), &rates)?;
        let amplification = ctx.amplification.scaled();

        let (ledger, bpt_amount, amounts, protocol_fee) = match request {
            JoinExitRequest::Init { amounts_in } => {
                if self.ledger.is_initialized() {
                    return Err(PoolError::AlreadyInitialized);
                }
                let (delta, _) = join_exit::compute_init(amounts_in, amplification, &scaling)?;
                let ledger = self.ledger.apply(&delta)?;
                let protocol_fee = FeeMint {
                    recipient: ctx.protocol_fees.recipient(),
                    amount: U256::zero(),
                };
                (
                    ledger,
                    delta.bpt_amount - minimum_bpt(),
                    delta.amounts,
                    protocol_fee,
                )
            }
            _ => {
                let settled = self.settle(&rates, ctx)?;
                let scaled_balances = scaling.upscale_all(settled.ledger.balances())?;
                let invariant = stable_math::calculate_invariant(amplification, &scaled_balances)?;
                let delta = join_exit::compute(
                    request,
                    &PoolSnapshot {
                        amplification,
                        swap_fee: self.config.swap_fee(),
                        scaling: &scaling,
                        balances: settled.ledger.balances(),
                        scaled_balances: &scaled_balances,
                        supply: settled.ledger.bpt_supply(),
                        invariant,
                    },
                )?;
                let ledger = settled.ledger.apply(&delta)?;
                (ledger, delta.bpt_amount, delta.amounts, settled.protocol_fee)
            }
        };

        // The operation's own invariant change is not growth the protocol
        // takes a share of.
        let snapshot = InvariantSnapshot {
            invariant: stable_math::calculate_invariant(
                amplification,
                &scaling.upscale_all(ledger.balances())?,
            )?,
            supply: ledger.bpt_supply(),
            amplification,
            rates,
        };

        let outcome = JoinExitOutcome {
            kind: request.kind(),
            flow: request.flow(),
            bpt_amount,
            amounts,
            protocol_fee,
        };
        tracing::debug!(
            bpt_amount = %outcome.bpt_amount,
            amounts = ?outcome.amounts,
            protocol_fee = %outcome.protocol_fee.amount,
            supply = %ledger.bpt_supply(),
            "processed join/exit"
        );

        self.ledger = ledger;
        self.snapshot = Some(snapshot);
        Ok(outcome)
    }

    #[tracing::instrument(skip_all, fields(kind = ?request.kind))]
    pub fn swap(
        &mut self,
        request: &SwapRequest,
        ctx: &OperationContext,
    ) -> Result<SwapOutcome, PoolError> {
        self.config.check_index(request.token_in)?;
        self.config.check_index(request.token_out)?;
        let rates = self.current_rates(ctx.timestamp)?;
        let scaling = ScalingFactors::new(self.config.tokens(), &rates)?;
        let settled = self.settle(&rates, ctx)?;

        let scaled_balances = scaling.upscale_all(settled.ledger.balances())?;
        let amounts = swap::compute(
            request,
            ctx.amplification.scaled(),
            self.config.swap_fee(),
            &scaling,
            settled.ledger.balances(),
            &scaled_balances,
        )?;
        let ledger = settled.ledger.swap(
            request.token_in,
            amounts.amount_in,
            request.token_out,
            amounts.amount_out,
        )?;

        let outcome = SwapOutcome {
            amount_in: amounts.amount_in,
            amount_out: amounts.amount_out,
            fee: amounts.fee,
            protocol_fee: settled.protocol_fee,
        };
        tracing::debug!(
            token_in = request.token_in,
            token_out = request.token_out,
            amount_in = %outcome.amount_in,
            amount_out = %outcome.amount_out,
            fee = %outcome.fee,
            "processed swap"
        );

        self.ledger = ledger;
        self.snapshot = Some(settled.snapshot);
        Ok(outcome)
    }

    fn current_rates(&self, now: u64) -> Result<Vec<Bfp>, PoolError> {
        rates::current_rates(self.config.tokens(), &self.rate_caches, now)
    }

    /// Settles protocol fees on copies of the ledger and snapshot.
    fn settle(&self, rates: &[Bfp], ctx: &OperationContext) -> Result<Settled, PoolError> {
        let snapshot = self.snapshot.as_ref().ok_or(PoolError::NotInitialized)?;
        let settlement = FeeAccountant {
            tokens: self.config.tokens(),
            protocol_fees: &ctx.protocol_fees,
        }
        .settle(
            snapshot,
            self.ledger.balances(),
            rates,
            self.ledger.bpt_supply(),
        )?;

        Ok(Settled {
            ledger: self.ledger.mint(settlement.bpt_to_mint)?,
            snapshot: settlement.snapshot,
            protocol_fee: FeeMint {
                recipient: ctx.protocol_fees.recipient(),
                amount: settlement.bpt_to_mint,
            },
        })
    }
}
