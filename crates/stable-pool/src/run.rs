//! The `pool-sim` command line: loads a pool from a TOML file, initializes it
//! and runs a single operation against it, printing the result as JSON.

use {
    crate::{
        config::{self, DecimalU256, PoolConfig, ProtocolFees},
        error::PoolError,
        fixed_point::Bfp,
        join_exit::{JoinExitOutcome, JoinExitRequest},
        pool::{OperationContext, StablePool},
        rates::RateProvider,
        swap::{SwapKind, SwapOutcome, SwapRequest},
    },
    anyhow::{Context, Result},
    clap::{Parser, Subcommand},
    ethereum_types::{H160, U256},
    serde::{Deserialize, Serialize},
    serde_with::serde_as,
    std::{collections::HashMap, path::PathBuf},
    tracing_subscriber::EnvFilter,
};

#[derive(Debug, Parser)]
#[command(name = "pool-sim", about = "Simulates operations on a stable pool")]
pub struct Arguments {
    /// Path to the TOML file describing the pool and its initial balances.
    #[clap(long, env)]
    pub config: PathBuf,

    #[clap(long, env, default_value = "warn,stable_pool=debug")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Prints balances, supply, invariant and BPT rate.
    State,
    Swap {
        /// Address of the token sent to the pool.
        #[clap(long, value_parser = parse_address)]
        token_in: H160,
        #[clap(long, value_parser = parse_address)]
        token_out: H160,
        /// Raw amount in, or out with `--given-out`.
        #[clap(long, value_parser = parse_amount)]
        amount: U256,
        #[clap(long)]
        given_out: bool,
        #[clap(long, value_parser = parse_amount)]
        limit: Option<U256>,
    },
    /// Joins with all tokens in proportion to the balances.
    JoinProportional {
        #[clap(long, value_parser = parse_amount)]
        bpt_out: U256,
    },
    /// Exits to all tokens in proportion to the balances.
    ExitProportional {
        #[clap(long, value_parser = parse_amount)]
        bpt_in: U256,
    },
}

fn parse_amount(s: &str) -> Result<U256, String> {
    U256::from_dec_str(s).map_err(|err| format!("invalid amount {s}: {err:?}"))
}

fn parse_address(s: &str) -> Result<H160, String> {
    s.parse().map_err(|err| format!("invalid address {s}: {err:?}"))
}

/// Contents of the simulation file.
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SimConfig {
    pub pool: PoolConfig,
    #[serde(default)]
    pub protocol_fees: ProtocolFees,
    /// Time at which every operation runs, in seconds.
    pub timestamp: u64,
    /// Rates reported by the providers of rated tokens, by token address.
    #[serde(default)]
    pub rates: HashMap<H160, Bfp>,
    /// Raw amounts of the initializing join.
    #[serde_as(as = "Vec<DecimalU256>")]
    pub balances: Vec<U256>,
}

/// Rate provider always reporting the same rate.
struct StaticRate(Bfp);

impl RateProvider for StaticRate {
    fn get_rate(&self) -> Result<U256> {
        Ok(self.0.as_uint256())
    }
}

#[serde_as]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolState {
    /// Tokens registered for the pool, the BPT included.
    pub registered_tokens: Vec<H160>,
    #[serde_as(as = "Vec<DecimalU256>")]
    pub balances: Vec<U256>,
    #[serde_as(as = "DecimalU256")]
    pub bpt_supply: U256,
    #[serde_as(as = "DecimalU256")]
    pub actual_supply: U256,
    #[serde_as(as = "DecimalU256")]
    pub invariant: U256,
    pub rate: Bfp,
}

impl PoolState {
    fn of(pool: &StablePool, ctx: &OperationContext) -> Result<Self> {
        Ok(Self {
            registered_tokens: pool.config().registered_tokens(),
            balances: pool.ledger().balances().to_vec(),
            bpt_supply: pool.ledger().bpt_supply(),
            actual_supply: pool.actual_supply(ctx)?,
            invariant: pool.invariant(ctx)?,
            rate: pool.rate(ctx)?,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Swap(SwapOutcome),
    JoinExit(JoinExitOutcome),
}

#[derive(Debug, Serialize)]
pub struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    pub state: PoolState,
}

pub fn start(args: impl Iterator<Item = String>) {
    let args = Arguments::parse_from(args);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log_filter))
        .with_writer(std::io::stderr)
        .init();
    tracing::info!("running pool-sim with {args:#?}");

    if let Err(err) = run(&args) {
        let recoverable = err
            .downcast_ref::<PoolError>()
            .is_some_and(PoolError::is_recoverable);
        tracing::error!(?err, recoverable, "pool-sim failed");
        std::process::exit(1);
    }
}

fn run(args: &Arguments) -> Result<()> {
    let sim: SimConfig = config::from_file(&args.config)?;
    let report = simulate(sim, &args.command)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Initializes the pool described by `sim` and runs `command` against it.
pub fn simulate(sim: SimConfig, command: &Command) -> Result<Report> {
    let ctx = OperationContext::at(sim.timestamp, &sim.pool).with_protocol_fees(sim.protocol_fees);
    let providers = sim
        .pool
        .tokens()
        .iter()
        .enumerate()
        .filter(|(_, token)| token.rate_provider.is_some())
        .map(|(index, token)| {
            let rate = sim
                .rates
                .get(&token.address)
                .with_context(|| format!("missing rate for token {:?}", token.address))?;
            Ok((index, StaticRate(*rate)))
        })
        .collect::<Result<Vec<_>>>()?;
    let token_count = sim.pool.token_count();

    let mut pool = StablePool::new(sim.pool);
    for (index, provider) in &providers {
        pool.update_token_rate_cache(*index, provider, ctx.timestamp)?;
    }
    pool.join_exit(
        &JoinExitRequest::Init {
            amounts_in: sim.balances,
        },
        &ctx,
    )
    .context("initializing pool")?;

    let outcome = match command {
        Command::State => None,
        Command::Swap {
            token_in,
            token_out,
            amount,
            given_out,
            limit,
        } => {
            let request = SwapRequest {
                kind: if *given_out {
                    SwapKind::GivenOut
                } else {
                    SwapKind::GivenIn
                },
                token_in: pool.config().token_index(*token_in)?,
                token_out: pool.config().token_index(*token_out)?,
                amount: *amount,
                limit: *limit,
            };
            Some(Outcome::Swap(pool.swap(&request, &ctx)?))
        }
        Command::JoinProportional { bpt_out } => {
            let request = JoinExitRequest::AllTokensInForExactBptOut {
                bpt_out: *bpt_out,
                max_amounts_in: vec![U256::MAX; token_count],
            };
            Some(Outcome::JoinExit(pool.join_exit(&request, &ctx)?))
        }
        Command::ExitProportional { bpt_in } => {
            let request = JoinExitRequest::ExactBptInForTokensOut {
                bpt_in: *bpt_in,
                min_amounts_out: vec![U256::zero(); token_count],
            };
            Some(Outcome::JoinExit(pool.join_exit(&request, &ctx)?))
        }
    };

    Ok(Report {
        outcome,
        state: PoolState::of(&pool, &ctx)?,
    })
}
