pub mod config;
pub mod error;
pub mod fees;
pub mod fixed_point;
pub mod join_exit;
pub mod ledger;
mod math;
pub mod pool;
pub mod rates;
pub mod run;
pub mod stable_math;
pub mod swap;
pub mod user_data;

#[cfg(test)]
mod tests;

pub use {
    config::{AmplificationParameter, PoolConfig, ProtocolFees, TokenConfig},
    error::{Error, PoolError},
    fixed_point::Bfp,
    join_exit::{JoinExitOutcome, JoinExitRequest},
    pool::{OperationContext, StablePool},
    run::start,
    swap::{SwapKind, SwapOutcome, SwapRequest},
};
