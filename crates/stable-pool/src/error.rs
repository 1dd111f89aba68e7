//! Error types of the stable pool engine.
//!
//! [`Error`] is raised by the fixed point and stable math layer and mirrors
//! the revert reasons of the Balancer math libraries. [`PoolError`] is what
//! pool operations return to the caller; every variant aborts the operation
//! before the pool state is touched.

use {
    ethereum_types::{H160, U256},
    std::fmt::{self, Display, Formatter},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("addition overflow")]
    AddOverflow,
    #[error("subtraction overflow")]
    SubOverflow,
    #[error("multiplication overflow")]
    MulOverflow,
    #[error("division by zero")]
    ZeroDivision,
    #[error("division overflow")]
    DivInternal,
    #[error("stable invariant didn't converge")]
    StableInvariantDidntConverge,
    #[error("stable get balance didn't converge")]
    StableGetBalanceDidntConverge,
}

/// Reference to a token that a request tried to use.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TokenRef {
    Index(usize),
    Address(H160),
}

impl Display for TokenRef {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "token index {index}"),
            Self::Address(address) => write!(f, "token {address:?}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("cached rate of token {token:?} expired; refresh the rate cache and retry")]
    StaleRate { token: H160 },
    #[error("stable math failed to converge: {0}")]
    ConvergenceFailure(Error),
    #[error("pool is already initialized")]
    AlreadyInitialized,
    #[error("pool is not initialized")]
    NotInitialized,
    #[error("amount {actual} is below the minimum of {minimum}")]
    BelowMinimum { actual: U256, minimum: U256 },
    #[error("amount {actual} is above the maximum of {maximum}")]
    AboveMaximum { actual: U256, maximum: U256 },
    #[error("invalid swap: {0}")]
    InvalidSwap(&'static str),
    #[error("{0} is not a tradable pool token")]
    InvalidTokenIndex(TokenRef),
    #[error("protocol fee computation overflowed")]
    FeeOverflow,
    #[error("insufficient {0}")]
    InsufficientBalance(&'static str),
    #[error("expected {expected} amounts but got {actual}")]
    InputLengthMismatch { expected: usize, actual: usize },
    #[error("invalid user data: {0}")]
    InvalidUserData(String),
    #[error("rate provider of token {token:?} failed")]
    RateProviderFailure {
        token: H160,
        #[source]
        source: anyhow::Error,
    },
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Arithmetic(Error),
}

impl PoolError {
    /// Whether the caller can reasonably retry the operation after adjusting
    /// its inputs or refreshing rates.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::ConvergenceFailure(_) | Self::FeeOverflow | Self::Arithmetic(_)
        )
    }
}

impl From<Error> for PoolError {
    fn from(err: Error) -> Self {
        match err {
            Error::StableInvariantDidntConverge | Error::StableGetBalanceDidntConverge => {
                Self::ConvergenceFailure(err)
            }
            _ => Self::Arithmetic(err),
        }
    }
}
