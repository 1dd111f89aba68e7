//! Decoding of the ABI encoded `userData` carried by vault join and exit
//! requests into [`JoinExitRequest`]s.
//!
//! Amount arrays in the user data and token indices refer to the tradable
//! tokens only, the pool's own BPT excluded.

use {
    crate::{
        error::{PoolError, TokenRef},
        join_exit::JoinExitRequest,
    },
    ethabi::{ParamType, Token},
    ethereum_types::U256,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JoinKind {
    Init = 0,
    ExactTokensInForBptOut = 1,
    TokenInForExactBptOut = 2,
    AllTokensInForExactBptOut = 3,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExitKind {
    ExactBptInForOneTokenOut = 0,
    BptInForExactTokensOut = 1,
    ExactBptInForAllTokensOut = 2,
}

impl TryFrom<U256> for JoinKind {
    type Error = PoolError;

    fn try_from(value: U256) -> Result<Self, Self::Error> {
        match value.low_u64() {
            0 if value.bits() <= 64 => Ok(Self::Init),
            1 if value.bits() <= 64 => Ok(Self::ExactTokensInForBptOut),
            2 if value.bits() <= 64 => Ok(Self::TokenInForExactBptOut),
            3 if value.bits() <= 64 => Ok(Self::AllTokensInForExactBptOut),
            _ => Err(PoolError::InvalidUserData(format!("unknown join kind {value}"))),
        }
    }
}

impl TryFrom<U256> for ExitKind {
    type Error = PoolError;

    fn try_from(value: U256) -> Result<Self, Self::Error> {
        match value.low_u64() {
            0 if value.bits() <= 64 => Ok(Self::ExactBptInForOneTokenOut),
            1 if value.bits() <= 64 => Ok(Self::BptInForExactTokensOut),
            2 if value.bits() <= 64 => Ok(Self::ExactBptInForAllTokensOut),
            _ => Err(PoolError::InvalidUserData(format!("unknown exit kind {value}"))),
        }
    }
}

/// Decodes join user data. `max_amounts_in` are the per token limits of the
/// vault request.
pub fn decode_join(data: &[u8], max_amounts_in: &[U256]) -> Result<JoinExitRequest, PoolError> {
    let kind = JoinKind::try_from(decode_kind(data)?)?;
    let request = match kind {
        JoinKind::Init => {
            let mut tokens = decode(&[uint(), uint_array()], data)?.into_iter().skip(1);
            JoinExitRequest::Init {
                amounts_in: next_uint_array(&mut tokens)?,
            }
        }
        JoinKind::ExactTokensInForBptOut => {
            let mut tokens =
                decode(&[uint(), uint_array(), uint()], data)?.into_iter().skip(1);
            JoinExitRequest::ExactTokensInForBptOut {
                amounts_in: next_uint_array(&mut tokens)?,
                min_bpt_out: next_uint(&mut tokens)?,
            }
        }
        JoinKind::TokenInForExactBptOut => {
            let mut tokens = decode(&[uint(), uint(), uint()], data)?.into_iter().skip(1);
            let bpt_out = next_uint(&mut tokens)?;
            let token_index = next_index(&mut tokens)?;
            JoinExitRequest::TokenInForExactBptOut {
                token_index,
                bpt_out,
                max_amount_in: limit(max_amounts_in, token_index)?,
            }
        }
        JoinKind::AllTokensInForExactBptOut => {
            let mut tokens = decode(&[uint(), uint()], data)?.into_iter().skip(1);
            JoinExitRequest::AllTokensInForExactBptOut {
                bpt_out: next_uint(&mut tokens)?,
                max_amounts_in: max_amounts_in.to_vec(),
            }
        }
    };
    Ok(request)
}

/// Decodes exit user data. `min_amounts_out` are the per token limits of the
/// vault request.
pub fn decode_exit(data: &[u8], min_amounts_out: &[U256]) -> Result<JoinExitRequest, PoolError> {
    let kind = ExitKind::try_from(decode_kind(data)?)?;
    let request = match kind {
        ExitKind::ExactBptInForOneTokenOut => {
            let mut tokens = decode(&[uint(), uint(), uint()], data)?.into_iter().skip(1);
            let bpt_in = next_uint(&mut tokens)?;
            let token_index = next_index(&mut tokens)?;
            JoinExitRequest::ExactBptInForOneTokenOut {
                bpt_in,
                token_index,
                min_amount_out: limit(min_amounts_out, token_index)?,
            }
        }
        ExitKind::BptInForExactTokensOut => {
            let mut tokens =
                decode(&[uint(), uint_array(), uint()], data)?.into_iter().skip(1);
            JoinExitRequest::BptInForExactTokensOut {
                amounts_out: next_uint_array(&mut tokens)?,
                max_bpt_in: next_uint(&mut tokens)?,
            }
        }
        ExitKind::ExactBptInForAllTokensOut => {
            let mut tokens = decode(&[uint(), uint()], data)?.into_iter().skip(1);
            JoinExitRequest::ExactBptInForTokensOut {
                bpt_in: next_uint(&mut tokens)?,
                min_amounts_out: min_amounts_out.to_vec(),
            }
        }
    };
    Ok(request)
}

fn uint() -> ParamType {
    ParamType::Uint(256)
}

fn uint_array() -> ParamType {
    ParamType::Array(Box::new(uint()))
}

fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, PoolError> {
    ethabi::decode(types, data).map_err(|err| PoolError::InvalidUserData(err.to_string()))
}

fn decode_kind(data: &[u8]) -> Result<U256, PoolError> {
    let head = data.get(..32).ok_or_else(|| {
        PoolError::InvalidUserData(format!("{} bytes is too short", data.len()))
    })?;
    next_uint(&mut decode(&[uint()], head)?.into_iter())
}

fn next_uint(tokens: &mut impl Iterator<Item = Token>) -> Result<U256, PoolError> {
    match tokens.next() {
        Some(Token::Uint(value)) => Ok(value),
        other => Err(PoolError::InvalidUserData(format!(
            "expected uint, got {other:?}"
        ))),
    }
}

fn next_uint_array(tokens: &mut impl Iterator<Item = Token>) -> Result<Vec<U256>, PoolError> {
    match tokens.next() {
        Some(Token::Array(values)) => values
            .into_iter()
            .map(|value| next_uint(&mut std::iter::once(value)))
            .collect(),
        other => Err(PoolError::InvalidUserData(format!(
            "expected uint array, got {other:?}"
        ))),
    }
}

fn next_index(tokens: &mut impl Iterator<Item = Token>) -> Result<usize, PoolError> {
    let index = next_uint(tokens)?;
    if index.bits() > 64 {
        return Err(PoolError::InvalidUserData(format!(
            "token index {index} out of range"
        )));
    }
    usize::try_from(index.low_u64())
        .map_err(|err| PoolError::InvalidUserData(format!("token index {index}: {err}")))
}

fn limit(limits: &[U256], index: usize) -> Result<U256, PoolError> {
    limits
        .get(index)
        .copied()
        .ok_or(PoolError::InvalidTokenIndex(TokenRef::Index(index)))
}
