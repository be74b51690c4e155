use crate::types::KeyOrder;
use alloy_primitives::{Address, U256};
use thiserror::Error;

pub type Result<T, E = OverrideError> = std::result::Result<T, E>;

/// Failures surfaced by a chain node transport.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("invalid node URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("`{method}` failed with rpc error {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },
    #[error("malformed response to `{method}`: {reason}")]
    Decode { method: String, reason: String },
}

impl From<reqwest::Error> for NodeError {
    fn from(err: reqwest::Error) -> Self {
        NodeError::Transport(err.to_string())
    }
}

/// Failures of slot discovery and balance overrides.
///
/// None of these are retried internally: each one means the caller's
/// assumption about the contract (key order, slot, shape) was wrong, or the
/// node is unreachable.
#[derive(Debug, Error)]
pub enum OverrideError {
    #[error("no balance mapping found for {contract} with {order} key order in slots [0, {searched})")]
    SlotNotFound {
        contract: Address,
        order: KeyOrder,
        searched: u64,
    },
    #[error("balance of {holder} in {token} is {actual} after override, expected at least {expected}")]
    BalanceVerificationFailed {
        token: Address,
        holder: Address,
        expected: U256,
        actual: U256,
    },
    #[error("balanceOf({account}) on {token} returned {len} bytes, expected a uint256 word")]
    MalformedBalance {
        token: Address,
        account: Address,
        len: usize,
    },
    #[error("probe sentinels must differ")]
    InvalidProbeValues,
    #[error(transparent)]
    Transport(#[from] NodeError),
}
