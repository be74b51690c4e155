// Runtime configuration for the balance-override binary
//
// Read from environment variables with defaults:
//   NODE_RPC_URL     dev node to mutate              (default http://127.0.0.1:8545)
//   NODE_DIALECT     anvil | hardhat                 (default anvil)
//   FORK_RPC_URL     upstream to fork; unset skips the fork reset
//   FORK_BLOCK       block to pin; unset = latest safe block, 0 = track head
//   TOKEN / HOLDER / AMOUNT   override request; all three or none
//   BALANCE_SLOT     known balance mapping slot (skips probing)
//   KEY_ORDER        solidity | vyper            (default solidity)
//   USE_KNOWN_SLOTS  seed the slot cache with mainnet layouts
//   VERBOSE          log slots, previous storage and new balances

use crate::node::RpcDialect;
use crate::types::{BalanceOverrideRequest, ForkSpec, KeyOrder};
use alloy_primitives::{Address, U256};
use eyre::{eyre, Result, WrapErr};
use std::str::FromStr;

const DEFAULT_NODE_RPC_URL: &str = "http://127.0.0.1:8545";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub node_rpc_url: String,
    pub dialect: RpcDialect,
    pub fork: Option<ForkSpec>,
    pub request: Option<BalanceOverrideRequest>,
    pub key_order: KeyOrder,
    pub use_known_slots: bool,
    pub verbose: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let node_rpc_url = get("NODE_RPC_URL").unwrap_or_else(|| DEFAULT_NODE_RPC_URL.to_string());

        let dialect = match get("NODE_DIALECT") {
            Some(raw) => raw
                .parse::<RpcDialect>()
                .map_err(|e| eyre!("invalid NODE_DIALECT: {e}"))?,
            None => RpcDialect::default(),
        };

        let fork = match get("FORK_RPC_URL") {
            Some(rpc_url) => {
                let block_number = get("FORK_BLOCK")
                    .map(|raw| raw.parse::<u64>())
                    .transpose()
                    .wrap_err("invalid FORK_BLOCK")?;
                Some(ForkSpec {
                    rpc_url,
                    block_number,
                })
            }
            None => None,
        };

        let key_order = match get("KEY_ORDER") {
            Some(raw) => raw
                .parse::<KeyOrder>()
                .map_err(|e| eyre!("invalid KEY_ORDER: {e}"))?,
            None => KeyOrder::default(),
        };

        let request = match (get("TOKEN"), get("HOLDER"), get("AMOUNT")) {
            (None, None, None) => None,
            (Some(token), Some(holder), Some(amount)) => {
                let token = parse_address("TOKEN", &token)?;
                let holder = parse_address("HOLDER", &holder)?;
                let amount = U256::from_str(&amount)
                    .map_err(|e| eyre!("invalid AMOUNT '{amount}': {e}"))?;
                let mut request = BalanceOverrideRequest::new(token, holder, amount);
                if let Some(slot) = get("BALANCE_SLOT") {
                    let slot = slot.parse::<u64>().wrap_err("invalid BALANCE_SLOT")?;
                    request = request.with_slot(slot);
                }
                Some(request)
            }
            _ => return Err(eyre!("TOKEN, HOLDER and AMOUNT must be set together")),
        };

        Ok(Self {
            node_rpc_url,
            dialect,
            fork,
            request,
            key_order,
            use_known_slots: get("USE_KNOWN_SLOTS").is_some_and(|v| parse_flag(&v)),
            verbose: get("VERBOSE").is_some_and(|v| parse_flag(&v)),
        })
    }
}

fn parse_address(name: &str, raw: &str) -> Result<Address> {
    raw.parse::<Address>()
        .map_err(|e| eyre!("invalid {name} '{raw}': {e}"))
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
