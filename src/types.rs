// Balance Override Types
//
// Plain data passed between the prober, the override engine and the fork selector.

use crate::error::{OverrideError, Result};
use alloy_primitives::{Address, B256, U256};
use std::fmt;
use std::str::FromStr;

/// Argument order fed to keccak-256 when computing a mapping entry's storage key.
///
/// Solidity hashes `abi.encode(key, slot)`. Older Vyper compilers hash the slot
/// first. The prober only ever tries the order it is given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum KeyOrder {
    /// `keccak256(account . slot)` (Solidity)
    #[default]
    AccountThenSlot,
    /// `keccak256(slot . account)` (legacy Vyper)
    SlotThenAccount,
}

impl fmt::Display for KeyOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyOrder::AccountThenSlot => f.write_str("account-slot"),
            KeyOrder::SlotThenAccount => f.write_str("slot-account"),
        }
    }
}

impl FromStr for KeyOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solidity" | "account-slot" => Ok(KeyOrder::AccountThenSlot),
            "vyper" | "slot-account" => Ok(KeyOrder::SlotThenAccount),
            other => Err(format!(
                "unknown key order '{other}', expected solidity|account-slot|vyper|slot-account"
            )),
        }
    }
}

/// Sentinel pair written during probing. `a` and `b` always differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeValues {
    a: B256,
    b: B256,
}

impl ProbeValues {
    pub fn new(a: B256, b: B256) -> Result<Self> {
        if a == b {
            return Err(OverrideError::InvalidProbeValues);
        }
        Ok(Self { a, b })
    }

    /// Pick the sentinel that differs from `current`, so the write is always observable.
    pub fn pick(&self, current: B256) -> B256 {
        if current == self.a {
            self.b
        } else {
            self.a
        }
    }

    pub fn a(&self) -> B256 {
        self.a
    }

    pub fn b(&self) -> B256 {
        self.b
    }
}

impl Default for ProbeValues {
    /// `abi.encode(uint(1))` and `abi.encode(uint(2))`
    fn default() -> Self {
        Self {
            a: B256::with_last_byte(1),
            b: B256::with_last_byte(2),
        }
    }
}

/// Block selector for storage reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockTag {
    #[default]
    Latest,
    Number(u64),
}

/// Where to fork from.
///
/// `block_number`:
/// - `None`: most recent safe block for the network family
/// - `Some(0)`: no pinned block, track the upstream head
/// - `Some(n)`: pin to block `n`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkSpec {
    pub rpc_url: String,
    pub block_number: Option<u64>,
}

impl ForkSpec {
    pub fn latest_safe(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            block_number: None,
        }
    }

    pub fn unpinned(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            block_number: Some(0),
        }
    }

    pub fn at_block(rpc_url: impl Into<String>, block_number: u64) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            block_number: Some(block_number),
        }
    }

    /// Only the latest-safe variant reads the upstream head.
    pub fn needs_head_query(&self) -> bool {
        self.block_number.is_none()
    }
}

/// Network family inferred from an upstream RPC URL. Decides the reorg safety margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFamily {
    Ethereum,
    Arbitrum,
    Other,
}

impl NetworkFamily {
    /// Arbitrum is matched first: its provider URLs often contain "eth" as well.
    ///
    /// The short `arb-` / `arb1` prefixes only count at the start of a host
    /// label, so API keys and paths cannot trigger them.
    pub fn from_rpc_url(url: &str) -> Self {
        let lower = url.to_ascii_lowercase();
        let host = reqwest::Url::parse(&lower)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_string))
            .unwrap_or_default();
        let arbitrum_host = host
            .split('.')
            .any(|label| label.starts_with("arb-") || label.starts_with("arb1"));

        if lower.contains("arbitrum") || arbitrum_host {
            NetworkFamily::Arbitrum
        } else if lower.contains("eth") {
            NetworkFamily::Ethereum
        } else {
            NetworkFamily::Other
        }
    }

    /// Blocks subtracted from the upstream head before pinning a fork.
    pub fn safety_margin(self) -> u64 {
        match self {
            NetworkFamily::Arbitrum => 30,
            NetworkFamily::Ethereum | NetworkFamily::Other => 10,
        }
    }
}

/// A request to rewrite `holder`'s balance in `token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceOverrideRequest {
    pub token: Address,
    pub holder: Address,
    pub new_value: U256,
    /// Balance mapping slot, when already known. Skips probing.
    pub known_slot: Option<u64>,
}

impl BalanceOverrideRequest {
    pub fn new(token: Address, holder: Address, new_value: U256) -> Self {
        Self {
            token,
            holder,
            new_value,
            known_slot: None,
        }
    }

    pub fn with_slot(mut self, slot: u64) -> Self {
        self.known_slot = Some(slot);
        self
    }
}

/// What a successful override did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideOutcome {
    /// Balance mapping slot that was used
    pub slot: u64,
    /// True if the slot was discovered by probing during this call
    pub probed: bool,
    /// Storage key of `balances[holder]`
    pub key: B256,
    /// Storage word before the write (only read in verbose mode)
    pub previous: Option<B256>,
    /// `balanceOf(holder)` after the write
    pub observed: U256,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_order_parses_aliases() {
        assert_eq!("solidity".parse::<KeyOrder>().unwrap(), KeyOrder::AccountThenSlot);
        assert_eq!("Account-Slot".parse::<KeyOrder>().unwrap(), KeyOrder::AccountThenSlot);
        assert_eq!("vyper".parse::<KeyOrder>().unwrap(), KeyOrder::SlotThenAccount);
        assert_eq!(" slot-account ".parse::<KeyOrder>().unwrap(), KeyOrder::SlotThenAccount);
        assert!("huff".parse::<KeyOrder>().is_err());
    }

    #[test]
    fn probe_values_reject_equal_sentinels() {
        let word = B256::with_last_byte(7);
        assert!(matches!(
            ProbeValues::new(word, word),
            Err(OverrideError::InvalidProbeValues)
        ));
    }

    #[test]
    fn probe_pick_avoids_current_value() {
        let probes = ProbeValues::default();
        assert_eq!(probes.pick(B256::ZERO), probes.a());
        assert_eq!(probes.pick(probes.a()), probes.b());
        assert_eq!(probes.pick(probes.b()), probes.a());
    }

    #[test]
    fn default_probes_are_abi_encoded_one_and_two() {
        let probes = ProbeValues::default();
        assert_eq!(U256::from_be_bytes(probes.a().0), U256::from(1));
        assert_eq!(U256::from_be_bytes(probes.b().0), U256::from(2));
    }

    #[test]
    fn network_family_from_url() {
        assert_eq!(
            NetworkFamily::from_rpc_url("https://eth-mainnet.g.alchemy.com/v2/key"),
            NetworkFamily::Ethereum
        );
        assert_eq!(
            NetworkFamily::from_rpc_url("https://arbitrum-mainnet.infura.io/v3/key"),
            NetworkFamily::Arbitrum
        );
        assert_eq!(
            NetworkFamily::from_rpc_url("https://arb-mainnet.g.alchemy.com/v2/key"),
            NetworkFamily::Arbitrum
        );
        assert_eq!(
            NetworkFamily::from_rpc_url("https://rpc.ankr.com/gnosis"),
            NetworkFamily::Other
        );
    }

    #[test]
    fn arbitrum_short_prefixes_only_match_hosts() {
        assert_eq!(
            NetworkFamily::from_rpc_url("https://eth-mainnet.g.alchemy.com/v2/barb-k3y"),
            NetworkFamily::Ethereum
        );
        assert_eq!(
            NetworkFamily::from_rpc_url("https://eth.example/rpc?key=xarb1y"),
            NetworkFamily::Ethereum
        );
        assert_eq!(
            NetworkFamily::from_rpc_url("https://arb1.arbitrum.io/rpc"),
            NetworkFamily::Arbitrum
        );
        assert_eq!(
            NetworkFamily::from_rpc_url("https://rpc.ankr.com/arbitrum"),
            NetworkFamily::Arbitrum
        );
        assert_eq!(
            NetworkFamily::from_rpc_url("https://node.barb-labs.io"),
            NetworkFamily::Other
        );
    }

    #[test]
    fn only_latest_safe_queries_the_head() {
        assert!(ForkSpec::latest_safe("https://eth.example").needs_head_query());
        assert!(!ForkSpec::unpinned("wss://eth.example").needs_head_query());
        assert!(!ForkSpec::at_block("wss://eth.example", 5).needs_head_query());
    }

    #[test]
    fn arbitrum_margin_is_deeper() {
        assert!(NetworkFamily::Arbitrum.safety_margin() > NetworkFamily::Ethereum.safety_margin());
        assert_eq!(NetworkFamily::Ethereum.safety_margin(), 10);
        assert_eq!(NetworkFamily::Arbitrum.safety_margin(), 30);
    }
}
