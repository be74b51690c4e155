//! Balance mapping storage key computation.
//!
//! A Solidity `mapping(address => uint256)` declared at slot N stores
//! `balances[holder]` at `keccak256(abi.encode(holder, N))`. Legacy Vyper
//! swaps the two words. Both are padded to 32 bytes before hashing.
//!
//! Also holds the session slot cache, optionally seeded with mainnet tokens
//! whose balance slot is already known.

use crate::types::KeyOrder;
use alloy_primitives::{address, keccak256, Address, B256, U256};
use alloy_sol_types::SolValue;
use std::collections::HashMap;

/// Upper bound (exclusive) of the slot indices searched while probing.
pub const MAX_BALANCE_SLOT: u64 = 750;

/// Mainnet tokens with known balance mapping slots (Solidity key order).
const KNOWN_SLOTS: &[(Address, u64)] = &[
    // USDT: slot 2
    (address!("dAC17F958D2ee523a2206206994597C13D831ec7"), 2),
    // WETH9: slot 3
    (address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"), 3),
];

/// Storage key of `mapping[account]` for a mapping declared at `slot`.
pub fn compute_mapping_key(slot: u64, account: Address, order: KeyOrder) -> B256 {
    let slot = U256::from(slot);
    let encoded = match order {
        KeyOrder::AccountThenSlot => (account, slot).abi_encode(),
        KeyOrder::SlotThenAccount => (slot, account).abi_encode(),
    };
    keccak256(&encoded)
}

/// Left-pad an unsigned integer into a storage word.
pub fn word_from_u256(value: U256) -> B256 {
    B256::from(value.to_be_bytes::<32>())
}

/// Interpret a storage word as an unsigned integer.
pub fn u256_from_word(word: B256) -> U256 {
    U256::from_be_bytes(word.0)
}

/// Discovered balance slots, keyed by token and key order.
///
/// Only slot indices are cached; storage values never are.
#[derive(Debug, Default, Clone)]
pub struct SlotCache {
    slots: HashMap<(Address, KeyOrder), u64>,
}

impl SlotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache pre-seeded with [`KNOWN_SLOTS`]. Only meaningful on mainnet forks.
    pub fn with_known_slots() -> Self {
        let mut cache = Self::new();
        for &(token, slot) in KNOWN_SLOTS {
            cache.insert(token, KeyOrder::AccountThenSlot, slot);
        }
        cache
    }

    pub fn get(&self, token: Address, order: KeyOrder) -> Option<u64> {
        self.slots.get(&(token, order)).copied()
    }

    /// Record a slot. Returns the previously cached slot, if any.
    pub fn insert(&mut self, token: Address, order: KeyOrder, slot: u64) -> Option<u64> {
        self.slots.insert((token, order), slot)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
