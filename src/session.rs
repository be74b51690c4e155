//! Test-session helpers on top of the chain node.
//!
//! Account impersonation, clock advancement and raw storage dumps. None of
//! these are needed by the prober; they round out a forked test environment.

use crate::error::Result;
use crate::node::ChainNode;
use crate::slots::u256_from_word;
use crate::types::BlockTag;
use alloy_primitives::{Address, B256, U256};
use std::fmt;
use std::ops::Range;
use tracing::{debug, info};

/// Native balance given to unlocked accounts: 100 ether.
pub const UNLOCKED_NATIVE_BALANCE: U256 = U256::from_limbs([0x6BC75E2D63100000, 0x5, 0, 0]);

/// Impersonate each address so transactions can be sent from it.
///
/// With `fill_native`, each account is also given [`UNLOCKED_NATIVE_BALANCE`]
/// for gas. Returns the addresses in the order they were unlocked.
pub async fn unlock_accounts<N: ChainNode>(
    node: &N,
    addresses: &[Address],
    fill_native: bool,
) -> Result<Vec<Address>> {
    let mut unlocked = Vec::with_capacity(addresses.len());
    for &address in addresses {
        node.impersonate_account(address).await?;
        if fill_native {
            node.set_native_balance(address, UNLOCKED_NATIVE_BALANCE).await?;
        }
        debug!(account = %address, fill_native, "unlocked account");
        unlocked.push(address);
    }
    Ok(unlocked)
}

/// Move the node clock forward by `seconds` and mine a block so it takes effect.
pub async fn advance_time<N: ChainNode>(node: &N, seconds: u64) -> Result<()> {
    node.increase_time(seconds).await?;
    node.mine().await?;
    debug!(seconds, "advanced node time");
    Ok(())
}

/// Best-effort interpretation of a raw storage word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageWord {
    /// Exactly 40 significant hex digits: looks like an address.
    Address(Address),
    Integer(U256),
}

impl StorageWord {
    pub fn classify(word: B256) -> Self {
        let value = u256_from_word(word);
        // 40 significant hex digits means bit length in (156, 160].
        if value.bit_len() > 156 && value.bit_len() <= 160 {
            StorageWord::Address(Address::from_word(word))
        } else {
            StorageWord::Integer(value)
        }
    }
}

impl fmt::Display for StorageWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageWord::Address(address) => write!(f, "{address}"),
            StorageWord::Integer(value) => write!(f, "{value}"),
        }
    }
}

/// Read raw slots `range` of `contract` and log each one.
pub async fn explore_storage<N: ChainNode>(
    node: &N,
    contract: Address,
    range: Range<u64>,
) -> Result<Vec<(u64, StorageWord)>> {
    let mut entries = Vec::new();
    for slot in range {
        let key = B256::from(U256::from(slot).to_be_bytes::<32>());
        let word = node.get_storage_at(contract, key, BlockTag::Latest).await?;
        let entry = StorageWord::classify(word);
        info!(contract = %contract, slot, value = %entry, "storage slot");
        entries.push((slot, entry));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::MemoryNode;
    use alloy_primitives::address;

    const CONTRACT: Address = address!("00000000000000000000000000000000000000aa");

    #[test]
    fn native_fill_is_one_hundred_ether() {
        let expected = U256::from(100u64) * U256::from(10u64).pow(U256::from(18u64));
        assert_eq!(UNLOCKED_NATIVE_BALANCE, expected);
        assert_eq!(format!("{UNLOCKED_NATIVE_BALANCE:x}"), "56bc75e2d63100000");
    }

    #[test]
    fn classify_address_like_words() {
        let owner = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert_eq!(StorageWord::classify(owner.into_word()), StorageWord::Address(owner));
    }

    #[test]
    fn classify_small_values_as_integers() {
        let word = B256::with_last_byte(18);
        assert_eq!(StorageWord::classify(word), StorageWord::Integer(U256::from(18)));
        // Address with leading zero nibble falls back to integer, like a plain number.
        let low = address!("0000000000000000000000000000000000001234");
        assert!(matches!(StorageWord::classify(low.into_word()), StorageWord::Integer(_)));
    }

    #[tokio::test]
    async fn unlock_fills_native_balance() {
        let node = MemoryNode::new();
        let a = address!("1000000000000000000000000000000000000001");
        let b = address!("2000000000000000000000000000000000000002");

        let unlocked = unlock_accounts(&node, &[a, b], true).await.unwrap();
        assert_eq!(unlocked, vec![a, b]);
        assert!(node.is_impersonated(a) && node.is_impersonated(b));
        assert_eq!(node.native_balance(b), UNLOCKED_NATIVE_BALANCE);
    }

    #[tokio::test]
    async fn unlock_without_fill_leaves_balance() {
        let node = MemoryNode::new();
        let a = address!("1000000000000000000000000000000000000001");
        unlock_accounts(&node, &[a], false).await.unwrap();
        assert!(node.is_impersonated(a));
        assert_eq!(node.native_balance(a), U256::ZERO);
    }

    #[tokio::test]
    async fn advance_time_mines_a_block() {
        let node = MemoryNode::new();
        node.set_head(10);
        advance_time(&node, 1_000).await.unwrap();
        assert_eq!(node.timestamp(), 1_000);
        assert_eq!(crate::node::BlockSource::block_number(&node).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn explore_reads_raw_slots() {
        let node = MemoryNode::new();
        let owner = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        node.set_storage_at(CONTRACT, B256::with_last_byte(1), owner.into_word())
            .await
            .unwrap();
        node.set_storage_at(CONTRACT, B256::with_last_byte(2), B256::with_last_byte(6))
            .await
            .unwrap();

        let entries = explore_storage(&node, CONTRACT, 0..3).await.unwrap();
        assert_eq!(
            entries,
            vec![
                (0, StorageWord::Integer(U256::ZERO)),
                (1, StorageWord::Address(owner)),
                (2, StorageWord::Integer(U256::from(6))),
            ]
        );
    }
}
