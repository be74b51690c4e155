//! In-memory chain node.
//!
//! Storage is a flat `(address, key) -> word` map. Contracts are synthetic
//! ERC20 tokens whose `balanceOf` reads the mapping entry at a configured
//! slot and key order, so the prober and override engine can be exercised
//! without a dev node. Zero words are not stored, which keeps storage
//! snapshots comparable before and after probing.

use super::{BlockSource, ChainNode, ForkRequest};
use crate::erc20::{balanceOfCall, decimalsCall};
use crate::error::NodeError;
use crate::slots::{compute_mapping_key, u256_from_word, word_from_u256};
use crate::types::{BlockTag, KeyOrder};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Balance mapping layout of a synthetic token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticToken {
    pub balance_slot: u64,
    pub order: KeyOrder,
    /// Added to every stored balance on read, like a rebasing token.
    pub rebase_bonus: U256,
    /// `None` makes `decimals()` revert, like tokens that never implemented it.
    pub decimals: Option<u8>,
}

impl SyntheticToken {
    pub fn new(balance_slot: u64, order: KeyOrder) -> Self {
        Self {
            balance_slot,
            order,
            rebase_bonus: U256::ZERO,
            decimals: Some(18),
        }
    }

    pub fn with_rebase_bonus(mut self, bonus: U256) -> Self {
        self.rebase_bonus = bonus;
        self
    }

    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = Some(decimals);
        self
    }

    pub fn without_decimals(mut self) -> Self {
        self.decimals = None;
        self
    }
}

/// Counters of node operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub storage_reads: u64,
    pub storage_writes: u64,
    pub calls: u64,
    pub resets: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    storage: HashMap<(Address, B256), B256>,
    tokens: HashMap<Address, SyntheticToken>,
    head: u64,
    timestamp: u64,
    forks: Vec<ForkRequest>,
    impersonated: HashSet<Address>,
    native_balances: HashMap<Address, U256>,
    fail_calls: bool,
    stats: NodeStats,
}

/// Cloneable handle to a shared in-memory node.
#[derive(Debug, Clone, Default)]
pub struct MemoryNode {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryNode {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a synthetic token at `address`.
    pub fn deploy_token(&self, address: Address, token: SyntheticToken) {
        self.state().tokens.insert(address, token);
    }

    /// Write `balance` for `holder` directly into the token's mapping.
    pub fn seed_balance(&self, token: Address, holder: Address, balance: U256) {
        let mut state = self.state();
        let Some(layout) = state.tokens.get(&token).copied() else {
            return;
        };
        let key = compute_mapping_key(layout.balance_slot, holder, layout.order);
        write_word(&mut state.storage, token, key, word_from_u256(balance));
    }

    pub fn storage_at(&self, address: Address, key: B256) -> B256 {
        read_word(&self.state().storage, address, key)
    }

    /// All non-zero storage words of `address`, ordered by key.
    pub fn storage_snapshot(&self, address: Address) -> BTreeMap<B256, B256> {
        self.state()
            .storage
            .iter()
            .filter(|((owner, _), _)| *owner == address)
            .map(|((_, key), value)| (*key, *value))
            .collect()
    }

    pub fn set_head(&self, block: u64) {
        self.state().head = block;
    }

    /// Make every subsequent `call` fail with a transport error.
    pub fn fail_calls(&self, fail: bool) {
        self.state().fail_calls = fail;
    }

    pub fn forks(&self) -> Vec<ForkRequest> {
        self.state().forks.clone()
    }

    pub fn is_impersonated(&self, account: Address) -> bool {
        self.state().impersonated.contains(&account)
    }

    pub fn native_balance(&self, account: Address) -> U256 {
        self.state()
            .native_balances
            .get(&account)
            .copied()
            .unwrap_or_default()
    }

    pub fn timestamp(&self) -> u64 {
        self.state().timestamp
    }

    pub fn stats(&self) -> NodeStats {
        self.state().stats
    }

    pub fn reset_stats(&self) {
        self.state().stats = NodeStats::default();
    }
}

fn read_word(storage: &HashMap<(Address, B256), B256>, address: Address, key: B256) -> B256 {
    storage.get(&(address, key)).copied().unwrap_or_default()
}

fn write_word(storage: &mut HashMap<(Address, B256), B256>, address: Address, key: B256, value: B256) {
    if value.is_zero() {
        storage.remove(&(address, key));
    } else {
        storage.insert((address, key), value);
    }
}

/// Execute a read-only call against a synthetic token.
fn execute_call(state: &MemoryState, to: Address, calldata: &[u8]) -> Result<Bytes, NodeError> {
    let Some(token) = state.tokens.get(&to) else {
        // Calls to accounts without code succeed with empty return data.
        return Ok(Bytes::new());
    };
    let selector = calldata.get(..4).unwrap_or_default();

    if selector == balanceOfCall::SELECTOR.as_slice() {
        let args = calldata.get(4..36).ok_or_else(|| reverted("balanceOf: short calldata"))?;
        let account = Address::from_slice(&args[12..]);
        let key = compute_mapping_key(token.balance_slot, account, token.order);
        let stored = u256_from_word(read_word(&state.storage, to, key));
        let balance = stored.saturating_add(token.rebase_bonus);
        return Ok(Bytes::from(word_from_u256(balance).0.to_vec()));
    }

    if selector == decimalsCall::SELECTOR.as_slice() {
        if let Some(decimals) = token.decimals {
            let word = word_from_u256(U256::from(decimals));
            return Ok(Bytes::from(word.0.to_vec()));
        }
    }

    Err(reverted("unknown selector"))
}

fn reverted(reason: &str) -> NodeError {
    NodeError::Rpc {
        method: "eth_call".to_string(),
        code: 3,
        message: format!("execution reverted: {reason}"),
    }
}

impl BlockSource for MemoryNode {
    async fn block_number(&self) -> Result<u64, NodeError> {
        Ok(self.state().head)
    }
}

impl ChainNode for MemoryNode {
    async fn get_storage_at(&self, address: Address, key: B256, _block: BlockTag) -> Result<B256, NodeError> {
        let mut state = self.state();
        state.stats.storage_reads += 1;
        Ok(read_word(&state.storage, address, key))
    }

    async fn set_storage_at(&self, address: Address, key: B256, value: B256) -> Result<(), NodeError> {
        let mut state = self.state();
        state.stats.storage_writes += 1;
        write_word(&mut state.storage, address, key, value);
        Ok(())
    }

    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, NodeError> {
        let mut state = self.state();
        state.stats.calls += 1;
        if state.fail_calls {
            return Err(NodeError::Transport("connection refused".to_string()));
        }
        execute_call(&state, to, &calldata)
    }

    async fn reset_fork(&self, request: ForkRequest) -> Result<(), NodeError> {
        let mut state = self.state();
        state.stats.resets += 1;
        if let Some(block) = request.block_number {
            state.head = block;
        }
        state.storage.clear();
        state.forks.push(request);
        Ok(())
    }

    async fn impersonate_account(&self, account: Address) -> Result<(), NodeError> {
        self.state().impersonated.insert(account);
        Ok(())
    }

    async fn set_native_balance(&self, account: Address, amount: U256) -> Result<(), NodeError> {
        self.state().native_balances.insert(account, amount);
        Ok(())
    }

    async fn increase_time(&self, seconds: u64) -> Result<(), NodeError> {
        let mut state = self.state();
        state.timestamp = state.timestamp.saturating_add(seconds);
        Ok(())
    }

    async fn mine(&self) -> Result<(), NodeError> {
        let mut state = self.state();
        state.head += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erc20::balance_of_calldata;
    use alloy_primitives::address;

    const TOKEN: Address = address!("00000000000000000000000000000000000000aa");
    const HOLDER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    #[tokio::test]
    async fn balance_of_reads_configured_slot() {
        let node = MemoryNode::new();
        node.deploy_token(TOKEN, SyntheticToken::new(3, KeyOrder::AccountThenSlot));
        node.seed_balance(TOKEN, HOLDER, U256::from(77));

        let data = node.call(TOKEN, balance_of_calldata(HOLDER)).await.unwrap();
        assert_eq!(U256::from_be_slice(&data), U256::from(77));
    }

    #[tokio::test]
    async fn rebase_bonus_inflates_reads() {
        let node = MemoryNode::new();
        let layout = SyntheticToken::new(0, KeyOrder::AccountThenSlot).with_rebase_bonus(U256::from(5));
        node.deploy_token(TOKEN, layout);
        node.seed_balance(TOKEN, HOLDER, U256::from(10));

        let data = node.call(TOKEN, balance_of_calldata(HOLDER)).await.unwrap();
        assert_eq!(U256::from_be_slice(&data), U256::from(15));
    }

    #[tokio::test]
    async fn zero_writes_leave_no_entry() {
        let node = MemoryNode::new();
        let key = B256::with_last_byte(1);
        node.set_storage_at(TOKEN, key, B256::with_last_byte(9)).await.unwrap();
        assert_eq!(node.storage_snapshot(TOKEN).len(), 1);
        node.set_storage_at(TOKEN, key, B256::ZERO).await.unwrap();
        assert!(node.storage_snapshot(TOKEN).is_empty());
    }

    #[tokio::test]
    async fn missing_decimals_reverts() {
        let node = MemoryNode::new();
        node.deploy_token(TOKEN, SyntheticToken::new(0, KeyOrder::AccountThenSlot).without_decimals());
        let err = node.call(TOKEN, crate::erc20::decimals_calldata()).await.unwrap_err();
        assert!(matches!(err, NodeError::Rpc { code: 3, .. }));
    }

    #[tokio::test]
    async fn unknown_selector_reverts() {
        let node = MemoryNode::new();
        node.deploy_token(TOKEN, SyntheticToken::new(0, KeyOrder::AccountThenSlot));
        let err = node.call(TOKEN, Bytes::from(vec![0xde, 0xad, 0xbe, 0xef])).await.unwrap_err();
        assert!(matches!(err, NodeError::Rpc { code: 3, .. }));
    }

    #[tokio::test]
    async fn injected_call_failure_is_transport_error() {
        let node = MemoryNode::new();
        node.fail_calls(true);
        let err = node.call(TOKEN, balance_of_calldata(HOLDER)).await.unwrap_err();
        assert!(matches!(err, NodeError::Transport(_)));
    }

    #[tokio::test]
    async fn counters_track_operations() {
        let node = MemoryNode::new();
        let key = B256::with_last_byte(1);
        node.get_storage_at(TOKEN, key, BlockTag::Latest).await.unwrap();
        node.set_storage_at(TOKEN, key, B256::with_last_byte(2)).await.unwrap();
        node.call(TOKEN, Bytes::new()).await.unwrap();
        assert_eq!(
            node.stats(),
            NodeStats {
                storage_reads: 1,
                storage_writes: 1,
                calls: 1,
                resets: 0,
            }
        );
    }
}
