//! Chain node capability.
//!
//! Everything that touches chain state goes through [`ChainNode`]. The node's
//! storage is a single shared mutable resource with no transaction isolation,
//! so callers must not probe the same contract from two tasks at once.
//!
//! Two implementations ship with the crate:
//! - [`rpc::JsonRpcNode`]: HTTP JSON-RPC against an Anvil or Hardhat dev node
//! - [`memory::MemoryNode`]: in-process fake with synthetic ERC20 tokens

pub mod memory;
pub mod rpc;

use crate::error::NodeError;
use crate::types::BlockTag;
use alloy_primitives::{Address, Bytes, B256, U256};
use std::future::Future;

pub use memory::{MemoryNode, NodeStats, SyntheticToken};
pub use rpc::{JsonRpcNode, RpcDialect};

/// Reorg-safety flag sent with every fork reset (`ignoreUnknownTxType`).
pub const IGNORE_UNKNOWN_TX_TYPE: bool = true;

/// Parameters of a fork reset as sent to the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkRequest {
    pub rpc_url: String,
    /// `None` tracks the upstream head.
    pub block_number: Option<u64>,
    pub ignore_unknown_tx_type: bool,
}

/// Source of the current chain head.
pub trait BlockSource {
    fn block_number(&self) -> impl Future<Output = Result<u64, NodeError>> + Send;
}

/// Dev-node primitives the prober and override engine depend on.
pub trait ChainNode: BlockSource {
    fn get_storage_at(
        &self,
        address: Address,
        key: B256,
        block: BlockTag,
    ) -> impl Future<Output = Result<B256, NodeError>> + Send;

    fn set_storage_at(
        &self,
        address: Address,
        key: B256,
        value: B256,
    ) -> impl Future<Output = Result<(), NodeError>> + Send;

    /// `eth_call` against the latest block; returns raw return data.
    fn call(&self, to: Address, calldata: Bytes) -> impl Future<Output = Result<Bytes, NodeError>> + Send;

    fn reset_fork(&self, request: ForkRequest) -> impl Future<Output = Result<(), NodeError>> + Send;

    fn impersonate_account(&self, account: Address) -> impl Future<Output = Result<(), NodeError>> + Send;

    fn set_native_balance(
        &self,
        account: Address,
        amount: U256,
    ) -> impl Future<Output = Result<(), NodeError>> + Send;

    fn increase_time(&self, seconds: u64) -> impl Future<Output = Result<(), NodeError>> + Send;

    fn mine(&self) -> impl Future<Output = Result<(), NodeError>> + Send;
}
