// Balance Override Library
//
// Storage-slot discovery and ERC20 balance rewriting for forked dev nodes.
// Exposes modules for reuse and testing

pub mod config;
pub mod engine;
pub mod erc20;
pub mod error;
pub mod fork;
pub mod node;
pub mod prober;
pub mod session;
pub mod slots;
pub mod types;
pub mod units;

// Re-export commonly used items
pub use engine::BalanceOverrider;
pub use error::{NodeError, OverrideError};
pub use fork::ForkSelector;
pub use node::{BlockSource, ChainNode, JsonRpcNode, MemoryNode, RpcDialect, SyntheticToken};
pub use prober::SlotProber;
pub use slots::{compute_mapping_key, SlotCache, MAX_BALANCE_SLOT};
pub use types::{
    BalanceOverrideRequest, BlockTag, ForkSpec, KeyOrder, NetworkFamily, OverrideOutcome,
    ProbeValues,
};
