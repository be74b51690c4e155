//! Fork point selection.
//!
//! Forking at the literal upstream head risks pinning a block that is
//! reorganized away before it is used, so an unspecified block resolves to
//! `head - margin` for the upstream's network family.

use crate::error::Result;
use crate::node::{BlockSource, ChainNode, ForkRequest, IGNORE_UNKNOWN_TX_TYPE};
use crate::types::{ForkSpec, NetworkFamily};
use tracing::info;

/// Resets a node's fork. `upstream` answers head queries for the forked chain.
#[derive(Debug)]
pub struct ForkSelector<'a, N, S> {
    node: &'a N,
    upstream: &'a S,
}

impl<'a, N: ChainNode, S: BlockSource> ForkSelector<'a, N, S> {
    pub fn new(node: &'a N, upstream: &'a S) -> Self {
        Self { node, upstream }
    }

    /// Upstream head minus the safety margin for `rpc_url`'s network family.
    pub async fn most_recent_safe_block(&self, rpc_url: &str) -> Result<u64> {
        let family = NetworkFamily::from_rpc_url(rpc_url);
        let head = self.upstream.block_number().await?;
        Ok(head.saturating_sub(family.safety_margin()))
    }

    /// Reset the node's fork per `spec`. Returns the pinned block, `None` when unpinned.
    pub async fn reset_fork(&self, spec: &ForkSpec) -> Result<Option<u64>> {
        let block_number = match spec.block_number {
            None => Some(self.most_recent_safe_block(&spec.rpc_url).await?),
            Some(0) => None,
            Some(block) => Some(block),
        };

        self.node
            .reset_fork(ForkRequest {
                rpc_url: spec.rpc_url.clone(),
                block_number,
                ignore_unknown_tx_type: IGNORE_UNKNOWN_TX_TYPE,
            })
            .await?;

        match block_number {
            Some(block) => info!(rpc_url = %spec.rpc_url, block, "fork reset"),
            None => info!(rpc_url = %spec.rpc_url, "fork reset, tracking head"),
        }
        Ok(block_number)
    }
}
