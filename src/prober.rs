//! Balance mapping slot discovery.
//!
//! Walks candidate slots `0..MAX_BALANCE_SLOT`. For each one the zero
//! address's mapping entry is overwritten with a sentinel, `balanceOf(0x0)` is
//! queried, and the cell is restored before the next candidate. The zero
//! address keeps real holders' balances and supply invariants out of the way.
//!
//! Each candidate runs read → write → balanceOf → restore strictly in
//! sequence. Do not probe the same contract from two tasks at once.

use crate::erc20;
use crate::error::{OverrideError, Result};
use crate::node::ChainNode;
use crate::slots::{compute_mapping_key, u256_from_word, MAX_BALANCE_SLOT};
use crate::types::{BlockTag, KeyOrder, ProbeValues};
use alloy_primitives::Address;
use tracing::{debug, info, warn};

/// Finds the slot backing a token's `mapping(address => uint256)` balances.
#[derive(Debug)]
pub struct SlotProber<'a, N> {
    node: &'a N,
    probes: ProbeValues,
}

impl<'a, N: ChainNode> SlotProber<'a, N> {
    pub fn new(node: &'a N) -> Self {
        Self {
            node,
            probes: ProbeValues::default(),
        }
    }

    pub fn with_probes(mut self, probes: ProbeValues) -> Self {
        self.probes = probes;
        self
    }

    /// Return the first slot in `[0, MAX_BALANCE_SLOT)` whose mapping entry for
    /// the zero address drives `balanceOf(0x0)` under `order`.
    ///
    /// Only `order` is tried. Exhausting the range is [`OverrideError::SlotNotFound`].
    pub async fn find_balance_slot(&self, contract: Address, order: KeyOrder) -> Result<u64> {
        debug!(contract = %contract, %order, "probing balance slot");

        for slot in 0..MAX_BALANCE_SLOT {
            if self.probe_slot(contract, slot, order).await? {
                info!(contract = %contract, %order, slot, "found balance slot");
                return Ok(slot);
            }
        }

        warn!(contract = %contract, %order, searched = MAX_BALANCE_SLOT, "balance slot not found");
        Err(OverrideError::SlotNotFound {
            contract,
            order,
            searched: MAX_BALANCE_SLOT,
        })
    }

    /// One probe/restore cycle. `Ok(true)` if the sentinel showed up in `balanceOf`.
    async fn probe_slot(&self, contract: Address, slot: u64, order: KeyOrder) -> Result<bool> {
        let key = compute_mapping_key(slot, Address::ZERO, order);
        let prev = self.node.get_storage_at(contract, key, BlockTag::Latest).await?;
        let probe = self.probes.pick(prev);

        self.node.set_storage_at(contract, key, probe).await?;
        let observed = erc20::balance_of(self.node, contract, Address::ZERO).await;
        // Restore regardless of how the balance query went.
        let restored = self.node.set_storage_at(contract, key, prev).await;

        let observed = match (observed, restored) {
            (Ok(balance), Ok(())) => balance,
            (Err(err), Ok(())) => return Err(err),
            (Err(err), Err(restore_err)) => {
                warn!(
                    contract = %contract,
                    slot,
                    key = %key,
                    error = %restore_err,
                    "failed to restore probed storage after balance query error"
                );
                return Err(err);
            }
            (Ok(_), Err(restore_err)) => {
                warn!(contract = %contract, slot, key = %key, "failed to restore probed storage");
                return Err(restore_err.into());
            }
        };

        let hit = observed == u256_from_word(probe);
        debug!(contract = %contract, slot, %observed, hit, "probed slot");
        Ok(hit)
    }
}
