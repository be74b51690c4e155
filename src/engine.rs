//! Balance override engine.
//!
//! Rewrites `balances[holder]` in a token's storage and checks the result
//! through `balanceOf`. The balance slot comes from the request, from the
//! session slot cache, or from probing (in that order).
//!
//! Verification is relaxed: an observed balance greater than or equal to the
//! requested value is accepted, so rebasing and fee-adjusting tokens pass.
//! Prior state is not restored after a successful override.

use crate::erc20;
use crate::error::{OverrideError, Result};
use crate::node::ChainNode;
use crate::prober::SlotProber;
use crate::slots::{compute_mapping_key, word_from_u256, SlotCache};
use crate::types::{BalanceOverrideRequest, BlockTag, KeyOrder, OverrideOutcome, ProbeValues};
use crate::units::u256_to_decimal;
use alloy_primitives::Address;
use tracing::{info, warn};

/// Decimals assumed when a token does not answer `decimals()`.
const DEFAULT_DECIMALS: u8 = 18;

/// Applies balance overrides against a chain node, caching discovered slots.
#[derive(Debug)]
pub struct BalanceOverrider<N> {
    node: N,
    cache: SlotCache,
    probes: ProbeValues,
    verbose: bool,
}

impl<N: ChainNode> BalanceOverrider<N> {
    pub fn new(node: N) -> Self {
        Self {
            node,
            cache: SlotCache::new(),
            probes: ProbeValues::default(),
            verbose: false,
        }
    }

    pub fn with_cache(mut self, cache: SlotCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_probes(mut self, probes: ProbeValues) -> Self {
        self.probes = probes;
        self
    }

    /// Log discovered slots, previous storage and the resulting balance.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    pub fn cache(&self) -> &SlotCache {
        &self.cache
    }

    /// Balance slot for `token`, from the cache or by probing.
    ///
    /// Returns the slot and whether it was probed during this call.
    pub async fn resolve_slot(&mut self, token: Address, order: KeyOrder) -> Result<(u64, bool)> {
        if let Some(slot) = self.cache.get(token, order) {
            return Ok((slot, false));
        }
        let slot = SlotProber::new(&self.node)
            .with_probes(self.probes)
            .find_balance_slot(token, order)
            .await?;
        self.cache.insert(token, order, slot);
        if self.verbose {
            info!(token = %token, %order, slot, "discovered balance slot");
        }
        Ok((slot, true))
    }

    /// Write `request.new_value` as `request.holder`'s balance and verify it.
    pub async fn set_balance(
        &mut self,
        request: &BalanceOverrideRequest,
        order: KeyOrder,
    ) -> Result<OverrideOutcome> {
        let (slot, probed) = match request.known_slot {
            Some(slot) => (slot, false),
            None => self.resolve_slot(request.token, order).await?,
        };

        let key = compute_mapping_key(slot, request.holder, order);

        let previous = if self.verbose {
            let word = self
                .node
                .get_storage_at(request.token, key, BlockTag::Latest)
                .await?;
            info!(token = %request.token, holder = %request.holder, slot, key = %key, previous = %word, "overriding balance");
            Some(word)
        } else {
            None
        };

        self.node
            .set_storage_at(request.token, key, word_from_u256(request.new_value))
            .await?;

        let observed = erc20::balance_of(&self.node, request.token, request.holder).await?;

        if self.verbose {
            let decimals = erc20::decimals(&self.node, request.token)
                .await
                .unwrap_or(DEFAULT_DECIMALS);
            info!(
                token = %request.token,
                holder = %request.holder,
                raw = %observed,
                balance = %u256_to_decimal(observed, decimals),
                "new balance"
            );
        }

        if observed < request.new_value {
            warn!(
                token = %request.token,
                holder = %request.holder,
                expected = %request.new_value,
                actual = %observed,
                slot,
                "balance override did not take effect"
            );
            return Err(OverrideError::BalanceVerificationFailed {
                token: request.token,
                holder: request.holder,
                expected: request.new_value,
                actual: observed,
            });
        }

        Ok(OverrideOutcome {
            slot,
            probed,
            key,
            previous,
            observed,
        })
    }
}
