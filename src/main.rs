// Balance Override: rewrite an ERC20 balance on a local dev node
//
// This binary:
// 1. Optionally resets the node's fork to a reorg-safe upstream block
// 2. Resolves the token's balance mapping slot (given, cached or probed)
// 3. Writes the requested balance for the holder and verifies it via balanceOf
//
// Configuration is read from environment variables (see config.rs).

use balance_override::config::Config;
use balance_override::{BalanceOverrider, ForkSelector, JsonRpcNode, RpcDialect, SlotCache};
use eyre::WrapErr;
use tracing::info;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Default to `info` when RUST_LOG is unset or invalid.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    info!(
        node = %config.node_rpc_url,
        dialect = ?config.dialect,
        key_order = %config.key_order,
        "starting balance override"
    );

    let node = JsonRpcNode::new(&config.node_rpc_url, config.dialect)
        .wrap_err("failed to create dev node client")?;

    if let Some(fork) = &config.fork {
        let reset = if fork.needs_head_query() {
            // Head queries go to the chain being forked, not the dev node.
            let upstream = JsonRpcNode::new(&fork.rpc_url, RpcDialect::default())
                .wrap_err("failed to create upstream client")?;
            ForkSelector::new(&node, &upstream).reset_fork(fork).await
        } else {
            // Pinned and unpinned resets never read a head.
            ForkSelector::new(&node, &node).reset_fork(fork).await
        };
        reset.wrap_err("fork reset failed")?;
    }

    let Some(request) = config.request else {
        info!("no TOKEN/HOLDER/AMOUNT configured, nothing to override");
        return Ok(());
    };

    let cache = if config.use_known_slots {
        SlotCache::with_known_slots()
    } else {
        SlotCache::new()
    };
    let mut overrider = BalanceOverrider::new(node)
        .with_cache(cache)
        .verbose(config.verbose);

    let outcome = overrider
        .set_balance(&request, config.key_order)
        .await
        .wrap_err_with(|| format!("balance override failed for token {}", request.token))?;

    info!(
        token = %request.token,
        holder = %request.holder,
        slot = outcome.slot,
        probed = outcome.probed,
        balance = %outcome.observed,
        "balance override applied"
    );
    Ok(())
}
