// JSON-RPC transport to a local dev node (Anvil or Hardhat)
//
// Built on an alloy RootProvider. Standard reads (eth_getStorageAt, eth_call,
// eth_blockNumber) go through the typed Provider API. Anvil mutations use
// AnvilApi; Hardhat has no typed wrappers, so its hardhat_* methods are sent
// with raw_request. Hardhat rejects zero-padded QUANTITY storage positions, so
// its keys are formatted from the fixed-width word without altering the value.

use super::{BlockSource, ChainNode, ForkRequest};
use crate::error::NodeError;
use crate::slots::{u256_from_word, word_from_u256};
use crate::types::BlockTag;
use alloy::eips::BlockId;
use alloy::providers::ext::AnvilApi;
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::transports::http::Http;
use alloy::transports::{RpcError, TransportError};
use alloy_primitives::{hex, Address, Bytes, B256, U256};
use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Which dev node is on the other end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RpcDialect {
    #[default]
    Anvil,
    Hardhat,
}

impl RpcDialect {
    fn namespace(self) -> &'static str {
        match self {
            RpcDialect::Anvil => "anvil",
            RpcDialect::Hardhat => "hardhat",
        }
    }

    /// Dialect-specific method name, e.g. `anvil_setStorageAt`.
    pub fn method(self, name: &str) -> String {
        format!("{}_{name}", self.namespace())
    }

    /// Storage position as accepted by the dialect's `setStorageAt`.
    ///
    /// Anvil takes the full 32-byte word. Hardhat wants a QUANTITY with no
    /// leading zero digits.
    pub fn storage_position(self, key: B256) -> String {
        match self {
            RpcDialect::Anvil => hex::encode_prefixed(key),
            RpcDialect::Hardhat => quantity(u256_from_word(key)),
        }
    }
}

impl FromStr for RpcDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anvil" => Ok(RpcDialect::Anvil),
            "hardhat" => Ok(RpcDialect::Hardhat),
            other => Err(format!("unknown rpc dialect '{other}', expected anvil|hardhat")),
        }
    }
}

/// Minimal hex QUANTITY: `0x0`, `0x1f4`, ...
fn quantity(value: U256) -> String {
    format!("0x{value:x}")
}

/// `forking` object of `anvil_reset` / `hardhat_reset`.
///
/// alloy's `Forking` has no `ignoreUnknownTxType`, so the payload is our own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct ForkingParams {
    json_rpc_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    block_number: Option<u64>,
    ignore_unknown_tx_type: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ResetParams {
    forking: ForkingParams,
}

fn reset_params(request: &ForkRequest) -> (ResetParams,) {
    (ResetParams {
        forking: ForkingParams {
            json_rpc_url: request.rpc_url.clone(),
            block_number: request.block_number,
            ignore_unknown_tx_type: request.ignore_unknown_tx_type,
        },
    },)
}

fn block_id(tag: BlockTag) -> BlockId {
    match tag {
        BlockTag::Latest => BlockId::latest(),
        BlockTag::Number(n) => BlockId::number(n),
    }
}

/// Attach the method name to an alloy transport error.
fn node_error(method: &str, err: TransportError) -> NodeError {
    match err {
        RpcError::ErrorResp(payload) => NodeError::Rpc {
            method: method.to_string(),
            code: payload.code,
            message: payload.message.to_string(),
        },
        RpcError::DeserError { err, text } => NodeError::Decode {
            method: method.to_string(),
            reason: format!("{err}: {text}"),
        },
        RpcError::NullResp => NodeError::Decode {
            method: method.to_string(),
            reason: "null response".to_string(),
        },
        other => NodeError::Transport(other.to_string()),
    }
}

/// HTTP JSON-RPC chain node.
#[derive(Debug, Clone)]
pub struct JsonRpcNode {
    provider: RootProvider,
    url: reqwest::Url,
    dialect: RpcDialect,
}

impl JsonRpcNode {
    pub fn new(url: &str, dialect: RpcDialect) -> Result<Self, NodeError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| NodeError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(NodeError::InvalidUrl {
                    url: url.to_string(),
                    reason: format!("unsupported scheme `{other}`"),
                })
            }
        }
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let transport = Http::with_client(client, parsed.clone());
        let is_local = transport.guess_local();
        let provider = RootProvider::new(RpcClient::new(transport, is_local));
        Ok(Self {
            provider,
            url: parsed,
            dialect,
        })
    }

    pub fn dialect(&self) -> RpcDialect {
        self.dialect
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn provider(&self) -> &RootProvider {
        &self.provider
    }

    /// Send an untyped request; used where alloy has no typed wrapper.
    async fn raw<P>(&self, method: String, params: P) -> Result<Value, NodeError>
    where
        P: alloy::rpc::json_rpc::RpcSend,
    {
        debug!(method = %method, "raw rpc request");
        self.provider
            .raw_request::<P, Value>(Cow::Owned(method.clone()), params)
            .await
            .map_err(|e| node_error(&method, e))
    }
}

impl BlockSource for JsonRpcNode {
    async fn block_number(&self) -> Result<u64, NodeError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| node_error("eth_blockNumber", e))
    }
}

impl ChainNode for JsonRpcNode {
    async fn get_storage_at(&self, address: Address, key: B256, block: BlockTag) -> Result<B256, NodeError> {
        let value = self
            .provider
            .get_storage_at(address, u256_from_word(key))
            .block_id(block_id(block))
            .await
            .map_err(|e| node_error("eth_getStorageAt", e))?;
        Ok(word_from_u256(value))
    }

    async fn set_storage_at(&self, address: Address, key: B256, value: B256) -> Result<(), NodeError> {
        match self.dialect {
            RpcDialect::Anvil => {
                self.provider
                    .anvil_set_storage_at(address, u256_from_word(key), value)
                    .await
                    .map_err(|e| node_error("anvil_setStorageAt", e))?;
            }
            RpcDialect::Hardhat => {
                let position = self.dialect.storage_position(key);
                self.raw(
                    self.dialect.method("setStorageAt"),
                    (address, position, value),
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, NodeError> {
        // Both `input` and `data`: older Hardhat versions only read `data`.
        let tx = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::both(calldata));
        self.provider
            .call(tx)
            .block(BlockId::latest())
            .await
            .map_err(|e| node_error("eth_call", e))
    }

    async fn reset_fork(&self, request: ForkRequest) -> Result<(), NodeError> {
        self.raw(self.dialect.method("reset"), reset_params(&request))
            .await?;
        Ok(())
    }

    async fn impersonate_account(&self, account: Address) -> Result<(), NodeError> {
        match self.dialect {
            RpcDialect::Anvil => self
                .provider
                .anvil_impersonate_account(account)
                .await
                .map_err(|e| node_error("anvil_impersonateAccount", e)),
            RpcDialect::Hardhat => self
                .raw(self.dialect.method("impersonateAccount"), (account,))
                .await
                .map(drop),
        }
    }

    async fn set_native_balance(&self, account: Address, amount: U256) -> Result<(), NodeError> {
        match self.dialect {
            RpcDialect::Anvil => self
                .provider
                .anvil_set_balance(account, amount)
                .await
                .map_err(|e| node_error("anvil_setBalance", e)),
            RpcDialect::Hardhat => self
                .raw(self.dialect.method("setBalance"), (account, quantity(amount)))
                .await
                .map(drop),
        }
    }

    async fn increase_time(&self, seconds: u64) -> Result<(), NodeError> {
        match self.dialect {
            RpcDialect::Anvil => {
                self.provider
                    .anvil_increase_time(seconds.into())
                    .await
                    .map_err(|e| node_error("evm_increaseTime", e))?;
            }
            RpcDialect::Hardhat => {
                self.raw("evm_increaseTime".to_string(), (seconds,)).await?;
            }
        }
        Ok(())
    }

    async fn mine(&self) -> Result<(), NodeError> {
        match self.dialect {
            RpcDialect::Anvil => self
                .provider
                .anvil_mine(Some(1u64.into()), None)
                .await
                .map_err(|e| node_error("anvil_mine", e)),
            RpcDialect::Hardhat => self.raw("evm_mine".to_string(), ()).await.map(drop),
        }
    }
}
