//! Minimal JSON-RPC client for the external ledger.
//!
//! Only the calls the healthcheck needs: `eth_blockNumber` and `eth_chainId`.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::config::ChainConfig;
use crate::error::{LedgerError, LedgerResult};

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// JSON-RPC client bound to one endpoint.
pub struct LedgerClient {
    rpc_url: String,
    http_client: reqwest::Client,
}

impl LedgerClient {
    pub fn new(chain: &ChainConfig, timeout: Duration) -> LedgerResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("govault-core/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(LedgerClient {
            rpc_url: chain.rpc_url.clone(),
            http_client,
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Latest block height.
    pub async fn block_number(&self) -> LedgerResult<u64> {
        let result = self.call("eth_blockNumber").await?;
        parse_quantity(&result)
    }

    pub async fn chain_id(&self) -> LedgerResult<u64> {
        let result = self.call("eth_chainId").await?;
        parse_quantity(&result)
    }

    async fn call(&self, method: &str) -> LedgerResult<serde_json::Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": [],
        });

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LedgerError::Transport(format!(
                "{} returned {}",
                method,
                response.status()
            )));
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(LedgerError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        parsed
            .result
            .ok_or_else(|| LedgerError::InvalidResponse(format!("{} returned no result", method)))
    }
}

/// Parse a `0x`-prefixed hex quantity.
fn parse_quantity(value: &serde_json::Value) -> LedgerResult<u64> {
    let raw = value.as_str().ok_or_else(|| {
        LedgerError::InvalidResponse(format!("expected hex string, got {}", value))
    })?;
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| LedgerError::InvalidResponse(format!("missing 0x prefix: {}", raw)))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::InvalidResponse(format!("bad quantity {}: {}", raw, e)))
}
