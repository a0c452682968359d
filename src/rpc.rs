//! Read-only JSON-RPC transport. One `RpcClient` per (chain, RPC override)
//! pair, built lazily and cached for the process lifetime — the cache is
//! insert-only, so concurrent in-flight requests share clients freely.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use tracing::debug;

use crate::config::{resolve_rpc_url, ChainConfig, RPC_TIMEOUT_SECS};
use crate::error::{Result, TwapError};

/// The single seam between the core pipeline and the chain: a read-only
/// `eth_call` against the latest block. Everything above this trait is
/// testable with a scripted in-memory implementation.
#[async_trait]
pub trait EthCall: Send + Sync {
    /// `to` is a 0x-prefixed contract address, `data` is 0x-prefixed calldata.
    /// Returns the raw 0x-prefixed return data.
    async fn eth_call(&self, to: &str, data: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<String>,
    error: Option<serde_json::Value>,
}

pub struct RpcClient {
    http: reqwest::Client,
    url: String,
}

impl RpcClient {
    pub fn new(url: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(RPC_TIMEOUT_SECS))
            .build()?;
        Ok(Self { http, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EthCall for RpcClient {
    async fn eth_call(&self, to: &str, data: &str) -> Result<String> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "eth_call",
            "params": [{ "to": to, "data": data }, "latest"],
            "id": 1,
        });

        debug!(to, data_len = data.len(), "eth_call");

        let response: JsonRpcResponse = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(TwapError::Rpc(format!("eth_call to {to} failed: {err}")));
        }
        response
            .result
            .ok_or_else(|| TwapError::Rpc(format!("eth_call to {to}: no result in response")))
    }
}

/// Process-lifetime cache of RPC clients, keyed by (chain id, RPC override).
/// Entries are created lazily on first use and never invalidated.
pub struct ConnectionPool {
    clients: DashMap<(u64, Option<String>), Arc<RpcClient>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self { clients: DashMap::new() }
    }

    pub fn client(&self, cfg: &ChainConfig, rpc_override: Option<&str>) -> Result<Arc<RpcClient>> {
        let key = (cfg.chain_id, rpc_override.map(str::to_string));
        if let Some(existing) = self.clients.get(&key) {
            return Ok(Arc::clone(existing.value()));
        }
        let url = resolve_rpc_url(cfg, rpc_override);
        debug!(chain_id = cfg.chain_id, url = %url, "creating RPC client");
        let client = Arc::new(RpcClient::new(url)?);
        let entry = self.clients.entry(key).or_insert(client);
        Ok(Arc::clone(entry.value()))
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Explicit best-effort combinator: run a fallible read and substitute a
/// default on failure instead of propagating. Used for market name and
/// token symbol reads only — mandatory reads never go through here.
pub async fn or_default<T, F>(read: F, default: T) -> T
where
    F: std::future::Future<Output = Result<T>>,
{
    match read.await {
        Ok(value) => value,
        Err(e) => {
            debug!("best-effort read failed, substituting default: {e}");
            default
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedChain;
    use super::*;
    use crate::config::GNOSIS;

    #[tokio::test]
    async fn or_default_recovers_failed_read() {
        let chain = ScriptedChain::new();
        let name = or_default(
            async { chain.eth_call("0x00", "0x00").await },
            "fallback".to_string(),
        )
        .await;
        assert_eq!(name, "fallback");
    }

    #[test]
    fn pool_reuses_client_per_key() {
        let pool = ConnectionPool::new();
        let a = pool.client(&GNOSIS, Some("http://localhost:8545")).unwrap();
        let b = pool.client(&GNOSIS, Some("http://localhost:8545")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let c = pool.client(&GNOSIS, None).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
