use crate::error::{Result, TwapError};

use serde::Serialize;

/// Default TWAP window length in days when the caller does not pass one.
pub const DEFAULT_TWAP_DAYS: f64 = 5.0;

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Spread tolerance below which the two TWAPs are declared a tie.
pub const WINNER_EPSILON: f64 = 1e-8;

/// Per-read HTTP timeout for every on-chain call.
pub const RPC_TIMEOUT_SECS: u64 = 30;

/// Substituted when the best-effort market-name read fails.
pub const DEFAULT_MARKET_NAME: &str = "Unknown Market";

/// Substituted when a best-effort ERC-20 symbol read fails.
pub const DEFAULT_TOKEN_SYMBOL: &str = "???";

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Uniswap v3 fee tiers, probed in this order; the first non-zero pool wins.
pub const UNISWAP_V3_FEE_TIERS: &[u32] = &[500, 3000, 10_000, 100];

/// Which factory/oracle protocol a chain's pools speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Algebra-style: order-sensitive `poolByPair`, `getTimepoints` oracle.
    Algebra,
    /// Uniswap v3: fee-tiered `getPool`, `observe` oracle.
    UniswapV3,
}

/// Static per-chain configuration. One entry per supported chain id.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: &'static str,
    pub default_rpc_url: &'static str,
    pub protocol: Protocol,
    pub factory: &'static str,
    /// Empty for Algebra chains — the factory lookup has no fee dimension.
    pub fee_tiers: &'static [u32],
}

pub const GNOSIS: ChainConfig = ChainConfig {
    chain_id: 100,
    name: "Gnosis",
    default_rpc_url: "https://rpc.gnosischain.com",
    protocol: Protocol::Algebra,
    factory: "0xa0864cca6e114013ab0e27cbd5b6f4c8947da766",
    fee_tiers: &[],
};

pub const ETHEREUM: ChainConfig = ChainConfig {
    chain_id: 1,
    name: "Ethereum",
    default_rpc_url: "https://eth.llamarpc.com",
    protocol: Protocol::UniswapV3,
    factory: "0x1f98431c8ad98523631ae4a59f267346ea31f984",
    fee_tiers: UNISWAP_V3_FEE_TIERS,
};

/// Look up the config for a chain id. Unknown ids are rejected here, before
/// any network call is attempted.
pub fn chain_config(chain_id: u64) -> Result<&'static ChainConfig> {
    match chain_id {
        100 => Ok(&GNOSIS),
        1 => Ok(&ETHEREUM),
        other => Err(TwapError::UnsupportedChain(other)),
    }
}

/// Resolve the RPC URL for a chain: explicit per-request override, then the
/// `RPC_URL_<chain_id>` environment variable, then the built-in default.
pub fn resolve_rpc_url(cfg: &ChainConfig, override_url: Option<&str>) -> String {
    if let Some(url) = override_url {
        return url.to_string();
    }
    std::env::var(format!("RPC_URL_{}", cfg.chain_id))
        .unwrap_or_else(|_| cfg.default_rpc_url.to_string())
}
