use serde::Serialize;

// ---------------------------------------------------------------------------
// Proposal tokens
// ---------------------------------------------------------------------------

/// The six token addresses behind one proposal, resolved once per request.
/// Indexes 0–3 of the proposal's wrapped outcomes are, by convention,
/// YES-company, NO-company, YES-currency, NO-currency.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalTokens {
    pub yes_company: String,
    pub no_company: String,
    pub yes_currency: String,
    pub no_currency: String,
    pub company_token: String,
    pub currency_token: String,
    /// Best-effort; a placeholder when the on-chain read fails.
    pub market_name: String,
}

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

/// A conditional pool that was found and orientation-checked.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionalPool {
    pub address: String,
    /// True when the pool's native price must be flipped to quote
    /// currency-per-company.
    pub inverted: bool,
    pub token0: String,
}

/// One entry of the six-pair discovery scan. A missing pool is a valid
/// terminal state, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredPool {
    pub name: &'static str,
    pub address: Option<String>,
    pub exists: bool,
    /// Orientation is only checked for the two conditional pairs.
    pub inverted: Option<bool>,
}

// ---------------------------------------------------------------------------
// TWAP window
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowStatus {
    NotStarted,
    Active,
    Ended,
}

/// The caller-specified averaging window. Status is derived from wall-clock
/// time on every request and never persisted.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TwapWindow {
    /// Unix seconds. `start = end - days * 86400`.
    pub start: f64,
    pub end: f64,
    pub days: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowInfo {
    pub start: f64,
    pub end: f64,
    pub days: f64,
    pub status: WindowStatus,
}

/// Seconds until a window boundary, plus a human-readable rendering.
#[derive(Debug, Clone, Serialize)]
pub struct Countdown {
    pub seconds: u64,
    pub formatted: String,
}

// ---------------------------------------------------------------------------
// TWAP results
// ---------------------------------------------------------------------------

/// Per-pool TWAP derived from the oracle's cumulative-tick samples.
#[derive(Debug, Clone, Serialize)]
pub struct PoolTwap {
    /// 1.0001 ^ average_tick, before orientation.
    pub raw_price: f64,
    /// Orientation-normalized: currency per company token.
    pub price: f64,
    pub average_tick: f64,
    /// Window length actually used, in whole seconds (always >= 1).
    pub seconds_window: u32,
    pub inverted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Winner {
    Yes,
    No,
    Tie,
}

/// Pair-level comparison of the YES and NO conditional-pool TWAPs.
#[derive(Debug, Clone, Serialize)]
pub struct TwapComparison {
    pub yes: PoolTwap,
    pub no: PoolTwap,
    /// yes.price - no.price
    pub spread: f64,
    /// |spread| relative to the lower of the two prices, in percent.
    /// None when the lower price is zero.
    pub percent_diff: Option<f64>,
    pub winner: Winner,
}

// ---------------------------------------------------------------------------
// Public operation responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ConditionalPools {
    pub yes: Option<ConditionalPool>,
    pub no: Option<ConditionalPool>,
}

/// Response of `calculate_twap`. Always carries everything resolved before
/// the first failure; `error` is a domain-level field, not a transport error.
#[derive(Debug, Clone, Serialize)]
pub struct TwapResponse {
    pub proposal: String,
    pub chain_id: u64,
    pub market_name: String,
    pub tokens: ProposalTokens,
    pub pools: ConditionalPools,
    pub window: WindowInfo,
    /// Countdown to window start; present only while NOT_STARTED.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_in: Option<Countdown>,
    /// Countdown to window end; present only while ACTIVE with a TWAP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_in: Option<Countdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twap: Option<TwapComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenMeta {
    pub address: String,
    /// Best-effort ERC-20 symbol; a placeholder when the read fails.
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenMetadata {
    pub yes_company: TokenMeta,
    pub no_company: TokenMeta,
    pub yes_currency: TokenMeta,
    pub no_currency: TokenMeta,
    pub company_token: TokenMeta,
    pub currency_token: TokenMeta,
}

/// Response of `discover_pools`: the fixed-order six-pair scan plus token
/// and market metadata.
#[derive(Debug, Clone, Serialize)]
pub struct PoolDiscoveryResponse {
    pub proposal: String,
    pub chain_id: u64,
    pub chain: &'static str,
    pub market_name: String,
    pub tokens: TokenMetadata,
    pub pools: Vec<DiscoveredPool>,
    pub found: usize,
    pub total: usize,
}
