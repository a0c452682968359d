//! Result assembler: the two public operations, `calculate_twap` and
//! `discover_pools`, plus boundary validation. The service owns the
//! connection pool; everything below it is stateless per request.

use tracing::{info, warn};

use crate::abi::{selectors, Return};
use crate::config::{chain_config, ChainConfig, DEFAULT_TOKEN_SYMBOL, WINNER_EPSILON};
use crate::error::{Result, TwapError};
use crate::pools::{detect_inversion, discover_all_pools, discover_conditional_pools};
use crate::proposal::resolve_proposal;
use crate::rpc::{or_default, ConnectionPool, EthCall};
use crate::twap::{calculate_pool_twap, format_duration, now_secs};
use crate::types::{
    ConditionalPool, ConditionalPools, Countdown, PoolDiscoveryResponse, PoolTwap, TokenMeta,
    TokenMetadata, TwapComparison, TwapResponse, TwapWindow, WindowInfo, WindowStatus, Winner,
};

#[derive(Debug, Clone, Default)]
pub struct TwapOptions {
    /// Unix seconds; defaults to now.
    pub end_timestamp: Option<f64>,
    /// Window length; defaults to 5.
    pub days: Option<f64>,
    pub rpc_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    pub rpc_url: Option<String>,
}

/// Top-level entry point. One instance per process; safe to share across
/// concurrent requests (the connection pool is the only shared state).
pub struct TwapService {
    connections: ConnectionPool,
}

impl TwapService {
    pub fn new() -> Self {
        Self { connections: ConnectionPool::new() }
    }

    /// Resolve a proposal's conditional pools and derive the YES/NO TWAPs
    /// over the caller's window. Domain failures (missing pool, oracle math)
    /// come back inside the response's `error` field with all partial data;
    /// only validation and mandatory-read failures raise.
    pub async fn calculate_twap(
        &self,
        proposal: &str,
        chain_id: u64,
        opts: &TwapOptions,
    ) -> Result<TwapResponse> {
        let proposal = validate_address(proposal)?;
        let cfg = chain_config(chain_id)?;
        let client = self.connections.client(cfg, opts.rpc_url.as_deref())?;
        calculate_twap_at(client.as_ref(), cfg, &proposal, opts, now_secs()).await
    }

    /// Run the fixed six-pair pool scan for a proposal, with token and
    /// market metadata attached.
    pub async fn discover_pools(
        &self,
        proposal: &str,
        chain_id: u64,
        opts: &DiscoverOptions,
    ) -> Result<PoolDiscoveryResponse> {
        let proposal = validate_address(proposal)?;
        let cfg = chain_config(chain_id)?;
        let client = self.connections.client(cfg, opts.rpc_url.as_deref())?;
        discover_pools_with(client.as_ref(), cfg, &proposal).await
    }
}

impl Default for TwapService {
    fn default() -> Self {
        Self::new()
    }
}

/// Boundary check: a 20-byte hex address, `0x` + 40 hex digits. Returns the
/// lowercased form used everywhere downstream.
pub fn validate_address(addr: &str) -> Result<String> {
    let bare = addr.strip_prefix("0x").unwrap_or("");
    if bare.len() == 40 && bare.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(addr.to_lowercase())
    } else {
        Err(TwapError::InvalidAddress(addr.to_string()))
    }
}

fn countdown_to(boundary: f64, now: f64) -> Countdown {
    let seconds = (boundary - now).max(0.0).ceil() as u64;
    Countdown { seconds, formatted: format_duration(seconds) }
}

/// Spread, winner, and percent difference for the two normalized TWAPs.
/// |spread| within [`WINNER_EPSILON`] is a tie.
fn compare_twaps(yes: PoolTwap, no: PoolTwap) -> TwapComparison {
    let spread = yes.price - no.price;
    let winner = if spread > WINNER_EPSILON {
        Winner::Yes
    } else if spread < -WINNER_EPSILON {
        Winner::No
    } else {
        Winner::Tie
    };
    let lower = yes.price.min(no.price);
    let percent_diff = if lower > 0.0 { Some(spread.abs() / lower * 100.0) } else { None };
    TwapComparison { yes, no, spread, percent_diff, winner }
}

async fn attach_orientation(
    client: &dyn EthCall,
    address: Option<String>,
    company_token: &str,
) -> Result<Option<ConditionalPool>> {
    match address {
        Some(address) => {
            let orientation = detect_inversion(client, &address, company_token).await?;
            Ok(Some(ConditionalPool {
                address,
                inverted: orientation.should_invert,
                token0: orientation.token0,
            }))
        }
        None => Ok(None),
    }
}

async fn calculate_twap_at(
    client: &dyn EthCall,
    cfg: &ChainConfig,
    proposal: &str,
    opts: &TwapOptions,
    now: f64,
) -> Result<TwapResponse> {
    // Tokens, pools, and orientation are always resolved first, whatever the
    // window status turns out to be.
    let tokens = resolve_proposal(client, proposal).await?;
    let (yes_address, no_address) = discover_conditional_pools(client, cfg, &tokens).await?;
    let (yes_pool, no_pool) = tokio::try_join!(
        attach_orientation(client, yes_address, &tokens.yes_company),
        attach_orientation(client, no_address, &tokens.no_company),
    )?;

    let window = TwapWindow::new(opts.end_timestamp, opts.days, now);
    let status = window.status(now);

    let mut response = TwapResponse {
        proposal: proposal.to_string(),
        chain_id: cfg.chain_id,
        market_name: tokens.market_name.clone(),
        pools: ConditionalPools { yes: yes_pool.clone(), no: no_pool.clone() },
        tokens,
        window: WindowInfo { start: window.start, end: window.end, days: window.days, status },
        starts_in: None,
        ends_in: None,
        twap: None,
        error: None,
    };

    let (yes_pool, no_pool) = match (yes_pool, no_pool) {
        (Some(yes), Some(no)) => (yes, no),
        (yes, no) => {
            let mut missing = Vec::new();
            if yes.is_none() {
                missing.push("YES");
            }
            if no.is_none() {
                missing.push("NO");
            }
            let sides = missing.join(" and ");
            warn!(proposal, %sides, "conditional pool missing");
            response.error = Some(format!("conditional pool not found for {sides}"));
            return Ok(response);
        }
    };

    match status {
        WindowStatus::NotStarted => {
            // The oracle has no in-window history yet; report the countdown
            // instead of a price.
            response.starts_in = Some(countdown_to(window.start, now));
        }
        WindowStatus::Active | WindowStatus::Ended => {
            let lookback = if status == WindowStatus::Active {
                (now - window.start).min(window.duration_secs())
            } else {
                window.duration_secs()
            };

            let twaps = tokio::try_join!(
                calculate_pool_twap(client, &yes_pool.address, lookback, yes_pool.inverted, cfg.protocol),
                calculate_pool_twap(client, &no_pool.address, lookback, no_pool.inverted, cfg.protocol),
            );
            match twaps {
                Ok((yes, no)) => {
                    let comparison = compare_twaps(yes, no);
                    info!(
                        proposal,
                        ?status,
                        spread = comparison.spread,
                        winner = ?comparison.winner,
                        "TWAP computed"
                    );
                    response.twap = Some(comparison);
                    if status == WindowStatus::Active {
                        response.ends_in = Some(countdown_to(window.end, now));
                    }
                }
                Err(e) => {
                    warn!(proposal, "TWAP step failed: {e}");
                    response.error = Some(format!("TWAP calculation failed: {e}"));
                }
            }
        }
    }

    Ok(response)
}

async fn token_symbol(client: &dyn EthCall, token: &str) -> Result<String> {
    let result = client.eth_call(token, selectors::SYMBOL).await?;
    Return::parse(&result)?.string(0)
}

async fn token_meta(client: &dyn EthCall, address: &str) -> TokenMeta {
    let symbol =
        or_default(token_symbol(client, address), DEFAULT_TOKEN_SYMBOL.to_string()).await;
    TokenMeta { address: address.to_string(), symbol }
}

async fn discover_pools_with(
    client: &dyn EthCall,
    cfg: &ChainConfig,
    proposal: &str,
) -> Result<PoolDiscoveryResponse> {
    let tokens = resolve_proposal(client, proposal).await?;
    let pools = discover_all_pools(client, cfg, &tokens).await?;
    let found = pools.iter().filter(|p| p.exists).count();
    let total = pools.len();

    let (yes_company, no_company, yes_currency, no_currency, company_token, currency_token) =
        tokio::join!(
            token_meta(client, &tokens.yes_company),
            token_meta(client, &tokens.no_company),
            token_meta(client, &tokens.yes_currency),
            token_meta(client, &tokens.no_currency),
            token_meta(client, &tokens.company_token),
            token_meta(client, &tokens.currency_token),
        );

    info!(proposal, market = %tokens.market_name, found, total, "pool discovery complete");

    Ok(PoolDiscoveryResponse {
        proposal: proposal.to_string(),
        chain_id: cfg.chain_id,
        chain: cfg.name,
        market_name: tokens.market_name,
        tokens: TokenMetadata {
            yes_company,
            no_company,
            yes_currency,
            no_currency,
            company_token,
            currency_token,
        },
        pools,
        found,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{enc_address, enc_uint, enc_uint32_array};
    use crate::config::{DEFAULT_MARKET_NAME, GNOSIS, ZERO_ADDRESS};
    use crate::rpc::testing::ScriptedChain;

    const PROPOSAL: &str = "0x2222222222222222222222222222222222222222";

    fn addr(n: u8) -> String {
        format!("0x{:040x}", n)
    }

    fn word(a: &str) -> String {
        enc_address(a).unwrap()
    }

    fn int_word(v: i128) -> String {
        let ext = if v < 0 { "f" } else { "0" };
        format!("{}{}", ext.repeat(32), hex::encode(v.to_be_bytes()))
    }

    fn oracle_return(oldest: i128, latest: i128) -> String {
        let mut data = enc_uint(0x40);
        data.push_str(&enc_uint(0xa0));
        data.push_str(&enc_uint(2));
        data.push_str(&int_word(oldest));
        data.push_str(&int_word(latest));
        data.push_str(&enc_uint(2));
        data.push_str(&enc_uint(0));
        data.push_str(&enc_uint(0));
        data
    }

    fn pool_by_pair(a: &str, b: &str) -> String {
        format!("{}{}{}", selectors::POOL_BY_PAIR, word(a), word(b))
    }

    /// Script the proposal reads: tokens addr(1)..addr(6), no market name
    /// (exercises the best-effort default).
    fn script_proposal(chain: &mut ScriptedChain) {
        for i in 0..4u64 {
            chain.on(
                PROPOSAL,
                format!("{}{}", selectors::WRAPPED_OUTCOME, enc_uint(i)),
                word(&addr(i as u8 + 1)),
            );
        }
        chain.on(PROPOSAL, selectors::COLLATERAL_TOKEN_1.to_string(), word(&addr(5)));
        chain.on(PROPOSAL, selectors::COLLATERAL_TOKEN_2.to_string(), word(&addr(6)));
    }

    /// Script both conditional pools on Gnosis: YES pool addr(10) with the
    /// company token as token0 (no inversion), NO pool addr(11) with some
    /// other token0 (inversion required).
    fn script_conditional_pools(chain: &mut ScriptedChain) {
        chain.on(GNOSIS.factory, pool_by_pair(&addr(1), &addr(3)), word(&addr(10)));
        chain.on(&addr(10), selectors::TOKEN0.to_string(), word(&addr(1)));
        chain.on(GNOSIS.factory, pool_by_pair(&addr(2), &addr(4)), word(&addr(11)));
        chain.on(&addr(11), selectors::TOKEN0.to_string(), word(&addr(4)));
    }

    fn twap_with_price(price: f64) -> PoolTwap {
        PoolTwap { raw_price: price, price, average_tick: 0.0, seconds_window: 1, inverted: false }
    }

    #[tokio::test]
    async fn bad_address_fails_before_any_network_call() {
        let service = TwapService::new();
        for bad in ["123", "0x123", "not-an-address", "0xgg22222222222222222222222222222222222222"] {
            let err = service.calculate_twap(bad, 100, &TwapOptions::default()).await;
            assert!(matches!(err, Err(TwapError::InvalidAddress(_))), "{bad}");
            // Invalid address wins even on an invalid chain id.
            let err = service.calculate_twap(bad, 999, &TwapOptions::default()).await;
            assert!(matches!(err, Err(TwapError::InvalidAddress(_))), "{bad}");
        }
    }

    #[tokio::test]
    async fn unsupported_chain_fails_before_any_network_call() {
        let service = TwapService::new();
        for chain_id in [0u64, 2, 137, 42_161] {
            let err = service.calculate_twap(PROPOSAL, chain_id, &TwapOptions::default()).await;
            assert!(matches!(err, Err(TwapError::UnsupportedChain(id)) if id == chain_id));
            let err = service.discover_pools(PROPOSAL, chain_id, &DiscoverOptions::default()).await;
            assert!(matches!(err, Err(TwapError::UnsupportedChain(id)) if id == chain_id));
        }
    }

    #[test]
    fn winner_epsilon_boundary() {
        // Spread of exactly +1e-8 is still a tie (2e-8 - 1e-8 is exact in f64).
        let tie = compare_twaps(twap_with_price(2e-8), twap_with_price(1e-8));
        assert_eq!(tie.winner, Winner::Tie);

        let yes = compare_twaps(twap_with_price(2.1e-8), twap_with_price(1e-8));
        assert_eq!(yes.winner, Winner::Yes);

        let no = compare_twaps(twap_with_price(1e-8), twap_with_price(2.1e-8));
        assert_eq!(no.winner, Winner::No);
    }

    #[test]
    fn percent_diff_relative_to_lower_price() {
        let cmp = compare_twaps(twap_with_price(1.5), twap_with_price(1.0));
        assert_eq!(cmp.winner, Winner::Yes);
        assert!((cmp.spread - 0.5).abs() < 1e-12);
        assert!((cmp.percent_diff.unwrap() - 50.0).abs() < 1e-9);

        let degenerate = compare_twaps(twap_with_price(1.0), twap_with_price(0.0));
        assert_eq!(degenerate.percent_diff, None);
    }

    #[tokio::test]
    async fn missing_yes_pool_is_an_error_flagged_result() {
        let mut chain = ScriptedChain::new();
        script_proposal(&mut chain);
        // YES pair resolves to zero in both orderings; NO pool exists.
        chain.on(GNOSIS.factory, pool_by_pair(&addr(1), &addr(3)), word(ZERO_ADDRESS));
        chain.on(GNOSIS.factory, pool_by_pair(&addr(3), &addr(1)), word(ZERO_ADDRESS));
        chain.on(GNOSIS.factory, pool_by_pair(&addr(2), &addr(4)), word(&addr(11)));
        chain.on(&addr(11), selectors::TOKEN0.to_string(), word(&addr(4)));

        let response =
            calculate_twap_at(&chain, &GNOSIS, PROPOSAL, &TwapOptions::default(), 1_000_000.0)
                .await
                .unwrap();

        assert!(response.pools.yes.is_none());
        let no = response.pools.no.as_ref().expect("NO pool populated");
        assert_eq!(no.address, addr(11));
        assert!(no.inverted);
        assert_eq!(response.error.as_deref(), Some("conditional pool not found for YES"));
        assert!(response.twap.is_none());
        // Partial token data survives.
        assert_eq!(response.tokens.yes_company, addr(1));
    }

    #[tokio::test]
    async fn not_started_reports_countdown_without_oracle_read() {
        let mut chain = ScriptedChain::new();
        script_proposal(&mut chain);
        script_conditional_pools(&mut chain);

        let end = 1_000_000.0;
        let days = 5.0;
        let start = end - days * 86_400.0;
        let now = start - 10.0;
        let opts = TwapOptions { end_timestamp: Some(end), days: Some(days), rpc_url: None };

        let response = calculate_twap_at(&chain, &GNOSIS, PROPOSAL, &opts, now).await.unwrap();
        // 7 proposal reads + 2 pool lookups + 2 token0 reads, nothing more.
        assert_eq!(chain.call_count(), 11);

        assert_eq!(response.window.status, WindowStatus::NotStarted);
        let countdown = response.starts_in.expect("countdown to start");
        assert_eq!(countdown.seconds, 10);
        assert_eq!(countdown.formatted, "10s");
        assert!(response.twap.is_none());
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn active_window_uses_elapsed_lookback_and_reports_time_remaining() {
        let mut chain = ScriptedChain::new();
        script_proposal(&mut chain);
        script_conditional_pools(&mut chain);

        let end = 1_000_000.0;
        let start = end - 5.0 * 86_400.0;
        let now = start + 600.0; // 600 s into the window
        let opts = TwapOptions { end_timestamp: Some(end), days: Some(5.0), rpc_url: None };

        let oracle = format!("{}{}", selectors::GET_TIMEPOINTS, enc_uint32_array(&[600, 0]));
        chain.on(&addr(10), oracle.clone(), oracle_return(0, 600 * 50));
        chain.on(&addr(11), oracle, oracle_return(0, 600 * 50));

        let response = calculate_twap_at(&chain, &GNOSIS, PROPOSAL, &opts, now).await.unwrap();
        assert_eq!(response.window.status, WindowStatus::Active);
        let twap = response.twap.expect("twap present");
        assert_eq!(twap.yes.seconds_window, 600);
        assert_eq!(twap.no.seconds_window, 600);
        // Same tick, but NO is inverted — YES must win.
        assert_eq!(twap.winner, Winner::Yes);
        let remaining = response.ends_in.expect("time remaining while active");
        assert_eq!(remaining.seconds, (end - now) as u64);
    }

    #[tokio::test]
    async fn ended_window_end_to_end_on_gnosis() {
        let mut chain = ScriptedChain::new();
        script_proposal(&mut chain);
        script_conditional_pools(&mut chain);

        let window_secs = 5 * 86_400u32;
        let oracle =
            format!("{}{}", selectors::GET_TIMEPOINTS, enc_uint32_array(&[window_secs, 0]));
        // YES pool averages tick 100 (not inverted): price = 1.0001^100.
        chain.on(&addr(10), oracle.clone(), oracle_return(0, i128::from(window_secs) * 100));
        // NO pool averages tick 200, inverted: price = 1.0001^-200.
        chain.on(&addr(11), oracle, oracle_return(0, i128::from(window_secs) * 200));

        let opts = TwapOptions {
            end_timestamp: Some(1_000_000.0),
            days: Some(5.0),
            rpc_url: None,
        };
        let response =
            calculate_twap_at(&chain, &GNOSIS, PROPOSAL, &opts, 2_000_000.0).await.unwrap();

        assert_eq!(response.window.status, WindowStatus::Ended);
        assert_eq!(response.market_name, DEFAULT_MARKET_NAME);
        assert!(response.error.is_none());
        assert!(response.starts_in.is_none());
        assert!(response.ends_in.is_none(), "no countdown once ended");

        let twap = response.twap.expect("twap present");
        assert_eq!(twap.yes.seconds_window, window_secs);
        assert_eq!(twap.no.seconds_window, window_secs);
        assert!(!twap.yes.inverted);
        assert!(twap.no.inverted);
        assert!((twap.yes.price - 1.0001f64.powf(100.0)).abs() < 1e-12);
        assert!((twap.no.price - 1.0001f64.powf(-200.0)).abs() < 1e-12);
        assert_eq!(twap.winner, Winner::Yes);
        assert!(twap.spread > 0.0);
        assert!(twap.percent_diff.unwrap() > 0.0);
    }

    #[tokio::test]
    async fn oracle_failure_folds_into_error_field() {
        let mut chain = ScriptedChain::new();
        script_proposal(&mut chain);
        script_conditional_pools(&mut chain);
        // No oracle responses scripted: the TWAP step fails, the rest survives.

        let opts = TwapOptions {
            end_timestamp: Some(1_000_000.0),
            days: Some(5.0),
            rpc_url: None,
        };
        let response =
            calculate_twap_at(&chain, &GNOSIS, PROPOSAL, &opts, 2_000_000.0).await.unwrap();

        assert!(response.twap.is_none());
        let error = response.error.expect("error field set");
        assert!(error.starts_with("TWAP calculation failed"), "{error}");
        assert!(response.pools.yes.is_some());
        assert!(response.pools.no.is_some());
        assert_eq!(response.window.status, WindowStatus::Ended);
    }

    #[tokio::test]
    async fn discovery_returns_six_entries_with_metadata() {
        let mut chain = ScriptedChain::new();
        script_proposal(&mut chain);
        script_conditional_pools(&mut chain);

        // The four prediction pairs resolve to zero in both orderings.
        let currency = addr(6);
        for conditional in [addr(1), addr(2), addr(3), addr(4)] {
            chain.on(GNOSIS.factory, pool_by_pair(&conditional, &currency), word(ZERO_ADDRESS));
            chain.on(GNOSIS.factory, pool_by_pair(&currency, &conditional), word(ZERO_ADDRESS));
        }
        // One scripted symbol; the other five fall back to the placeholder.
        chain.on(&addr(6), selectors::SYMBOL.to_string(), {
            let mut data = enc_uint(0x20);
            data.push_str(&enc_uint(5));
            data.push_str(&format!("{:0<64}", hex::encode(b"wXDAI")));
            data
        });

        let response = discover_pools_with(&chain, &GNOSIS, PROPOSAL).await.unwrap();
        assert_eq!(response.total, 6);
        assert_eq!(response.pools.len(), 6);
        assert_eq!(response.found, 2);
        assert_eq!(
            response.found,
            response.pools.iter().filter(|p| p.address.is_some()).count()
        );
        assert_eq!(response.pools[0].inverted, Some(false));
        assert_eq!(response.pools[1].inverted, Some(true));
        assert_eq!(response.tokens.currency_token.symbol, "wXDAI");
        assert_eq!(response.tokens.yes_company.symbol, DEFAULT_TOKEN_SYMBOL);
        assert_eq!(response.chain, "Gnosis");
    }

    #[test]
    fn validate_address_normalizes_case() {
        let ok = validate_address("0xABCDEF0123456789abcdef0123456789ABCDEF01").unwrap();
        assert_eq!(ok, "0xabcdef0123456789abcdef0123456789abcdef01");
    }
}
