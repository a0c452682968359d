//! Pool discovery against the chain's exchange factory, plus the orientation
//! check that decides whether a pool's native price needs flipping.
//!
//! A missing pool is a normal terminal state and comes back as `None`; a
//! failed individual factory read is treated the same way (logged, absorbed).
//! Only malformed input propagates as an error from a lookup.

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::abi::{enc_address, enc_uint, selectors, Return};
use crate::config::{ChainConfig, Protocol, ZERO_ADDRESS};
use crate::error::Result;
use crate::rpc::EthCall;
use crate::types::{DiscoveredPool, ProposalTokens};

/// Issue one factory lookup and decode the pool address. Zero address and
/// read failures both collapse to `None`.
async fn lookup(client: &dyn EthCall, factory: &str, data: &str) -> Option<String> {
    let result = match client.eth_call(factory, data).await {
        Ok(r) => r,
        Err(e) => {
            warn!("factory lookup failed: {e}");
            return None;
        }
    };
    match Return::parse(&result).and_then(|r| r.address(0)) {
        Ok(addr) if addr != ZERO_ADDRESS => Some(addr),
        Ok(_) => None,
        Err(e) => {
            warn!("factory lookup returned undecodable data: {e}");
            None
        }
    }
}

/// Find the pool for a token pair under the chain's protocol.
///
/// Algebra's `poolByPair` is order-sensitive: a zero result is retried once
/// with the operands swapped. Uniswap v3 probes every configured fee tier in
/// parallel and takes the first non-zero result in declared tier order.
pub async fn find_pool(
    client: &dyn EthCall,
    cfg: &ChainConfig,
    token_a: &str,
    token_b: &str,
) -> Result<Option<String>> {
    match cfg.protocol {
        Protocol::Algebra => {
            let data = format!(
                "{}{}{}",
                selectors::POOL_BY_PAIR,
                enc_address(token_a)?,
                enc_address(token_b)?
            );
            if let Some(pool) = lookup(client, cfg.factory, &data).await {
                return Ok(Some(pool));
            }
            let swapped = format!(
                "{}{}{}",
                selectors::POOL_BY_PAIR,
                enc_address(token_b)?,
                enc_address(token_a)?
            );
            Ok(lookup(client, cfg.factory, &swapped).await)
        }
        Protocol::UniswapV3 => {
            let mut calls = Vec::with_capacity(cfg.fee_tiers.len());
            for fee in cfg.fee_tiers {
                calls.push(format!(
                    "{}{}{}{}",
                    selectors::GET_POOL,
                    enc_address(token_a)?,
                    enc_address(token_b)?,
                    enc_uint(u64::from(*fee))
                ));
            }
            let results = join_all(calls.iter().map(|data| lookup(client, cfg.factory, data))).await;
            Ok(results.into_iter().flatten().next())
        }
    }
}

/// Locate the two conditional pools concurrently: YES = (yesCompany,
/// yesCurrency), NO = (noCompany, noCurrency). Either side may be `None`.
pub async fn discover_conditional_pools(
    client: &dyn EthCall,
    cfg: &ChainConfig,
    tokens: &ProposalTokens,
) -> Result<(Option<String>, Option<String>)> {
    tokio::try_join!(
        find_pool(client, cfg, &tokens.yes_company, &tokens.yes_currency),
        find_pool(client, cfg, &tokens.no_company, &tokens.no_currency),
    )
}

#[derive(Debug, Clone)]
pub struct Orientation {
    pub should_invert: bool,
    pub token0: String,
}

/// Read the pool's first registered token. If it is the company token the
/// native price already quotes currency-per-company; otherwise invert.
pub async fn detect_inversion(
    client: &dyn EthCall,
    pool: &str,
    company_token: &str,
) -> Result<Orientation> {
    let result = client.eth_call(pool, selectors::TOKEN0).await?;
    let token0 = Return::parse(&result)?.address(0)?;
    let should_invert = !token0.eq_ignore_ascii_case(company_token);
    debug!(pool, %token0, should_invert, "orientation checked");
    Ok(Orientation { should_invert, token0 })
}

/// The six-pair discovery scan, in the fixed caller-visible order: the two
/// conditional pairs first, then each conditional token against the base
/// currency. Executed pair-by-pair so the output order never depends on
/// completion order. Orientation is checked for found conditional pairs only.
pub async fn discover_all_pools(
    client: &dyn EthCall,
    cfg: &ChainConfig,
    tokens: &ProposalTokens,
) -> Result<Vec<DiscoveredPool>> {
    let pairs: [(&'static str, &str, &str, Option<&str>); 6] = [
        (
            "YES_COMPANY/YES_CURRENCY",
            &tokens.yes_company,
            &tokens.yes_currency,
            Some(&tokens.yes_company),
        ),
        (
            "NO_COMPANY/NO_CURRENCY",
            &tokens.no_company,
            &tokens.no_currency,
            Some(&tokens.no_company),
        ),
        ("YES_COMPANY/CURRENCY", &tokens.yes_company, &tokens.currency_token, None),
        ("NO_COMPANY/CURRENCY", &tokens.no_company, &tokens.currency_token, None),
        ("YES_CURRENCY/CURRENCY", &tokens.yes_currency, &tokens.currency_token, None),
        ("NO_CURRENCY/CURRENCY", &tokens.no_currency, &tokens.currency_token, None),
    ];

    let mut out = Vec::with_capacity(pairs.len());
    for (name, token_a, token_b, company) in pairs {
        let address = find_pool(client, cfg, token_a, token_b).await?;
        let inverted = match (&address, company) {
            (Some(pool), Some(company)) => {
                Some(detect_inversion(client, pool, company).await?.should_invert)
            }
            _ => None,
        };
        let exists = address.is_some();
        out.push(DiscoveredPool { name, address, exists, inverted });
    }
    Ok(out)
}
