//! TWAP engine: cumulative-tick oracle reads, tick-to-price math, and the
//! wall-clock window/status derivation.
//!
//! Both oracle protocols return a pair of cumulative tick values; the average
//! tick over the window is their exact integer difference divided by the
//! window length. Cumulative ticks are int56 on the wire and can exceed the
//! i64 range over long windows, so the difference is taken in i128 and only
//! then converted to floating point.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::abi::{enc_uint32_array, selectors, Return};
use crate::config::{Protocol, DEFAULT_TWAP_DAYS, SECONDS_PER_DAY};
use crate::error::{Result, TwapError};
use crate::rpc::EthCall;
use crate::types::{PoolTwap, TwapWindow, WindowStatus};

/// price = TICK_BASE ^ tick
pub const TICK_BASE: f64 = 1.0001;

pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Window length actually fed to the oracle: fractional seconds truncate
/// toward zero and the window is never shorter than one second.
pub fn window_seconds(seconds_ago: f64) -> u32 {
    (seconds_ago.floor() as i64).max(1) as u32
}

/// Exact integer difference of the two cumulative samples, then one float
/// division. `oldest` is the sample at `window` seconds ago, `latest` at now.
pub fn average_tick(oldest: i128, latest: i128, window: u32) -> f64 {
    (latest - oldest) as f64 / f64::from(window)
}

/// `1.0001 ^ tick`, rejected as an oracle math failure when the result is
/// not a finite positive number.
pub fn tick_to_price(tick: f64) -> Result<f64> {
    let price = TICK_BASE.powf(tick);
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(TwapError::InvalidPrice(format!(
            "tick {tick} produced non-finite or non-positive price {price}"
        )))
    }
}

fn oracle_selector(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Algebra => selectors::GET_TIMEPOINTS,
        Protocol::UniswapV3 => selectors::OBSERVE,
    }
}

fn state_selector(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Algebra => selectors::GLOBAL_STATE,
        Protocol::UniswapV3 => selectors::SLOT0,
    }
}

/// Read the pool's cumulative-tick oracle at `[window, 0]` seconds ago and
/// derive the time-weighted average price over that window.
pub async fn calculate_pool_twap(
    client: &dyn EthCall,
    pool: &str,
    seconds_ago: f64,
    should_invert: bool,
    protocol: Protocol,
) -> Result<PoolTwap> {
    let window = window_seconds(seconds_ago);
    let data = format!("{}{}", oracle_selector(protocol), enc_uint32_array(&[window, 0]));
    let result = client.eth_call(pool, &data).await?;

    let cumulatives = Return::parse(&result)?.int_array(0)?;
    if cumulatives.len() < 2 {
        return Err(TwapError::Decode(format!(
            "oracle returned {} cumulative samples, expected 2",
            cumulatives.len()
        )));
    }

    let avg_tick = average_tick(cumulatives[0], cumulatives[1], window);
    let raw_price = tick_to_price(avg_tick)?;
    let price = if should_invert { 1.0 / raw_price } else { raw_price };

    debug!(pool, window, avg_tick, price, "pool TWAP computed");

    Ok(PoolTwap {
        raw_price,
        price,
        average_tick: avg_tick,
        seconds_window: window,
        inverted: should_invert,
    })
}

/// Instantaneous price from the pool's current tick (word 1 of the state
/// accessor). Display-only — never feeds the winner determination.
pub async fn spot_price(
    client: &dyn EthCall,
    pool: &str,
    should_invert: bool,
    protocol: Protocol,
) -> Result<f64> {
    let result = client.eth_call(pool, state_selector(protocol)).await?;
    let tick = Return::parse(&result)?.int(1)?;
    let raw = tick_to_price(tick as f64)?;
    Ok(if should_invert { 1.0 / raw } else { raw })
}

// ---------------------------------------------------------------------------
// Window / status
// ---------------------------------------------------------------------------

impl TwapWindow {
    /// `end` defaults to now, `days` to [`DEFAULT_TWAP_DAYS`];
    /// `start = end - days * 86400`.
    pub fn new(end_timestamp: Option<f64>, days: Option<f64>, now: f64) -> Self {
        let end = end_timestamp.unwrap_or(now);
        let days = days.unwrap_or(DEFAULT_TWAP_DAYS);
        Self { start: end - days * SECONDS_PER_DAY, end, days }
    }

    pub fn duration_secs(&self) -> f64 {
        self.days * SECONDS_PER_DAY
    }

    /// Pure function of wall-clock time; `now == end` is already ENDED.
    pub fn status(&self, now: f64) -> WindowStatus {
        if now < self.start {
            WindowStatus::NotStarted
        } else if now < self.end {
            WindowStatus::Active
        } else {
            WindowStatus::Ended
        }
    }
}

/// Render a second count as `"2d 3h 4m 5s"`, omitting zero units.
pub fn format_duration(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}
