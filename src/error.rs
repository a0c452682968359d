use thiserror::Error;

#[derive(Debug, Error)]
pub enum TwapError {
    #[error("invalid address '{0}': expected 0x followed by 40 hex digits")]
    InvalidAddress(String),

    #[error("unsupported chain id {0}: supported ids are 100 (Gnosis) and 1 (Ethereum)")]
    UnsupportedChain(u64),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("ABI decode error: {0}")]
    Decode(String),

    #[error("invalid price from oracle: {0}")]
    InvalidPrice(String),
}

pub type Result<T> = std::result::Result<T, TwapError>;
