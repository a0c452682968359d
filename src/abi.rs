//! Minimal ABI calldata encoding and return-data decoding for the handful of
//! read-only contract calls this crate issues. Decoding is strict: any shape
//! mismatch is a loud `Decode` error, never a silent positional fallback.

use crate::error::{Result, TwapError};

// ---------------------------------------------------------------------------
// Function selectors (keccak-256 of the canonical signature, first 4 bytes)
// ---------------------------------------------------------------------------

pub mod selectors {
    /// wrappedOutcome(uint256) — proposal's conditional outcome token at index i.
    pub const WRAPPED_OUTCOME: &str = "0x18a988a8";
    /// collateralToken1() — base company collateral token.
    pub const COLLATERAL_TOKEN_1: &str = "0x4d7b0900";
    /// collateralToken2() — base currency collateral token.
    pub const COLLATERAL_TOKEN_2: &str = "0xc4a091d2";
    /// marketName()
    pub const MARKET_NAME: &str = "0xe6bfd26a";
    /// poolByPair(address,address) — Algebra factory lookup.
    pub const POOL_BY_PAIR: &str = "0xd9a641e1";
    /// getPool(address,address,uint24) — Uniswap v3 factory lookup.
    pub const GET_POOL: &str = "0x1698ee82";
    /// token0()
    pub const TOKEN0: &str = "0x0dfe1681";
    /// observe(uint32[]) — Uniswap v3 cumulative-tick oracle.
    pub const OBSERVE: &str = "0x883bdbfd";
    /// getTimepoints(uint32[]) — Algebra cumulative-tick oracle.
    pub const GET_TIMEPOINTS: &str = "0x9d3a5241";
    /// slot0() — Uniswap v3 pool state (current tick at word 1).
    pub const SLOT0: &str = "0x3850c7bd";
    /// globalState() — Algebra pool state (current tick at word 1).
    pub const GLOBAL_STATE: &str = "0xe76c01e4";
    /// symbol()
    pub const SYMBOL: &str = "0x95d89b41";
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode an address as a 32-byte word (left-padded, no 0x).
pub fn enc_address(addr: &str) -> Result<String> {
    let bare = addr.strip_prefix("0x").unwrap_or(addr);
    if bare.len() != 40 || !bare.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(TwapError::InvalidAddress(addr.to_string()));
    }
    Ok(format!("{:0>64}", bare.to_lowercase()))
}

/// Encode an unsigned integer as a 32-byte word (no 0x).
pub fn enc_uint(v: u64) -> String {
    format!("{v:064x}")
}

/// Encode a `uint32[]` argument in head/tail form for a call whose only
/// argument is the array: offset word, length word, then one word per element.
pub fn enc_uint32_array(items: &[u32]) -> String {
    let mut out = enc_uint(0x20);
    out.push_str(&enc_uint(items.len() as u64));
    for item in items {
        out.push_str(&enc_uint(u64::from(*item)));
    }
    out
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decoded return data, addressed as 32-byte words.
pub struct Return {
    data: Vec<u8>,
}

impl Return {
    pub fn parse(result: &str) -> Result<Self> {
        let bare = result.strip_prefix("0x").unwrap_or(result);
        let data = hex::decode(bare)
            .map_err(|e| TwapError::Decode(format!("return data is not hex: {e}")))?;
        if data.is_empty() {
            return Err(TwapError::Decode("empty return data".to_string()));
        }
        if data.len() % 32 != 0 {
            return Err(TwapError::Decode(format!(
                "return data length {} is not a multiple of 32",
                data.len()
            )));
        }
        Ok(Self { data })
    }

    fn word(&self, index: usize) -> Result<&[u8]> {
        let start = index * 32;
        self.data.get(start..start + 32).ok_or_else(|| {
            TwapError::Decode(format!(
                "word {index} out of range ({} words returned)",
                self.data.len() / 32
            ))
        })
    }

    /// Decode word `index` as an address. The 12 high bytes must be zero.
    pub fn address(&self, index: usize) -> Result<String> {
        let word = self.word(index)?;
        if word[..12].iter().any(|b| *b != 0) {
            return Err(TwapError::Decode(format!(
                "word {index} is not an address: non-zero padding"
            )));
        }
        Ok(format!("0x{}", hex::encode(&word[12..])))
    }

    /// Decode word `index` as a signed integer. The chain sign-extends small
    /// int types (int24, int56) to 256 bits, so any value this crate reads
    /// fits `i128` losslessly; anything wider is a loud error.
    pub fn int(&self, index: usize) -> Result<i128> {
        let word = self.word(index)?;
        let low: [u8; 16] = word[16..].try_into().expect("16-byte slice");
        let value = i128::from_be_bytes(low);
        let expected_ext: u8 = if value < 0 { 0xff } else { 0x00 };
        if word[..16].iter().any(|b| *b != expected_ext) {
            return Err(TwapError::Decode(format!(
                "word {index}: signed value does not fit 128 bits"
            )));
        }
        Ok(value)
    }

    /// Decode word `index` as an unsigned offset/length. Must fit `usize`.
    fn uint(&self, index: usize) -> Result<usize> {
        let word = self.word(index)?;
        if word[..24].iter().any(|b| *b != 0) {
            return Err(TwapError::Decode(format!(
                "word {index}: unsigned value does not fit 64 bits"
            )));
        }
        let tail: [u8; 8] = word[24..].try_into().expect("8-byte slice");
        Ok(u64::from_be_bytes(tail) as usize)
    }

    /// Decode a dynamic `string` whose offset lives at word `index`.
    pub fn string(&self, index: usize) -> Result<String> {
        let offset = self.uint(index)?;
        if offset % 32 != 0 {
            return Err(TwapError::Decode(format!("misaligned string offset {offset}")));
        }
        let len = self.uint(offset / 32)?;
        let start = offset + 32;
        let bytes = self.data.get(start..start + len).ok_or_else(|| {
            TwapError::Decode(format!("string of length {len} exceeds return data"))
        })?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| TwapError::Decode(format!("string is not UTF-8: {e}")))
    }

    /// Decode a dynamic signed-integer array whose offset lives at word
    /// `index`. Both oracle protocols return their cumulative-tick samples
    /// as the first dynamic array of the response.
    pub fn int_array(&self, index: usize) -> Result<Vec<i128>> {
        let offset = self.uint(index)?;
        if offset % 32 != 0 {
            return Err(TwapError::Decode(format!("misaligned array offset {offset}")));
        }
        let head = offset / 32;
        let len = self.uint(head)?;
        (0..len).map(|i| self.int(head + 1 + i)).collect()
    }
}
