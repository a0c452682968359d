//! On-chain TWAP derivation for binary futarchy proposals.
//!
//! Resolves a proposal's conditional outcome tokens straight from the chain,
//! locates the YES/NO conditional pools on the chain's exchange (Algebra on
//! Gnosis, Uniswap v3 on Ethereum), checks each pool's price orientation, and
//! derives a time-weighted average price from the pool's cumulative-tick
//! oracle over a caller-specified window. No indexer or subgraph involved —
//! every input is an `eth_call` against an RPC node.
//!
//! The two public operations live on [`TwapService`]: `calculate_twap`
//! compares the YES and NO TWAPs and picks a winner; `discover_pools` runs
//! the full six-pair pool scan for display. Transport layers (HTTP, CLI,
//! serverless) are external callers of this library and own their own
//! serialization and `tracing` subscriber setup.

pub mod abi;
pub mod config;
pub mod error;
pub mod pools;
pub mod proposal;
pub mod rpc;
pub mod service;
pub mod twap;
pub mod types;

pub use config::{chain_config, ChainConfig, Protocol};
pub use error::{Result, TwapError};
pub use service::{DiscoverOptions, TwapOptions, TwapService};
pub use types::{
    PoolDiscoveryResponse, PoolTwap, TwapComparison, TwapResponse, WindowStatus, Winner,
};
