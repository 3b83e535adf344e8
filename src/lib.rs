//! Bundler - atomic Solana bundle construction and relay submission
//!
//! Builds ordered sets of signed transactions (token launch + buys,
//! multi-wallet sells, pool creation + swap, SOL distribution, lookup
//! tables) carrying exactly one relay tip, submits them to a block-engine
//! relay and polls until they settle.

pub mod compat;
pub mod config;
pub mod endpoints;
pub mod metadata;
pub mod metrics;
pub mod observability;
pub mod relay;
pub mod rpc;
pub mod service;
pub mod structured_logging;
pub mod tx_builder;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use relay::{BundleRelay, BundleResult, BundleStatus, JsonRpcRelay, PollConfig};
pub use rpc::{ChainRpc, SolanaChainRpc, StaticChainRpc};
pub use service::{BundleRequest, BundleService};
pub use tx_builder::{Bundle, BundleBuilder, BundleError, TipConfig};
pub use wallet::Wallet;
pub use solana_sdk::{message::VersionedMessage, pubkey::Pubkey, signature::Signature};
