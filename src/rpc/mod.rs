//! Chain state access
//!
//! Bundle builds need a handful of reads before anything is constructed:
//! one recent blockhash, lamport and token balances, lookup tables and a
//! recent slot. [`ChainRpc`] is the seam between the service and the
//! network so builds can run against [`StaticChainRpc`] in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use solana_sdk::{hash::Hash, message::AddressLookupTableAccount, pubkey::Pubkey};

use crate::tx_builder::BundleError;

pub mod solana;

pub use solana::SolanaChainRpc;

/// Read-only chain queries used while preparing a bundle
#[async_trait]
pub trait ChainRpc: Send + Sync + std::fmt::Debug {
    /// Blockhash shared by every transaction of one bundle
    async fn latest_blockhash(&self) -> Result<Hash, BundleError>;

    /// Lamport balance of `owner`
    async fn balance(&self, owner: &Pubkey) -> Result<u64, BundleError>;

    /// Raw token balance of `owner`'s associated account for `mint`
    ///
    /// A missing associated account reads as zero.
    async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64, BundleError>;

    async fn lookup_table(&self, table: &Pubkey) -> Result<AddressLookupTableAccount, BundleError>;

    /// Slot used to derive new lookup table addresses
    async fn recent_slot(&self) -> Result<u64, BundleError>;
}

/// Fixed in-memory chain state
///
/// Unknown accounts read as empty. Counts blockhash fetches so callers can
/// check a bundle was built against a single one.
#[derive(Debug, Default)]
pub struct StaticChainRpc {
    blockhash: Hash,
    slot: u64,
    balances: HashMap<Pubkey, u64>,
    token_balances: HashMap<(Pubkey, Pubkey), u64>,
    lookup_tables: HashMap<Pubkey, Vec<Pubkey>>,
    blockhash_fetches: AtomicUsize,
}

impl StaticChainRpc {
    pub fn new(blockhash: Hash) -> Self {
        Self {
            blockhash,
            ..Self::default()
        }
    }

    pub fn with_slot(mut self, slot: u64) -> Self {
        self.slot = slot;
        self
    }

    pub fn with_balance(mut self, owner: Pubkey, lamports: u64) -> Self {
        self.balances.insert(owner, lamports);
        self
    }

    pub fn with_token_balance(mut self, owner: Pubkey, mint: Pubkey, amount: u64) -> Self {
        self.token_balances.insert((owner, mint), amount);
        self
    }

    pub fn with_lookup_table(mut self, table: Pubkey, addresses: Vec<Pubkey>) -> Self {
        self.lookup_tables.insert(table, addresses);
        self
    }

    pub fn blockhash_fetches(&self) -> usize {
        self.blockhash_fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ChainRpc for StaticChainRpc {
    async fn latest_blockhash(&self) -> Result<Hash, BundleError> {
        self.blockhash_fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self.blockhash)
    }

    async fn balance(&self, owner: &Pubkey) -> Result<u64, BundleError> {
        Ok(self.balances.get(owner).copied().unwrap_or(0))
    }

    async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64, BundleError> {
        Ok(self
            .token_balances
            .get(&(*owner, *mint))
            .copied()
            .unwrap_or(0))
    }

    async fn lookup_table(&self, table: &Pubkey) -> Result<AddressLookupTableAccount, BundleError> {
        self.lookup_tables
            .get(table)
            .map(|addresses| AddressLookupTableAccount {
                key: *table,
                addresses: addresses.clone(),
            })
            .ok_or_else(|| BundleError::rpc(format!("lookup table {} not found", table)))
    }

    async fn recent_slot(&self) -> Result<u64, BundleError> {
        Ok(self.slot)
    }
}
