//! [`ChainRpc`] over a Solana JSON-RPC node

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solana_client::{client_error::ClientError, nonblocking::rpc_client::RpcClient};
use solana_sdk::{
    address_lookup_table::state::AddressLookupTable, commitment_config::CommitmentConfig,
    hash::Hash, message::AddressLookupTableAccount, pubkey::Pubkey,
};
use spl_token::solana_program::program_pack::Pack;
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};
use tracing::{debug, instrument};

use super::ChainRpc;
use crate::metrics::metrics;
use crate::tx_builder::{pda, BundleError};

/// Nonblocking RPC client with jittered exponential retry on every call
#[derive(Clone)]
pub struct SolanaChainRpc {
    client: Arc<RpcClient>,
    url: String,
    commitment: CommitmentConfig,
    retry_attempts: usize,
}

impl std::fmt::Debug for SolanaChainRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaChainRpc")
            .field("url", &self.url)
            .field("commitment", &self.commitment.commitment)
            .field("retry_attempts", &self.retry_attempts)
            .finish()
    }
}

impl SolanaChainRpc {
    pub fn new(
        url: impl Into<String>,
        commitment: CommitmentConfig,
        timeout: Duration,
        retry_attempts: usize,
    ) -> Self {
        let url = url.into();
        Self {
            client: Arc::new(RpcClient::new_with_timeout_and_commitment(
                url.clone(),
                timeout,
                commitment,
            )),
            url,
            commitment,
            retry_attempts,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(50)
            .max_delay(Duration::from_millis(1000))
            .map(jitter)
            .take(self.retry_attempts)
    }

    fn map_err(&self, call: &'static str, err: ClientError) -> BundleError {
        metrics().rpc_errors_total.inc();
        debug!(endpoint = %self.url, call, error = %err, "RPC call failed");
        BundleError::rpc(format!("{} failed: {}", call, err))
    }
}

#[async_trait]
impl ChainRpc for SolanaChainRpc {
    #[instrument(skip(self))]
    async fn latest_blockhash(&self) -> Result<Hash, BundleError> {
        Retry::spawn(self.retry_strategy(), || {
            self.client
                .get_latest_blockhash_with_commitment(self.commitment)
        })
        .await
        .map(|(hash, _last_valid_height)| hash)
        .map_err(|e| self.map_err("getLatestBlockhash", e))
    }

    async fn balance(&self, owner: &Pubkey) -> Result<u64, BundleError> {
        Retry::spawn(self.retry_strategy(), || {
            self.client.get_balance_with_commitment(owner, self.commitment)
        })
        .await
        .map(|response| response.value)
        .map_err(|e| self.map_err("getBalance", e))
    }

    async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64, BundleError> {
        let ata = pda::associated_token(owner, mint);
        let account = Retry::spawn(self.retry_strategy(), || {
            self.client.get_account_with_commitment(&ata, self.commitment)
        })
        .await
        .map_err(|e| self.map_err("getAccountInfo", e))?
        .value;

        let Some(account) = account else {
            debug!(owner = %owner, mint = %mint, "No associated token account");
            return Ok(0);
        };
        spl_token::state::Account::unpack(&account.data)
            .map(|state| state.amount)
            .map_err(|e| BundleError::rpc(format!("invalid token account {}: {}", ata, e)))
    }

    async fn lookup_table(&self, table: &Pubkey) -> Result<AddressLookupTableAccount, BundleError> {
        let account = Retry::spawn(self.retry_strategy(), || self.client.get_account(table))
            .await
            .map_err(|e| self.map_err("getAccountInfo", e))?;
        let state = AddressLookupTable::deserialize(&account.data)
            .map_err(|e| BundleError::rpc(format!("invalid lookup table {}: {}", table, e)))?;
        Ok(AddressLookupTableAccount {
            key: *table,
            addresses: state.addresses.to_vec(),
        })
    }

    async fn recent_slot(&self) -> Result<u64, BundleError> {
        Retry::spawn(self.retry_strategy(), || {
            self.client.get_slot_with_commitment(self.commitment)
        })
        .await
        .map_err(|e| self.map_err("getSlot", e))
    }
}
