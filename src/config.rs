//! Configuration module for the bundler
//!
//! This module handles configuration loading from TOML files and `.env`,
//! and turns the raw sections into the read-only types the builders use.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;

use crate::relay::PollConfig;
use crate::tx_builder::constants::{
    DEFAULT_COMPUTE_UNIT_LIMIT, DEFAULT_COMPUTE_UNIT_PRICE, DEFAULT_TIP_ACCOUNTS,
    MAX_BUNDLE_TRANSACTIONS,
};
use crate::tx_builder::{BundleError, ComputeBudget, TipConfig};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chain RPC node
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Block-engine relay
    #[serde(default)]
    pub relay: RelayConfig,

    /// Tip amount and receivers
    #[serde(default)]
    pub tip: TipSettings,

    /// Compute budget of the deployer transaction
    #[serde(default)]
    pub compute: ComputeConfig,

    /// Metadata pinning service
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// One of `processed`, `confirmed`, `finalized`
    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,

    /// Max retries per read call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Block-engine base URL
    #[serde(default = "default_relay_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_relay_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Relay cap on transactions per bundle
    #[serde(default = "default_max_bundle_len")]
    pub max_bundle_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TipSettings {
    #[serde(default = "default_tip_lamports")]
    pub tip_lamports: u64,

    /// Base-58 tip receivers; one is picked at random per bundle
    #[serde(default = "default_tip_accounts")]
    pub tip_accounts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeConfig {
    #[serde(default = "default_unit_limit")]
    pub unit_limit: u32,

    #[serde(default = "default_unit_price")]
    pub unit_price_micro_lamports: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "default_upload_endpoint")]
    pub upload_endpoint: String,

    #[serde(default = "default_gateway")]
    pub gateway: String,

    /// Environment variable holding the upload JWT
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,
}

// Default value functions
fn default_rpc_url() -> String { "https://api.mainnet-beta.solana.com".to_string() }
fn default_commitment() -> String { "confirmed".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_max_retries() -> u32 { 3 }
fn default_relay_endpoint() -> String { "https://mainnet.block-engine.jito.wtf".to_string() }
fn default_relay_timeout() -> u64 { 10 }
fn default_max_poll_attempts() -> u32 { 30 }
fn default_poll_interval_ms() -> u64 { 2000 }
fn default_max_bundle_len() -> usize { MAX_BUNDLE_TRANSACTIONS }
fn default_tip_lamports() -> u64 { 10_000_000 }
fn default_tip_accounts() -> Vec<String> { DEFAULT_TIP_ACCOUNTS.iter().map(|a| a.to_string()).collect() }
fn default_unit_limit() -> u32 { DEFAULT_COMPUTE_UNIT_LIMIT }
fn default_unit_price() -> u64 { DEFAULT_COMPUTE_UNIT_PRICE }
fn default_upload_endpoint() -> String { "https://api.pinata.cloud".to_string() }
fn default_gateway() -> String { "https://gateway.pinata.cloud".to_string() }
fn default_api_key_env() -> String { "PINATA_JWT".to_string() }
fn default_metrics_port() -> u16 { 9090 }
fn default_true() -> bool { true }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            commitment: default_commitment(),
            timeout_secs: default_rpc_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_relay_endpoint(),
            request_timeout_secs: default_relay_timeout(),
            max_poll_attempts: default_max_poll_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            max_bundle_len: default_max_bundle_len(),
        }
    }
}

impl Default for TipSettings {
    fn default() -> Self {
        Self {
            tip_lamports: default_tip_lamports(),
            tip_accounts: default_tip_accounts(),
        }
    }
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            unit_limit: default_unit_limit(),
            unit_price_micro_lamports: default_unit_price(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            upload_endpoint: default_upload_endpoint(),
            gateway: default_gateway(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
            metrics_port: default_metrics_port(),
            json_logs: false,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `.env` first, then the TOML file
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_file(path)
    }

    /// Reject settings no bundle could be built or polled with
    pub fn validate(&self) -> Result<(), BundleError> {
        self.tip_config()?;
        self.commitment()?;
        if self.relay.poll_interval_ms == 0 {
            return Err(BundleError::Configuration(
                "relay.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.relay.max_poll_attempts == 0 {
            return Err(BundleError::Configuration(
                "relay.max_poll_attempts must be greater than zero".to_string(),
            ));
        }
        if !(1..=MAX_BUNDLE_TRANSACTIONS).contains(&self.relay.max_bundle_len) {
            return Err(BundleError::Configuration(format!(
                "relay.max_bundle_len must be within 1..={}, got {}",
                MAX_BUNDLE_TRANSACTIONS, self.relay.max_bundle_len
            )));
        }
        Ok(())
    }

    /// Parsed tip settings, shared read-only for the process lifetime
    pub fn tip_config(&self) -> Result<TipConfig, BundleError> {
        TipConfig::from_addresses(self.tip.tip_lamports, &self.tip.tip_accounts)
    }

    pub fn commitment(&self) -> Result<CommitmentConfig, BundleError> {
        match self.rpc.commitment.as_str() {
            "processed" => Ok(CommitmentConfig::processed()),
            "confirmed" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => Err(BundleError::Configuration(format!(
                "unknown rpc.commitment {:?}",
                other
            ))),
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay.request_timeout_secs)
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            max_attempts: self.relay.max_poll_attempts,
            interval: Duration::from_millis(self.relay.poll_interval_ms),
        }
    }

    pub fn compute_budget(&self) -> ComputeBudget {
        ComputeBudget {
            unit_limit: self.compute.unit_limit,
            unit_price: self.compute.unit_price_micro_lamports,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.tip_config().unwrap().tip_accounts().len(), 8);
        assert_eq!(config.relay.max_bundle_len, 5);
        assert_eq!(config.compute_budget(), ComputeBudget::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[rpc]
url = "http://127.0.0.1:8899"

[relay]
endpoint = "http://127.0.0.1:9000"
poll_interval_ms = 250

[tip]
tip_lamports = 5000
"#
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.rpc.url, "http://127.0.0.1:8899");
        assert_eq!(config.rpc.commitment, "confirmed");
        assert_eq!(config.poll_config().interval, Duration::from_millis(250));
        assert_eq!(config.tip.tip_lamports, 5000);
        assert_eq!(config.tip.tip_accounts.len(), 8);
        assert!(config.monitoring.enable_metrics);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = Config::default();
        config.tip.tip_accounts.clear();
        assert!(matches!(config.validate(), Err(BundleError::Configuration(_))));

        let mut config = Config::default();
        config.tip.tip_accounts = vec!["not-an-address".to_string()];
        assert!(matches!(
            config.validate(),
            Err(BundleError::InvalidAddress { .. })
        ));

        let mut config = Config::default();
        config.relay.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.relay.max_bundle_len = 6;
        assert!(config.validate().is_err());
        config.relay.max_bundle_len = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rpc.commitment = "recent".to_string();
        assert!(config.validate().is_err());
    }
}
