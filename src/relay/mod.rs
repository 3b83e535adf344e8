//! Bundle relay submission and settlement polling
//!
//! [`BundleRelay`] is the narrow seam to the block-engine HTTP API;
//! [`poll_status`] drives any implementation through a bounded loop with a
//! fixed delay between attempts.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::tx_builder::{Bundle, BundleError};

pub mod jsonrpc;

pub use jsonrpc::JsonRpcRelay;

/// Settlement state of a submitted bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BundleStatus {
    Pending,
    Confirmed { slot: u64 },
    /// Relay-supplied diagnostic, kept verbatim
    Rejected { reason: String },
}

impl BundleStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for BundleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed { slot } => write!(f, "confirmed at slot {}", slot),
            Self::Rejected { reason } => write!(f, "rejected: {}", reason),
        }
    }
}

/// A bundle id and its last known status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleResult {
    pub bundle_id: String,
    #[serde(flatten)]
    pub status: BundleStatus,
}

impl BundleResult {
    pub fn pending(bundle_id: impl Into<String>) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            status: BundleStatus::Pending,
        }
    }
}

/// A block-engine relay
#[async_trait]
pub trait BundleRelay: Send + Sync + fmt::Debug {
    /// Submit every transaction of `bundle` as one atomic unit
    ///
    /// Not retried internally: resubmitting creates a competing bundle.
    async fn submit(&self, bundle: &Bundle) -> Result<String, BundleError>;

    /// One status lookup; a bundle the relay has not seen yet is `Pending`
    async fn fetch_status(&self, bundle_id: &str) -> Result<BundleStatus, BundleError>;
}

/// Bounds of the settlement poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_millis(2000),
        }
    }
}

/// Poll until the bundle settles or `max_attempts` lookups have been made
///
/// Stops on the first `Confirmed` or `Rejected`. Failed lookups count as
/// pending attempts. Exhausting the attempts yields `BundleError::Timeout`,
/// which is distinct from a rejection.
pub async fn poll_status<R>(
    relay: &R,
    bundle_id: &str,
    config: &PollConfig,
) -> Result<BundleResult, BundleError>
where
    R: BundleRelay + ?Sized,
{
    for attempt in 1..=config.max_attempts {
        match relay.fetch_status(bundle_id).await {
            Ok(BundleStatus::Pending) => {
                debug!(bundle_id, attempt, "Bundle still pending");
            }
            Ok(status) => {
                info!(bundle_id, attempt, status = %status, "Bundle settled");
                return Ok(BundleResult {
                    bundle_id: bundle_id.to_string(),
                    status,
                });
            }
            Err(e) => {
                warn!(bundle_id, attempt, error = %e, "Bundle status lookup failed");
            }
        }

        if attempt < config.max_attempts {
            tokio::time::sleep(config.interval).await;
        }
    }

    Err(BundleError::Timeout {
        bundle_id: bundle_id.to_string(),
        attempts: config.max_attempts,
    })
}
