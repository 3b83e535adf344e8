//! Error types for bundle construction and submission
//!
//! One taxonomy covers the whole pipeline, from decoding signer secrets to
//! polling the relay. Errors split into two families:
//! - Construction errors abort a bundle before anything leaves the process
//! - Submission errors describe what the relay (or the network) said
//!
//! `is_retryable()` and `category()` feed retry decisions, metrics labels and
//! structured logs.

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Error type for every bundle builder and relay operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BundleError {
    /// A secret or address string could not be decoded
    ///
    /// Never carries the offending secret itself.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// An address has the wrong length or is not valid base-58
    #[error("Invalid address '{input}': {reason}")]
    InvalidAddress {
        /// The rejected input
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// Amount math overflowed u64
    #[error("Arithmetic overflow while computing {0}")]
    ArithmeticOverflow(&'static str),

    /// A transaction references a signer whose keypair was not supplied
    #[error("Missing signer: {0}")]
    MissingSigner(Pubkey),

    /// The compiled transaction exceeds the packet size or account lock limit
    #[error("Transaction too large: {reason}")]
    TransactionTooLarge {
        /// Which limit was exceeded and by how much
        reason: String,
    },

    /// A wallet cannot cover its own instructions
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// The relay refused the bundle
    ///
    /// The relay's diagnostic text is kept verbatim.
    #[error("Relay rejected bundle: {0}")]
    RelayRejected(String),

    /// Transport failure talking to the relay
    ///
    /// Safe to retry the whole submit at the caller's discretion.
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// Status polling exhausted its attempts without a terminal status
    ///
    /// The bundle may still land; resubmitting is not safe.
    #[error("Timed out waiting for bundle {bundle_id} after {attempts} attempts")]
    Timeout {
        /// The bundle being polled
        bundle_id: String,
        /// Number of poll attempts made
        attempts: u32,
    },

    /// More transactions than the relay accepts in one bundle
    #[error("Bundle too large: {len} transactions (max {max})")]
    BundleTooLarge {
        /// Number of transactions built
        len: usize,
        /// Relay cap
        max: usize,
    },

    /// Chain RPC read failure (blockhash, balances, lookup tables)
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Configuration or parameter validation error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Metadata upload failure
    #[error("Upload error: {0}")]
    Upload(String),

    /// Internal invariant violation or unexpected state
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BundleError {
    /// Check if this error is potentially retryable
    ///
    /// Returns `true` if repeating the whole operation might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            // Transient failures
            Self::NetworkFailure(_) => true,
            Self::Rpc(_) => true,
            Self::Upload(_) => true,

            // The bundle may still land
            Self::Timeout { .. } => false,

            // Construction failures and terminal relay verdicts
            Self::InvalidEncoding(_) => false,
            Self::InvalidAddress { .. } => false,
            Self::ArithmeticOverflow(_) => false,
            Self::MissingSigner(_) => false,
            Self::TransactionTooLarge { .. } => false,
            Self::InsufficientBalance(_) => false,
            Self::RelayRejected(_) => false,
            Self::BundleTooLarge { .. } => false,
            Self::Configuration(_) => false,
            Self::Internal(_) => false,
        }
    }

    /// Whether the error was raised before anything was submitted
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidEncoding(_)
                | Self::InvalidAddress { .. }
                | Self::ArithmeticOverflow(_)
                | Self::MissingSigner(_)
                | Self::TransactionTooLarge { .. }
                | Self::BundleTooLarge { .. }
                | Self::InsufficientBalance(_)
        )
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidEncoding(_) => "encoding",
            Self::InvalidAddress { .. } => "address",
            Self::ArithmeticOverflow(_) => "arithmetic",
            Self::MissingSigner(_) => "signing",
            Self::TransactionTooLarge { .. } => "size",
            Self::InsufficientBalance(_) => "balance",
            Self::RelayRejected(_) => "relay_rejected",
            Self::NetworkFailure(_) => "network",
            Self::Timeout { .. } => "timeout",
            Self::BundleTooLarge { .. } => "size",
            Self::Rpc(_) => "rpc",
            Self::Configuration(_) => "config",
            Self::Upload(_) => "upload",
            Self::Internal(_) => "internal",
        }
    }
}

// Convenience constructors for common error scenarios
impl BundleError {
    /// Create an invalid address error
    pub fn invalid_address(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a transaction size error
    pub fn too_large(reason: impl Into<String>) -> Self {
        Self::TransactionTooLarge {
            reason: reason.into(),
        }
    }

    /// Create an RPC error
    pub fn rpc(reason: impl std::fmt::Display) -> Self {
        Self::Rpc(reason.to_string())
    }

    /// Create a network failure error
    pub fn network(reason: impl std::fmt::Display) -> Self {
        Self::NetworkFailure(reason.to_string())
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }
}

impl From<reqwest::Error> for BundleError {
    fn from(err: reqwest::Error) -> Self {
        Self::NetworkFailure(err.to_string())
    }
}
