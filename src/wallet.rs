//! Signer key material
//!
//! Wallets are decoded from base-58 encoded 64-byte secrets (32-byte seed
//! followed by the 32-byte public key). Decoding is pure: no I/O, and the
//! secret never appears in logs or `Debug` output.

use std::fmt;

use ed25519_dalek::VerifyingKey;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    signer::keypair::keypair_from_seed,
};
use zeroize::Zeroizing;

use crate::tx_builder::errors::BundleError;

/// Length of an encoded keypair secret
pub const SECRET_LEN: usize = 64;

/// A signer keypair decoded from an encoded secret
///
/// The keypair's secret half is wiped when the wallet is dropped, and every
/// intermediate buffer created while decoding or encoding is zeroized.
pub struct Wallet {
    keypair: Keypair,
}

impl Wallet {
    /// Decode a base-58 encoded 64-byte secret
    ///
    /// Rejects input whose decoded length is not exactly 64 bytes, whose
    /// embedded public key is not a valid curve point, or whose public key
    /// does not match the seed.
    pub fn decode(secret: &str) -> Result<Self, BundleError> {
        let bytes = Zeroizing::new(
            bs58::decode(secret.trim())
                .into_vec()
                .map_err(|_| BundleError::InvalidEncoding("secret is not valid base58".into()))?,
        );

        Self::from_secret_bytes(&bytes)
    }

    /// Build a wallet from raw secret bytes
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, BundleError> {
        if bytes.len() != SECRET_LEN {
            return Err(BundleError::InvalidEncoding(format!(
                "expected {} secret bytes, got {}",
                SECRET_LEN,
                bytes.len()
            )));
        }

        let mut public = [0u8; 32];
        public.copy_from_slice(&bytes[32..]);
        VerifyingKey::from_bytes(&public).map_err(|_| {
            BundleError::InvalidEncoding("embedded public key is not a valid curve point".into())
        })?;

        let keypair = keypair_from_seed(&bytes[..32])
            .map_err(|_| BundleError::InvalidEncoding("secret seed is malformed".into()))?;
        if keypair.pubkey().to_bytes() != public {
            return Err(BundleError::InvalidEncoding(
                "embedded public key does not match secret".into(),
            ));
        }

        Ok(Self { keypair })
    }

    /// Wrap an existing keypair (freshly generated mints)
    pub fn from_keypair(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Generate a fresh random wallet
    pub fn generate() -> Self {
        Self {
            keypair: Keypair::new(),
        }
    }

    /// Encode the secret back to base-58
    ///
    /// The returned string is zeroized on drop.
    pub fn encode(&self) -> Zeroizing<String> {
        let bytes = Zeroizing::new(self.keypair.to_bytes());
        Zeroizing::new(bs58::encode(bytes.as_ref()).into_string())
    }

    /// Public address derived from the secret
    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Keypair used for signing
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

impl PartialEq for Wallet {
    fn eq(&self, other: &Self) -> bool {
        let ours = Zeroizing::new(self.keypair.to_bytes());
        let theirs = Zeroizing::new(other.keypair.to_bytes());
        ours.as_ref() == theirs.as_ref()
    }
}

impl Eq for Wallet {}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}

/// Decode an ordered list of secrets, failing closed on the first bad entry
pub fn decode_all<S: AsRef<str>>(secrets: &[S]) -> Result<Vec<Wallet>, BundleError> {
    secrets
        .iter()
        .enumerate()
        .map(|(index, secret)| {
            Wallet::decode(secret.as_ref()).map_err(|err| match err {
                BundleError::InvalidEncoding(reason) => {
                    BundleError::InvalidEncoding(format!("wallet #{}: {}", index, reason))
                }
                other => other,
            })
        })
        .collect()
}
