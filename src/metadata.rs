//! Token metadata pinning
//!
//! The bundle builder only needs a metadata URI for the create instruction.
//! [`PinataUploader`] produces one by pinning the image, then a JSON
//! document pointing at it.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::tx_builder::BundleError;

const PIN_FILE_PATH: &str = "/pinning/pinFileToIPFS";

/// Off-chain token metadata document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub description: String,
    /// Filled in by the uploader once the image is pinned
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

/// Image bytes with the name they are pinned under
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Stores metadata and returns the URI the token points at
#[async_trait]
pub trait MetadataUploader: Send + Sync + std::fmt::Debug {
    async fn upload(
        &self,
        image: Option<ImageFile>,
        metadata: &TokenMetadata,
    ) -> Result<String, BundleError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PinResponse {
    ipfs_hash: String,
}

/// Pinata IPFS pinning client
pub struct PinataUploader {
    client: reqwest::Client,
    api_base: String,
    gateway: String,
    jwt: Option<String>,
}

impl std::fmt::Debug for PinataUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinataUploader")
            .field("api_base", &self.api_base)
            .field("gateway", &self.gateway)
            .field("authenticated", &self.jwt.is_some())
            .finish()
    }
}

impl PinataUploader {
    pub fn new(api_base: &str, gateway: &str, jwt: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            gateway: gateway.trim_end_matches('/').to_string(),
            jwt,
        }
    }

    /// Gateway URL of a pinned object
    pub fn gateway_url(&self, hash: &str) -> String {
        format!("{}/ipfs/{}", self.gateway, hash)
    }

    async fn pin_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, BundleError> {
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.to_string()));

        let mut request = self
            .client
            .post(format!("{}{}", self.api_base, PIN_FILE_PATH))
            .multipart(form);
        if let Some(jwt) = &self.jwt {
            request = request.bearer_auth(jwt);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BundleError::Upload(format!("failed to upload {}: {}", file_name, e)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BundleError::Upload(format!(
                "pinning {} returned HTTP {}: {}",
                file_name, status, body
            )));
        }

        let pinned: PinResponse = response.json().await.map_err(|e| {
            BundleError::Upload(format!("unreadable pin response for {}: {}", file_name, e))
        })?;
        debug!(file_name, hash = %pinned.ipfs_hash, "File pinned");
        Ok(pinned.ipfs_hash)
    }
}

#[async_trait]
impl MetadataUploader for PinataUploader {
    async fn upload(
        &self,
        image: Option<ImageFile>,
        metadata: &TokenMetadata,
    ) -> Result<String, BundleError> {
        let mut document = metadata.clone();
        if let Some(image) = image {
            let hash = self.pin_file(&image.file_name, image.bytes).await?;
            document.image = self.gateway_url(&hash);
        }

        let json = serde_json::to_vec(&document)
            .map_err(|e| BundleError::internal(format!("failed to encode metadata: {}", e)))?;
        let hash = self.pin_file("metadata.json", json).await?;
        let uri = self.gateway_url(&hash);

        info!(symbol = %metadata.symbol, uri = %uri, "Metadata uploaded");
        Ok(uri)
    }
}
