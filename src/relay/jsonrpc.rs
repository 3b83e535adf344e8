//! JSON-RPC client for the block-engine bundles API
//!
//! `POST {endpoint}/api/v1/bundles` carries both `sendBundle` and
//! `getBundleStatuses`. Status results arrive either as a bare array or
//! wrapped in `{context, value}`; both are accepted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::{BundleRelay, BundleStatus};
use crate::metrics::{metrics, Timer};
use crate::tx_builder::{Bundle, BundleError};

const BUNDLES_PATH: &str = "/api/v1/bundles";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    #[serde(default)]
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl JsonRpcError {
    /// Relay diagnostic exactly as sent, with any detail payload appended
    fn into_reason(self) -> String {
        match self.data {
            Some(Value::String(detail)) => format!("{} {}", self.message, detail),
            Some(Value::Null) | None => self.message,
            Some(other) => format!("{} {}", self.message, other),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StatusResult {
    Plain(Vec<Option<BundleStatusEntry>>),
    Wrapped {
        #[allow(dead_code)]
        context: Value,
        value: Vec<Option<BundleStatusEntry>>,
    },
}

impl StatusResult {
    fn into_entries(self) -> Vec<BundleStatusEntry> {
        match self {
            Self::Plain(value) | Self::Wrapped { value, .. } => value.into_iter().flatten().collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BundleStatusEntry {
    bundle_id: String,
    #[serde(default)]
    confirmation_status: Option<String>,
    #[serde(default)]
    slot: Option<u64>,
    #[serde(default)]
    err: Option<Value>,
}

impl BundleStatusEntry {
    fn status(self) -> BundleStatus {
        if let Some(reason) = self.err.and_then(rejection_reason) {
            return BundleStatus::Rejected { reason };
        }
        match self.confirmation_status.as_deref() {
            Some("confirmed") | Some("finalized") => BundleStatus::Confirmed {
                slot: self.slot.unwrap_or_default(),
            },
            other => {
                debug!(bundle_id = %self.bundle_id, status = ?other, "Bundle not yet confirmed");
                BundleStatus::Pending
            }
        }
    }
}

/// `{"Ok": null}` and `null` mean success; anything else is the relay's
/// diagnostic, kept as sent
fn rejection_reason(err: Value) -> Option<String> {
    match err {
        Value::Null => None,
        Value::Object(ref map) if map.len() == 1 && map.get("Ok") == Some(&Value::Null) => None,
        Value::String(reason) => Some(reason),
        other => Some(other.to_string()),
    }
}

/// Relay client over reqwest
#[derive(Debug)]
pub struct JsonRpcRelay {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcRelay {
    /// `endpoint` is the block-engine base URL, without the bundles path
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self, BundleError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BundleError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: &str) -> Self {
        Self {
            client,
            url: format!("{}{}", endpoint.trim_end_matches('/'), BUNDLES_PATH),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<P, T>(&self, method: &str, params: P) -> Result<JsonRpcResponse<T>, BundleError>
    where
        P: Serialize + Send,
        T: for<'de> Deserialize<'de>,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self.client.post(&self.url).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<JsonRpcResponse<T>>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(BundleError::network(format!(
                "{} returned HTTP {}: {}",
                method, status, body
            ))),
            Err(e) => Err(BundleError::network(format!(
                "{} returned an unreadable response: {}",
                method, e
            ))),
        }
    }
}

#[async_trait]
impl BundleRelay for JsonRpcRelay {
    #[instrument(skip(self, bundle), fields(tx_count = bundle.len()))]
    async fn submit(&self, bundle: &Bundle) -> Result<String, BundleError> {
        let encoded = bundle.encode_transactions()?;
        let timer = Timer::new();
        let response = self
            .call::<_, String>("sendBundle", [encoded])
            .await;
        timer.observe_duration(&metrics().relay_latency);
        let response = response?;

        if let Some(error) = response.error {
            warn!(code = error.code, message = %error.message, "Relay rejected bundle");
            return Err(BundleError::RelayRejected(error.into_reason()));
        }
        let bundle_id = response
            .result
            .ok_or_else(|| BundleError::network("sendBundle response carried no bundle id"))?;

        info!(bundle_id = %bundle_id, "Bundle submitted");
        Ok(bundle_id)
    }

    async fn fetch_status(&self, bundle_id: &str) -> Result<BundleStatus, BundleError> {
        let response = self
            .call::<_, StatusResult>("getBundleStatuses", [[bundle_id]])
            .await?;

        if let Some(error) = response.error {
            return Err(BundleError::network(format!(
                "getBundleStatuses failed: {}",
                error.into_reason()
            )));
        }

        let status = response
            .result
            .map(StatusResult::into_entries)
            .unwrap_or_default()
            .into_iter()
            .find(|entry| entry.bundle_id == bundle_id)
            .map(BundleStatusEntry::status)
            .unwrap_or(BundleStatus::Pending);
        Ok(status)
    }
}
