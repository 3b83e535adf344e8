//! Integration tests for the JSON-RPC relay client against a mock block engine

use std::time::Duration;

use bundler::relay::{poll_status, BundleRelay, BundleStatus, JsonRpcRelay, PollConfig};
use bundler::tx_builder::{Bundle, BundleBuilder, BundleError, Seller, TipConfig};
use bundler::Wallet;
use mockito::Matcher;
use serde_json::json;
use solana_sdk::{hash::Hash, pubkey::Pubkey};

const PATH: &str = "/api/v1/bundles";

fn sample_bundle() -> Bundle {
    let tips = TipConfig::with_default_accounts(1_000).unwrap();
    let wallet = Wallet::generate();
    BundleBuilder::new(&tips, Hash::new_unique())
        .build_sell_bundle(
            &[Seller {
                wallet: &wallet,
                token_balance: 1_000,
            }],
            &Pubkey::new_unique(),
            100,
            None,
        )
        .unwrap()
}

fn relay(server: &mockito::ServerGuard) -> JsonRpcRelay {
    JsonRpcRelay::new(&server.url(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_send_bundle_returns_id() {
    let mut server = mockito::Server::new_async().await;
    let bundle = sample_bundle();
    let encoded = bundle.encode_transactions().unwrap();

    let mock = server
        .mock("POST", PATH)
        .match_body(Matcher::PartialJson(json!({
            "jsonrpc": "2.0",
            "method": "sendBundle",
            "params": [encoded]
        })))
        .with_header("content-type", "application/json")
        .with_body(json!({"jsonrpc": "2.0", "id": 1, "result": "bundle-123"}).to_string())
        .create_async()
        .await;

    let id = relay(&server).submit(&bundle).await.unwrap();
    assert_eq!(id, "bundle-123");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_bundle_rejection_is_verbatim() {
    let mut server = mockito::Server::new_async().await;
    let message = "bundle contains an already processed transaction";
    server
        .mock("POST", PATH)
        .with_body(
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32602, "message": message}})
                .to_string(),
        )
        .create_async()
        .await;

    let err = relay(&server).submit(&sample_bundle()).await.unwrap_err();
    assert_eq!(err, BundleError::RelayRejected(message.to_string()));
}

#[tokio::test]
async fn test_http_failure_is_network_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .with_status(503)
        .with_body("upstream unavailable")
        .create_async()
        .await;

    let err = relay(&server).submit(&sample_bundle()).await.unwrap_err();
    assert!(matches!(err, BundleError::NetworkFailure(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_status_shapes() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .match_body(Matcher::PartialJson(json!({"params": [["wrapped"]]})))
        .with_body(
            json!({"jsonrpc": "2.0", "id": 1, "result": {
                "context": {"slot": 100},
                "value": [{"bundle_id": "wrapped", "confirmation_status": "finalized", "slot": 99, "err": {"Ok": null}}]
            }})
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("POST", PATH)
        .match_body(Matcher::PartialJson(json!({"params": [["plain"]]})))
        .with_body(
            json!({"jsonrpc": "2.0", "id": 2, "result": [
                {"bundle_id": "plain", "confirmation_status": "confirmed", "slot": 98, "err": "Bundle dropped: 0x1"}
            ]})
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("POST", PATH)
        .match_body(Matcher::PartialJson(json!({"params": [["unknown"]]})))
        .with_body(json!({"jsonrpc": "2.0", "id": 3, "result": {"context": {"slot": 1}, "value": [null]}}).to_string())
        .create_async()
        .await;

    let relay = relay(&server);
    assert_eq!(
        relay.fetch_status("wrapped").await.unwrap(),
        BundleStatus::Confirmed { slot: 99 }
    );
    assert_eq!(
        relay.fetch_status("plain").await.unwrap(),
        BundleStatus::Rejected {
            reason: "Bundle dropped: 0x1".to_string()
        }
    );
    assert_eq!(relay.fetch_status("unknown").await.unwrap(), BundleStatus::Pending);
}

#[tokio::test]
async fn test_poll_times_out_after_max_attempts() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_body(Matcher::PartialJson(json!({"method": "getBundleStatuses"})))
        .with_body(json!({"jsonrpc": "2.0", "id": 1, "result": {"context": {"slot": 1}, "value": []}}).to_string())
        .expect(3)
        .create_async()
        .await;

    let config = PollConfig {
        max_attempts: 3,
        interval: Duration::from_millis(10),
    };
    let err = poll_status(&relay(&server), "slow", &config).await.unwrap_err();
    assert_eq!(
        err,
        BundleError::Timeout {
            bundle_id: "slow".to_string(),
            attempts: 3
        }
    );
    mock.assert_async().await;
}
