use std::sync::Arc;
use std::time::Duration;

use load_tunnel_instruments::{ReportConfig, Reporter};
use pretty_assertions::assert_eq;
use serde_json::json;
use wallet_client_instrumented::prelude::{
    Classification, Endpoint, TransactionKind, WalletClient, FAILED_REQUESTS_METRIC,
    HTTP_REQ_DURATION_METRIC, RATE_LIMITS_METRIC,
};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, timeout: Duration) -> (WalletClient, Arc<Reporter>) {
    let reporter = Arc::new(ReportConfig::default().init());
    let client = WalletClient::new(
        &format!("{}/api", server.uri()),
        timeout,
        Some("test-token"),
        reporter.clone(),
    )
    .unwrap();
    (client, reporter)
}

#[tokio::test]
async fn created_wallet_id_is_sent_on_every_following_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/wallet/create"))
        .and(header("content-type", "application/json"))
        .and(header("x-internal-testing", "true"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({"publicKey": "load-test-1", "coins": 250})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "w-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/wallet/w-1/balance"))
        .and(header("x-wallet-id", "w-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"balance": 250})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/wallet/w-1/transactions"))
        .and(query_param("limit", "5"))
        .and(header("x-wallet-id", "w-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"transactions": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/wallet/add-coins"))
        .and(header("x-wallet-id", "w-1"))
        .and(body_partial_json(json!({"walletId": "w-1", "amount": 100})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"balance": 350})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/wallet/update-coins"))
        .and(header("x-wallet-id", "w-1"))
        .and(body_partial_json(json!({"walletId": "w-1", "amount": 500})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/wallet/w-1/transaction"))
        .and(header("x-wallet-id", "w-1"))
        .and(body_partial_json(
            json!({"walletId": "w-1", "amount": 20, "type": "deposit"}),
        ))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"transactionId": "t-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, reporter) = client(&server, Duration::from_secs(5));

    let (outcome, wallet) = client.create_wallet("load-test-1", 250).await;
    assert_eq!(Classification::Success, outcome.classification);
    assert_eq!(201, outcome.status_code);
    let wallet = wallet.unwrap();
    assert_eq!("w-1", wallet.id);

    let outcomes = vec![
        client.get_balance(&wallet.id).await,
        client.list_transactions(&wallet.id, 5).await,
        client.add_coins(&wallet.id, 100).await,
        client.update_coins(&wallet.id, 500).await,
        client
            .create_transaction(&wallet.id, 20, TransactionKind::Deposit)
            .await,
    ];
    assert!(outcomes.iter().all(|o| o.is_success()), "{outcomes:?}");

    let summary = reporter.metrics().summarize();
    assert_eq!(6, summary.trends[HTTP_REQ_DURATION_METRIC].count);
    assert_eq!(1, summary.trends["wallet_creation_latency"].count);
    assert_eq!(1, summary.trends["wallet_transaction_latency"].count);
    assert_eq!(0, summary.rates[FAILED_REQUESTS_METRIC].matches);
    assert_eq!(6, summary.rates[FAILED_REQUESTS_METRIC].total);
}

#[tokio::test]
async fn too_many_requests_is_rate_limited_not_failed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/wallet/create"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let (client, reporter) = client(&server, Duration::from_secs(5));

    let (outcome, wallet) = client.create_wallet("load-test-2", 10).await;

    assert_eq!(Classification::RateLimited, outcome.classification);
    assert_eq!(429, outcome.status_code);
    assert_eq!(None, wallet);

    let summary = reporter.metrics().summarize();
    assert_eq!(1.0, summary.rates[RATE_LIMITS_METRIC].rate);
    assert_eq!(0.0, summary.rates[FAILED_REQUESTS_METRIC].rate);
}

#[tokio::test]
async fn ratelimit_remaining_header_is_rate_limited() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/wallet/1001/balance"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining", "0")
                .set_body_json(json!({"balance": 10})),
        )
        .mount(&server)
        .await;

    let (client, _) = client(&server, Duration::from_secs(5));

    let outcome = client.get_balance("1001").await;
    assert_eq!(Classification::RateLimited, outcome.classification);
}

#[tokio::test]
async fn success_status_without_expected_field_is_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/wallet/1001/transactions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;

    let (client, reporter) = client(&server, Duration::from_secs(5));

    let outcome = client.list_transactions("1001", 10).await;

    assert_eq!(Classification::Failure, outcome.classification);
    assert_eq!(Endpoint::Transactions, outcome.endpoint);
    assert_eq!(
        1.0,
        reporter.metrics().summarize().rates[FAILED_REQUESTS_METRIC].rate
    );
}

#[tokio::test]
async fn timeout_is_failure_with_status_zero() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/wallet/create"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"walletId": "w-late"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let (client, reporter) = client(&server, Duration::from_millis(100));

    let (outcome, wallet) = client.create_wallet("load-test-3", 10).await;

    assert_eq!(Classification::Failure, outcome.classification);
    assert_eq!(0, outcome.status_code);
    assert_eq!(None, wallet);
    assert!(outcome.latency_ms >= 100.0);
    assert_eq!(
        1,
        reporter.metrics().summarize().trends["wallet_creation_latency"].count
    );
}

#[tokio::test]
async fn created_wallet_id_with_control_characters_is_not_used() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/wallet/create"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"walletId": "w-1\r\n"})))
        .mount(&server)
        .await;

    let (client, _) = client(&server, Duration::from_secs(5));

    let (outcome, wallet) = client.create_wallet("load-test-4", 10).await;

    assert_eq!(Classification::Success, outcome.classification);
    assert_eq!(None, wallet);
}
