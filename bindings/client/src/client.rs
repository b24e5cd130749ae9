use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use load_tunnel_instruments::{OperationRecord, Reporter};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use url::Url;

use crate::classify::{classify, Classification, RequestOutcome};
use crate::endpoint::{
    Endpoint, CHECKS_METRIC, FAILED_REQUESTS_METRIC, HTTP_REQ_DURATION_METRIC, RATE_LIMITS_METRIC,
};
use crate::request::{TransactionKind, WalletRequest};

const WALLET_ID_HEADER: &str = "x-wallet-id";
const INTERNAL_TESTING_HEADER: &str = "x-internal-testing";
const RATELIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// A wallet created during an iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletHandle {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// A wallet API client that records the outcome of every call into the run's metrics.
///
/// Calls never return an error. Transport errors, such as timeouts or refused connections, are
/// recorded as failures with a status code of `0`, so that the caller can carry on with its
/// iteration.
#[derive(Clone)]
pub struct WalletClientInstrumented {
    inner: reqwest::Client,
    base_url: Url,
    reporter: Arc<Reporter>,
}

impl WalletClientInstrumented {
    /// Create a client for the wallet API at `base_url`, for example `http://localhost:3500/api`.
    ///
    /// Each request is abandoned after `timeout`. Requests are never retried.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        bearer_token: Option<&str>,
        reporter: Arc<Reporter>,
    ) -> anyhow::Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid base URL: {base_url}"))?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            anyhow::bail!("Base URL must be an http or https URL, got {base_url}");
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(INTERNAL_TESTING_HEADER, HeaderValue::from_static("true"));
        if let Some(token) = bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("Invalid API token")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let inner = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            base_url,
            reporter,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Create a wallet, returning a handle to it if the call succeeded and the response carried
    /// an id. Numeric ids are converted to strings.
    pub async fn create_wallet(
        &self,
        public_key: &str,
        coins: u64,
    ) -> (RequestOutcome, Option<WalletHandle>) {
        let (outcome, body) = self
            .send(WalletRequest::create_wallet(public_key, coins))
            .await;

        let handle = body.as_ref().and_then(wallet_id).map(|id| WalletHandle {
            id,
            created_at: Utc::now(),
        });
        if outcome.is_success() && handle.is_none() {
            log::warn!("Wallet created but the response carried no usable id");
        }

        (outcome, handle)
    }

    pub async fn get_balance(&self, wallet_id: &str) -> RequestOutcome {
        self.send(WalletRequest::balance(wallet_id)).await.0
    }

    pub async fn list_transactions(&self, wallet_id: &str, limit: u32) -> RequestOutcome {
        self.send(WalletRequest::transactions(wallet_id, limit))
            .await
            .0
    }

    pub async fn create_transaction(
        &self,
        wallet_id: &str,
        amount: u64,
        kind: TransactionKind,
    ) -> RequestOutcome {
        self.send(WalletRequest::create_transaction(wallet_id, amount, kind))
            .await
            .0
    }

    pub async fn add_coins(&self, wallet_id: &str, amount: u64) -> RequestOutcome {
        self.send(WalletRequest::add_coins(wallet_id, amount))
            .await
            .0
    }

    pub async fn update_coins(&self, wallet_id: &str, amount: u64) -> RequestOutcome {
        self.send(WalletRequest::update_coins(wallet_id, amount))
            .await
            .0
    }

    /// Send a request, classify the response and record the outcome.
    pub async fn send(&self, request: WalletRequest) -> (RequestOutcome, Option<Value>) {
        let endpoint = request.endpoint();
        let mut operation_record = OperationRecord::new(endpoint.operation_id());

        let (status_code, classification, body) = match self.execute(&request).await {
            Ok((status, ratelimit_remaining, text)) => {
                let (classification, body) =
                    classify(endpoint, status, ratelimit_remaining.as_deref(), &text);
                match classification {
                    Classification::Success => {}
                    Classification::RateLimited => log::debug!(
                        "Rate limited on {}: {} {}",
                        endpoint.operation_id(),
                        status,
                        text
                    ),
                    Classification::Failure => log::warn!(
                        "Failed {} call. Status: {}, Response: {}",
                        endpoint.operation_id(),
                        status,
                        text
                    ),
                }
                (status, classification, body)
            }
            Err(e) => {
                log::warn!("Failed {} call: {:?}", endpoint.operation_id(), e);
                (0, Classification::Failure, None)
            }
        };

        let latency_ms = self.reporter.add_operation(&mut operation_record);
        self.record(latency_ms, classification);

        (
            RequestOutcome {
                endpoint,
                status_code,
                latency_ms,
                classification,
            },
            body,
        )
    }

    async fn execute(
        &self,
        request: &WalletRequest,
    ) -> anyhow::Result<(u16, Option<String>, String)> {
        let url = request.url(&self.base_url)?;
        let mut builder = self.inner.request(request.method().clone(), url);
        if let Some(wallet_id) = request.wallet_id() {
            builder = builder.header(WALLET_ID_HEADER, wallet_id);
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let ratelimit_remaining = response
            .headers()
            .get(RATELIMIT_REMAINING_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let text = response.text().await?;

        Ok((status, ratelimit_remaining, text))
    }

    fn record(&self, latency_ms: f64, classification: Classification) {
        self.reporter
            .add_latency(HTTP_REQ_DURATION_METRIC, latency_ms);
        self.reporter.add_rate(
            FAILED_REQUESTS_METRIC,
            classification == Classification::Failure,
        );
        self.reporter.add_rate(
            RATE_LIMITS_METRIC,
            classification == Classification::RateLimited,
        );
        self.reporter
            .add_rate(CHECKS_METRIC, classification == Classification::Success);
    }
}

impl Debug for WalletClientInstrumented {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletClientInstrumented")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

/// The id of a created wallet, if it can be sent unchanged in the `x-wallet-id` header.
fn wallet_id(body: &Value) -> Option<String> {
    Endpoint::CreateWallet
        .expected_fields()
        .iter()
        .filter_map(|field| body.get(field))
        .find_map(|value| match value {
            Value::String(id) if is_header_safe(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        })
}

fn is_header_safe(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_graphic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wallet_id_prefers_wallet_id_field() {
        assert_eq!(
            Some("w-2".to_string()),
            wallet_id(&json!({"walletId": "w-2", "id": "w-1"}))
        );
    }

    #[test]
    fn numeric_wallet_id_becomes_string() {
        assert_eq!(Some("1042".to_string()), wallet_id(&json!({"id": 1042})));
    }

    #[test]
    fn unusable_wallet_id_is_ignored() {
        assert_eq!(None, wallet_id(&json!({"walletId": {"nested": true}})));
        assert_eq!(None, wallet_id(&json!({"id": ""})));
    }

    #[test]
    fn wallet_id_that_cannot_be_a_header_is_ignored() {
        assert_eq!(None, wallet_id(&json!({"walletId": "w-1\n"})));
        assert_eq!(None, wallet_id(&json!({"walletId": "w\u{7}-1"})));
        assert_eq!(None, wallet_id(&json!({"walletId": "wället"})));
        assert_eq!(None, wallet_id(&json!({"walletId": "w 1"})));
        assert_eq!(
            Some("w-3".to_string()),
            wallet_id(&json!({"walletId": "w\t1", "id": "w-3"}))
        );
    }

    #[test]
    fn reject_non_http_base_url() {
        let reporter = Arc::new(load_tunnel_instruments::ReportConfig::default().init());

        assert!(WalletClientInstrumented::new(
            "mailto:wallet@example.com",
            Duration::from_secs(1),
            None,
            reporter.clone()
        )
        .is_err());
        assert!(WalletClientInstrumented::new(
            "not a url",
            Duration::from_secs(1),
            None,
            reporter
        )
        .is_err());
    }
}
