use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use url::Url;

use crate::endpoint::Endpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    #[display("deposit")]
    Deposit,
    #[display("withdraw")]
    Withdraw,
}

/// A wallet API request, ready to be sent relative to a base URL.
///
/// Calls on an existing wallet carry its id in the `x-wallet-id` header. POST calls also carry it
/// as `walletId` in the JSON body. GET calls have no body.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletRequest {
    endpoint: Endpoint,
    method: Method,
    path: Vec<String>,
    query: Vec<(String, String)>,
    wallet_id: Option<String>,
    body: Option<Value>,
}

impl WalletRequest {
    pub fn create_wallet(public_key: &str, coins: u64) -> Self {
        Self {
            endpoint: Endpoint::CreateWallet,
            method: Method::POST,
            path: segments(&["wallet", "create"]),
            query: Vec::new(),
            wallet_id: None,
            body: Some(json!({
                "publicKey": public_key,
                "coins": coins,
            })),
        }
    }

    pub fn balance(wallet_id: &str) -> Self {
        Self {
            endpoint: Endpoint::Balance,
            method: Method::GET,
            path: segments(&["wallet", wallet_id, "balance"]),
            query: Vec::new(),
            wallet_id: Some(wallet_id.to_string()),
            body: None,
        }
    }

    pub fn transactions(wallet_id: &str, limit: u32) -> Self {
        Self {
            endpoint: Endpoint::Transactions,
            method: Method::GET,
            path: segments(&["wallet", wallet_id, "transactions"]),
            query: vec![("limit".to_string(), limit.to_string())],
            wallet_id: Some(wallet_id.to_string()),
            body: None,
        }
    }

    pub fn create_transaction(wallet_id: &str, amount: u64, kind: TransactionKind) -> Self {
        Self {
            endpoint: Endpoint::CreateTransaction,
            method: Method::POST,
            path: segments(&["wallet", wallet_id, "transaction"]),
            query: Vec::new(),
            wallet_id: Some(wallet_id.to_string()),
            body: Some(json!({
                "walletId": wallet_id,
                "amount": amount,
                "type": kind,
                "description": format!("Load test {kind} of {amount}"),
            })),
        }
    }

    pub fn add_coins(wallet_id: &str, amount: u64) -> Self {
        Self::coins(Endpoint::AddCoins, "add-coins", wallet_id, amount)
    }

    pub fn update_coins(wallet_id: &str, amount: u64) -> Self {
        Self::coins(Endpoint::UpdateCoins, "update-coins", wallet_id, amount)
    }

    fn coins(endpoint: Endpoint, action: &str, wallet_id: &str, amount: u64) -> Self {
        Self {
            endpoint,
            method: Method::POST,
            path: segments(&["wallet", action]),
            query: Vec::new(),
            wallet_id: Some(wallet_id.to_string()),
            body: Some(json!({
                "walletId": wallet_id,
                "amount": amount,
            })),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn wallet_id(&self) -> Option<&str> {
        self.wallet_id.as_deref()
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Resolve the request path against `base`, keeping any path the base already has, such as
    /// `/api`. Path segments are percent-encoded.
    pub fn url(&self, base: &Url) -> anyhow::Result<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Base URL cannot have a path: {base}"))?
            .pop_if_empty()
            .extend(&self.path);

        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }

        Ok(url)
    }
}

fn segments(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base() -> Url {
        Url::parse("http://localhost:3500/api").unwrap()
    }

    #[test]
    fn url_keeps_base_path() {
        let url = WalletRequest::balance("w-1").url(&base()).unwrap();
        assert_eq!("http://localhost:3500/api/wallet/w-1/balance", url.as_str());

        let with_slash = Url::parse("http://localhost:3500/api/").unwrap();
        let url = WalletRequest::create_wallet("key", 10)
            .url(&with_slash)
            .unwrap();
        assert_eq!("http://localhost:3500/api/wallet/create", url.as_str());
    }

    #[test]
    fn transactions_carry_limit_query() {
        let url = WalletRequest::transactions("w-1", 5).url(&base()).unwrap();
        assert_eq!(
            "http://localhost:3500/api/wallet/w-1/transactions?limit=5",
            url.as_str()
        );
    }

    #[test]
    fn wallet_id_is_encoded_as_one_segment() {
        let url = WalletRequest::balance("a/b c").url(&base()).unwrap();
        assert_eq!("http://localhost:3500/api/wallet/a%2Fb%20c/balance", url.as_str());
    }

    #[test]
    fn post_bodies_carry_wallet_id() {
        let request = WalletRequest::add_coins("w-1", 150);
        assert_eq!(Some("w-1"), request.wallet_id());
        assert_eq!(
            Some(&json!({"walletId": "w-1", "amount": 150})),
            request.body()
        );

        let request = WalletRequest::create_transaction("w-1", 42, TransactionKind::Withdraw);
        assert_eq!(
            Some(&json!({
                "walletId": "w-1",
                "amount": 42,
                "type": "withdraw",
                "description": "Load test withdraw of 42",
            })),
            request.body()
        );
    }

    #[test]
    fn get_requests_have_no_body() {
        let request = WalletRequest::transactions("w-1", 10);
        assert_eq!(&Method::GET, request.method());
        assert_eq!(None, request.body());
        assert_eq!(Some("w-1"), request.wallet_id());
    }

    #[test]
    fn create_wallet_has_no_wallet_id() {
        let request = WalletRequest::create_wallet("load-test-1", 300);
        assert_eq!(None, request.wallet_id());
        assert_eq!(
            Some(&json!({"publicKey": "load-test-1", "coins": 300})),
            request.body()
        );
    }
}
