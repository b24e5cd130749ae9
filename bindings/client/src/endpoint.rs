/// Trend of the duration of every request, whatever the endpoint.
pub const HTTP_REQ_DURATION_METRIC: &str = "http_req_duration";
/// Rate of requests classified as failures.
pub const FAILED_REQUESTS_METRIC: &str = "wallet_failed_requests";
/// Rate of requests that were rate limited by the service.
pub const RATE_LIMITS_METRIC: &str = "wallet_rate_limits";
/// Rate of requests that passed every check.
pub const CHECKS_METRIC: &str = "wallet_checks";

/// The wallet API operations a virtual user can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    CreateWallet,
    Balance,
    Transactions,
    CreateTransaction,
    AddCoins,
    UpdateCoins,
}

impl Endpoint {
    /// The operation name. Latencies are recorded in the `<operation_id>_latency` trend.
    pub fn operation_id(self) -> &'static str {
        match self {
            Endpoint::CreateWallet => "wallet_creation",
            Endpoint::Balance => "wallet_balance",
            Endpoint::Transactions => "wallet_transactions",
            Endpoint::CreateTransaction => "wallet_transaction",
            Endpoint::AddCoins => "add_coins",
            Endpoint::UpdateCoins => "update_coins",
        }
    }

    /// Status codes that count as success, provided the body has an expected field.
    pub fn accepted_statuses(self) -> &'static [u16] {
        match self {
            Endpoint::Balance | Endpoint::Transactions => &[200],
            Endpoint::CreateWallet
            | Endpoint::CreateTransaction
            | Endpoint::AddCoins
            | Endpoint::UpdateCoins => &[200, 201],
        }
    }

    /// At least one of these fields must be present in a successful response body.
    pub fn expected_fields(self) -> &'static [&'static str] {
        match self {
            Endpoint::CreateWallet => &["walletId", "id"],
            Endpoint::Balance => &["balance"],
            Endpoint::Transactions => &["transactions"],
            Endpoint::CreateTransaction => &["transactionId", "id"],
            Endpoint::AddCoins | Endpoint::UpdateCoins => &["balance", "success"],
        }
    }
}
