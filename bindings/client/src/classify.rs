use serde_json::Value;

use crate::endpoint::Endpoint;

/// How a wallet API response is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Success,
    /// The service pushed back. Counted on its own and never as a failure.
    RateLimited,
    Failure,
}

/// The result of one wallet API call, as recorded into the run's metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    pub endpoint: Endpoint,
    /// The HTTP status, or `0` if no response was received.
    pub status_code: u16,
    pub latency_ms: f64,
    pub classification: Classification,
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool {
        self.classification == Classification::Success
    }
}

/// Classify a response to a call on `endpoint`.
///
/// Rate limiting is checked first: a 429, a body mentioning "rate limit", or an
/// `x-ratelimit-remaining` header of `0`. Otherwise the call succeeded if the status is accepted
/// for the endpoint and the body is a JSON object with one of the endpoint's expected fields set
/// to a non-null value. The parsed body is returned for successful calls.
pub fn classify(
    endpoint: Endpoint,
    status: u16,
    ratelimit_remaining: Option<&str>,
    body: &str,
) -> (Classification, Option<Value>) {
    if status == 429
        || body.contains("rate limit")
        || ratelimit_remaining.is_some_and(|remaining| remaining.trim() == "0")
    {
        return (Classification::RateLimited, None);
    }

    if !endpoint.accepted_statuses().contains(&status) {
        return (Classification::Failure, None);
    }

    let parsed = match serde_json::from_str::<Value>(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::debug!(
                "Unparseable {} response body: {}",
                endpoint.operation_id(),
                e
            );
            return (Classification::Failure, None);
        }
    };

    let has_expected_field = endpoint
        .expected_fields()
        .iter()
        .any(|field| parsed.get(field).is_some_and(|value| !value.is_null()));

    if has_expected_field {
        (Classification::Success, Some(parsed))
    } else {
        (Classification::Failure, None)
    }
}
