mod classify;
mod client;
mod endpoint;
mod request;

pub mod prelude {
    pub use crate::classify::{classify, Classification, RequestOutcome};
    pub use crate::client::{WalletClientInstrumented as WalletClient, WalletHandle};
    pub use crate::endpoint::{
        Endpoint, CHECKS_METRIC, FAILED_REQUESTS_METRIC, HTTP_REQ_DURATION_METRIC,
        RATE_LIMITS_METRIC,
    };
    pub use crate::request::{TransactionKind, WalletRequest};
}
