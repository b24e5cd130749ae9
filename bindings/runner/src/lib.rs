mod common;

mod context;
mod runner_context;

pub mod prelude {
    /// Common operations for wallet scenarios.
    ///
    /// This is a good place to start if you are getting started writing scenarios.
    pub use crate::common::*;

    pub use crate::context::WalletUserContext;
    pub use crate::runner_context::WalletRunnerContext;

    /// Re-export of the `load_tunnel_runner` prelude.
    ///
    /// This is for convenience so that you can depend on a single crate for the runner in your scenarios.
    pub use load_tunnel_runner::prelude::*;

    /// Re-export of the instrumented client for convenience.
    pub use wallet_client_instrumented::prelude::*;
}
