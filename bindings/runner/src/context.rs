use load_tunnel_runner::prelude::UserValuesConstraint;
use wallet_client_instrumented::prelude::WalletHandle;

#[derive(Default, Debug)]
pub struct WalletUserContext {
    /// The wallet created by the current iteration, if creation succeeded.
    pub wallet: Option<WalletHandle>,
    /// Wallets successfully created by this user over the run.
    pub wallets_created: u64,
}

impl UserValuesConstraint for WalletUserContext {}
