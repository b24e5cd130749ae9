use anyhow::Context;
use load_tunnel_runner::prelude::UserValuesConstraint;
use wallet_client_instrumented::prelude::WalletClient;

use crate::common::DEFAULT_FALLBACK_WALLET_ID;

#[derive(Default, Debug)]
pub struct WalletRunnerContext {
    client: Option<WalletClient>,
    fallback_wallet_id: Option<String>,
}

impl UserValuesConstraint for WalletRunnerContext {}

impl WalletRunnerContext {
    pub(crate) fn configure(&mut self, client: WalletClient, fallback_wallet_id: String) {
        self.client = Some(client);
        self.fallback_wallet_id = Some(fallback_wallet_id);
    }

    /// The shared wallet API client.
    ///
    /// Fails if [crate::common::configure_wallet_client] was not used as the setup hook.
    pub fn client(&self) -> anyhow::Result<&WalletClient> {
        self.client
            .as_ref()
            .context("Wallet client is not configured, call configure_wallet_client in setup")
    }

    /// The wallet used by an iteration whose wallet creation failed.
    pub fn fallback_wallet_id(&self) -> &str {
        self.fallback_wallet_id
            .as_deref()
            .unwrap_or(DEFAULT_FALLBACK_WALLET_ID)
    }
}
