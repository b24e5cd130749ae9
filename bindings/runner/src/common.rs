use std::env;

use anyhow::Context;
use load_tunnel_runner::prelude::{
    HookResult, LoadTunnelResult, RunnerContext, UserContext,
};
use rand::Rng;
use wallet_client_instrumented::prelude::{RequestOutcome, TransactionKind, WalletClient};

use crate::context::WalletUserContext;
use crate::runner_context::WalletRunnerContext;

/// Optional bearer token sent as the `authorization` header on every request.
pub const WALLET_API_TOKEN_ENV: &str = "WALLET_API_TOKEN";
/// The wallet to fall back to when an iteration could not create its own.
pub const WALLET_FALLBACK_ID_ENV: &str = "WALLET_FALLBACK_ID";
pub const DEFAULT_FALLBACK_WALLET_ID: &str = "1001";

pub type WalletContext = UserContext<WalletRunnerContext, WalletUserContext>;

/// Creates the wallet API client shared by all virtual users. Use this as the global setup hook,
/// or call it from yours.
///
/// The client targets the base URL given by `--base-url` or `BASE_URL` and uses the configured
/// request timeout. If `WALLET_API_TOKEN` is set it is sent as a bearer token.
pub fn configure_wallet_client(ctx: &mut RunnerContext<WalletRunnerContext>) -> HookResult {
    let base_url = ctx
        .base_url()
        .context("No base URL given, set --base-url or BASE_URL")?
        .to_string();
    let token = env::var(WALLET_API_TOKEN_ENV)
        .ok()
        .filter(|token| !token.is_empty());
    let fallback_wallet_id = env::var(WALLET_FALLBACK_ID_ENV)
        .ok()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| DEFAULT_FALLBACK_WALLET_ID.to_string());

    let client = WalletClient::new(
        &base_url,
        ctx.request_timeout(),
        token.as_deref(),
        ctx.reporter(),
    )?;

    log::info!(
        "Testing wallet API at {} with fallback wallet {}",
        client.base_url(),
        fallback_wallet_id
    );
    ctx.get_mut().configure(client, fallback_wallet_id);

    Ok(())
}

/// The wallet the current iteration should use: the one it created, or the fallback wallet.
pub fn current_wallet_id(ctx: &WalletContext) -> String {
    match &ctx.get().wallet {
        Some(wallet) => wallet.id.clone(),
        None => ctx.runner_context().get().fallback_wallet_id().to_string(),
    }
}

/// Create a new wallet with a unique public key and a random number of coins.
///
/// The new wallet replaces the previous iteration's wallet. If creation fails the iteration
/// continues with the fallback wallet.
pub fn create_wallet(ctx: &mut WalletContext) -> LoadTunnelResult<RequestOutcome> {
    let (public_key, coins) = {
        let mut rng = rand::thread_rng();
        (
            format!(
                "load-test-{}-{}-{}",
                ctx.user_id(),
                chrono::Utc::now().timestamp_millis(),
                rng.gen_range(0..100_000)
            ),
            rng.gen_range(0..1000),
        )
    };

    let client = ctx.runner_context().get().client()?.clone();
    let (outcome, wallet) = ctx
        .runner_context()
        .executor()
        .execute_in_place(async move { Ok(client.create_wallet(&public_key, coins).await) })?;

    match &wallet {
        Some(wallet) => {
            log::debug!("{} created wallet {}", ctx.user_id(), wallet.id);
            ctx.get_mut().wallets_created += 1;
        }
        None => log::debug!(
            "{} could not create a wallet, using {}",
            ctx.user_id(),
            ctx.runner_context().get().fallback_wallet_id()
        ),
    }
    ctx.get_mut().wallet = wallet;

    Ok(outcome)
}

pub fn get_balance(ctx: &mut WalletContext) -> LoadTunnelResult<RequestOutcome> {
    let client = ctx.runner_context().get().client()?;
    let wallet_id = current_wallet_id(ctx);

    ctx.runner_context()
        .executor()
        .execute_in_place(async { Ok(client.get_balance(&wallet_id).await) })
}

pub fn list_transactions(ctx: &mut WalletContext, limit: u32) -> LoadTunnelResult<RequestOutcome> {
    let client = ctx.runner_context().get().client()?;
    let wallet_id = current_wallet_id(ctx);

    ctx.runner_context()
        .executor()
        .execute_in_place(async { Ok(client.list_transactions(&wallet_id, limit).await) })
}

/// Add between 100 and 599 coins to the current wallet.
pub fn add_coins(ctx: &mut WalletContext) -> LoadTunnelResult<RequestOutcome> {
    let client = ctx.runner_context().get().client()?;
    let wallet_id = current_wallet_id(ctx);
    let amount = rand::thread_rng().gen_range(100..600);

    ctx.runner_context()
        .executor()
        .execute_in_place(async { Ok(client.add_coins(&wallet_id, amount).await) })
}

/// Set the current wallet's coins to between 200 and 1199.
pub fn update_coins(ctx: &mut WalletContext) -> LoadTunnelResult<RequestOutcome> {
    let client = ctx.runner_context().get().client()?;
    let wallet_id = current_wallet_id(ctx);
    let amount = rand::thread_rng().gen_range(200..1200);

    ctx.runner_context()
        .executor()
        .execute_in_place(async { Ok(client.update_coins(&wallet_id, amount).await) })
}

/// Record a transaction of between 10 and 1000 coins on the current wallet, a deposit 70% of the
/// time and a withdrawal otherwise.
pub fn create_transaction(ctx: &mut WalletContext) -> LoadTunnelResult<RequestOutcome> {
    let client = ctx.runner_context().get().client()?;
    let wallet_id = current_wallet_id(ctx);
    let (amount, kind) = {
        let mut rng = rand::thread_rng();
        let kind = if rng.gen_bool(0.7) {
            TransactionKind::Deposit
        } else {
            TransactionKind::Withdraw
        };
        (rng.gen_range(10..=1000), kind)
    };

    ctx.runner_context()
        .executor()
        .execute_in_place(async { Ok(client.create_transaction(&wallet_id, amount, kind).await) })
}
