use std::sync::Arc;

use wallet_load_tunnel_runner::prelude::*;

fn setup(ctx: &mut RunnerContext<WalletRunnerContext>) -> HookResult {
    configure_wallet_client(ctx)?;
    Ok(())
}

/// One pass through a wallet's life: create it, read it, move coins around.
///
/// Every step runs even if an earlier one failed, so that each endpoint is measured on every
/// iteration. Without a created wallet the fallback wallet is used.
fn user_behaviour(ctx: &mut WalletContext) -> HookResult {
    create_wallet(ctx)?;
    get_balance(ctx)?;
    list_transactions(ctx, 5)?;
    add_coins(ctx)?;
    update_coins(ctx)?;
    create_transaction(ctx)?;

    Ok(())
}

fn user_teardown(ctx: &mut WalletContext) -> HookResult {
    log::debug!(
        "{} created {} wallets over {} iterations",
        ctx.user_id(),
        ctx.get().wallets_created,
        ctx.iteration()
    );

    Ok(())
}

fn teardown(_ctx: Arc<RunnerContext<WalletRunnerContext>>) -> HookResult {
    println!("Tearing down the scenario");

    Ok(())
}

fn main() -> LoadTunnelResult<()> {
    let builder = ScenarioDefinitionBuilder::<WalletRunnerContext, WalletUserContext>::new_with_init(
        env!("CARGO_PKG_NAME"),
    )
    .with_default_scenario("smoke")
    .with_threshold("wallet_balance_latency", "p(95)<500")
    .with_threshold("wallet_transaction_latency", "p(95)<1000")
    .with_threshold("wallet_failed_requests", "rate<0.1")
    .with_threshold("http_req_duration", "p(95)<1000")
    .use_setup(setup)
    .use_user_behaviour(user_behaviour)
    .use_user_teardown(user_teardown)
    .use_teardown(teardown);

    let summary = run(builder)?;
    if !summary.passed() {
        anyhow::bail!(
            "Run {} failed: {} thresholds failed{}",
            summary.run_id,
            summary.failed_thresholds().count(),
            summary
                .run_error
                .as_deref()
                .map(|e| format!(", {e}"))
                .unwrap_or_default()
        );
    }

    Ok(())
}
