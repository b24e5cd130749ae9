use wallet_load_tunnel_runner::prelude::*;

fn setup(ctx: &mut RunnerContext<WalletRunnerContext>) -> HookResult {
    configure_wallet_client(ctx)?;
    Ok(())
}

/// Create wallets back-to-back, as fast as the service allows.
fn user_behaviour(ctx: &mut WalletContext) -> HookResult {
    let outcome = create_wallet(ctx)?;
    if outcome.classification == Classification::RateLimited {
        log::debug!("{} was rate limited after {:.2}ms", ctx.user_id(), outcome.latency_ms);
    }

    Ok(())
}

fn main() -> LoadTunnelResult<()> {
    let builder = ScenarioDefinitionBuilder::<WalletRunnerContext, WalletUserContext>::new_with_init(
        env!("CARGO_PKG_NAME"),
    )
    .with_default_scenario("mega")
    .with_threshold("wallet_creation_latency", "p(95)<2000")
    .with_threshold("wallet_failed_requests", "rate<0.5")
    .with_threshold("wallet_rate_limits", "rate<0.5")
    .with_threshold("http_req_duration", "p(95)<2000")
    .use_setup(setup)
    .use_user_behaviour(user_behaviour);

    let summary = run(builder)?;
    if !summary.passed() {
        anyhow::bail!(
            "Run {} failed with {} failed thresholds",
            summary.run_id,
            summary.failed_thresholds().count()
        );
    }

    Ok(())
}
