use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use load_tunnel_core::prelude::{RampSchedule, ShutdownHandle};
use load_tunnel_instruments::{ReportConfig, Reporter};
use load_tunnel_summary_model::{append_run_summary, RunSummary, StageSummary};

use crate::cli::ReporterOpt;
use crate::monitor::start_monitor;
use crate::pool::{UserHooks, UserPool};
use crate::progress::start_progress;
use crate::{
    context::{RunnerContext, UserValuesConstraint},
    definition::{ScenarioDefinition, ScenarioDefinitionBuilder},
    executor::Executor,
    shutdown::start_shutdown_listener,
};

/// The lifecycle of a run.
///
/// `Idle → Initializing → Running → Finalizing → Done`, or `Initializing → Aborted` if the run
/// cannot be configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum RunState {
    Idle,
    Initializing,
    Running,
    Finalizing,
    Done,
    Aborted,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Idle, RunState::Initializing)
                | (RunState::Initializing, RunState::Running)
                | (RunState::Initializing, RunState::Aborted)
                | (RunState::Running, RunState::Finalizing)
                | (RunState::Finalizing, RunState::Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("cannot move a run from {from} to {to}")]
pub struct RunStateError {
    pub from: RunState,
    pub to: RunState,
}

/// Tracks the [RunState] of a run and rejects transitions out of order.
#[derive(Debug)]
pub struct RunStateMachine {
    state: RunState,
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn transition(&mut self, next: RunState) -> Result<(), RunStateError> {
        if !self.state.can_transition_to(next) {
            return Err(RunStateError {
                from: self.state,
                to: next,
            });
        }

        log::info!("Run state: {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }
}

/// Run a scenario: resolve its load profile, drive virtual users along the ramp and report the
/// results.
///
/// Returns an error if the run could not start, for example because the load profile is unknown
/// or the global setup hook failed. Once users have started, problems are recorded in the
/// returned [RunSummary] instead, so that results are always reported.
pub fn run<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: ScenarioDefinitionBuilder<RV, V>,
) -> anyhow::Result<RunSummary> {
    let mut state = RunStateMachine::new();
    state.transition(RunState::Initializing)?;

    let (definition, runner_context, shutdown_handle) = match initialize(definition) {
        Ok(initialized) => initialized,
        Err(e) => {
            log::error!("Run aborted: {:?}", e);
            state.transition(RunState::Aborted)?;
            return Err(e);
        }
    };

    state.transition(RunState::Running)?;
    let started_at = chrono::Utc::now();
    let runner_context = Arc::new(runner_context);
    let schedule = RampSchedule::new(&definition.scenario).with_cap(definition.user_cap);

    let mut pool = UserPool::new(
        runner_context.clone(),
        shutdown_handle.clone(),
        UserHooks {
            setup: definition.setup_user_fn,
            behaviour: definition.user_behaviour,
            teardown: definition.teardown_user_fn,
            think_time: definition.think_time(),
        },
    );

    if !definition.no_progress {
        start_progress(
            schedule.total_duration(),
            pool.active_users(),
            shutdown_handle.new_listener(),
        );
    }

    // Ready to start spawning users so start the resource monitor to report high usage by users
    // which might lead to a misleading outcome.
    start_monitor(shutdown_handle.new_listener());

    let mut run_error = drive(
        &schedule,
        definition.scheduler_tick,
        &mut pool,
        runner_context.executor(),
        &shutdown_handle,
    )
    .err()
    .map(|e| format!("{e:?}"));

    shutdown_handle.shutdown();
    pool.drain();

    if run_error.is_none() && !pool.errors().is_empty() {
        run_error = Some(pool.errors().join("; "));
    }

    if let Some(teardown_fn) = definition.teardown_fn {
        // Don't crash the runner if the teardown fails. We still want the reporting and runner
        // shutdown to happen cleanly. The hook is documented as 'best effort'
        if let Err(e) = teardown_fn(runner_context.clone()) {
            log::error!("Teardown failed: {:?}", e);
        }
    }

    state.transition(RunState::Finalizing)?;
    let (metrics, threshold_results) = runner_context
        .reporter()
        .finalize(&definition.thresholds);

    let mut summary = RunSummary::new(
        definition
            .run_id
            .clone()
            .unwrap_or_else(|| nanoid::nanoid!()),
        definition.scenario.name().to_string(),
        started_at.timestamp(),
        schedule.total_duration().as_secs_f64(),
        definition
            .scenario
            .stages()
            .iter()
            .map(|stage| StageSummary {
                duration_s: stage.duration.as_secs_f64(),
                target: stage.target,
            })
            .collect(),
        definition.scenario.start_concurrency(),
        definition.user_cap,
        env!("CARGO_PKG_VERSION").to_string(),
    );
    summary.peak_users = pool.peak_users();
    summary.users_started = pool.users_started();
    summary.iterations = pool.iterations();
    for key in ["SCENARIO", "LOCAL_VUS", "BASE_URL"] {
        if let Ok(value) = std::env::var(key) {
            summary.add_env(key.to_string(), value);
        }
    }
    summary.set_results(metrics, threshold_results, run_error);

    for failed in summary.failed_thresholds() {
        log::warn!(
            "Threshold failed: {} {} (observed {:?})",
            failed.metric,
            failed.expression,
            failed.observed
        );
    }

    if let Some(path) = &definition.run_summary_path {
        if let Err(e) = append_run_summary(&summary, path.clone()) {
            log::error!("Failed to write run summary to {}: {:?}", path.display(), e);
        }
    }

    log::info!(
        "Scenario {} finished with status {:?} after {} iterations",
        definition.name,
        summary.status,
        summary.iterations
    );
    state.transition(RunState::Done)?;

    Ok(summary)
}

fn initialize<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: ScenarioDefinitionBuilder<RV, V>,
) -> anyhow::Result<(ScenarioDefinition<RV, V>, RunnerContext<RV>, ShutdownHandle)> {
    let definition = definition.build()?;

    log::info!(
        "Running scenario {} with load profile {} over {:?}",
        definition.name,
        definition.scenario.name(),
        definition.scenario.total_duration()
    );
    if let Some(cap) = definition.user_cap {
        log::info!("Virtual users are capped at {cap}");
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime);
    let executor = Arc::new(Executor::new(runtime));
    let reporter = Arc::new(init_reporter(definition.reporter));
    let mut runner_context = RunnerContext::new(
        executor,
        reporter,
        shutdown_handle.clone(),
        definition.base_url.clone(),
        definition.request_timeout,
    );

    if let Some(setup_fn) = &definition.setup_fn {
        setup_fn(&mut runner_context)?;
    }

    Ok((definition, runner_context, shutdown_handle))
}

/// Follow the ramp until it completes or the run is stopped.
fn drive<RV: UserValuesConstraint, V: UserValuesConstraint>(
    schedule: &RampSchedule,
    tick: Duration,
    pool: &mut UserPool<RV, V>,
    executor: &Executor,
    shutdown_handle: &ShutdownHandle,
) -> anyhow::Result<()> {
    let start = Instant::now();

    loop {
        let elapsed = start.elapsed();
        if shutdown_handle.is_shutdown() {
            log::info!("Run stopped early after {:?}", elapsed);
            return Ok(());
        }
        if schedule.is_complete(elapsed) {
            log::debug!("Ramp complete after {:?}", elapsed);
            return Ok(());
        }

        pool.reconcile(schedule.target_users_at(elapsed))?;

        let delay = tick.min(schedule.total_duration().saturating_sub(elapsed));
        let mut shutdown_listener = shutdown_handle.new_listener();
        executor.execute_in_place(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {},
                _ = shutdown_listener.wait_for_shutdown() => {},
            }
            Ok(())
        })?;
    }
}

fn init_reporter(opt: ReporterOpt) -> Reporter {
    match opt {
        ReporterOpt::Summary => ReportConfig::default().enable_summary().init(),
        ReporterOpt::Noop => ReportConfig::default().init(),
    }
}
