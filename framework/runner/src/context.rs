use std::{fmt::Debug, sync::Arc, time::Duration};

use load_tunnel_core::prelude::{DelegatedShutdownListener, ShutdownHandle};
use load_tunnel_instruments::Reporter;

use crate::executor::Executor;

pub trait UserValuesConstraint: Default + Debug + Send + Sync + 'static {}

/// State shared by every virtual user for the whole run.
///
/// The global setup hook gets mutable access to this context. Once virtual users start it is
/// shared behind an [Arc] and only read.
#[derive(Debug)]
pub struct RunnerContext<RV: UserValuesConstraint> {
    executor: Arc<Executor>,
    reporter: Arc<Reporter>,
    shutdown_handle: ShutdownHandle,
    base_url: Option<String>,
    request_timeout: Duration,
    value: RV,
}

impl<RV: UserValuesConstraint> RunnerContext<RV> {
    pub(crate) fn new(
        executor: Arc<Executor>,
        reporter: Arc<Reporter>,
        shutdown_handle: ShutdownHandle,
        base_url: Option<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            reporter,
            shutdown_handle,
            base_url,
            request_timeout,
            value: Default::default(),
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn reporter(&self) -> Arc<Reporter> {
        self.reporter.clone()
    }

    /// The base URL of the service under test, from `--base-url` or `BASE_URL`.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// How long a single request may take before it is abandoned.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Stop the run early, as if the final stage had ended.
    ///
    /// Virtual users finish their current iteration and run their teardown, then results are
    /// reported as usual.
    pub fn force_stop_scenario(&self) {
        log::info!("Scenario stop requested");
        self.shutdown_handle.shutdown();
    }

    pub fn get_mut(&mut self) -> &mut RV {
        &mut self.value
    }

    pub fn get(&self) -> &RV {
        &self.value
    }
}

/// The context of one virtual user, passed to the user's setup, behaviour and teardown hooks.
pub struct UserContext<RV: UserValuesConstraint, V: UserValuesConstraint> {
    user_id: String,
    user_index: usize,
    iteration: u64,
    runner_context: Arc<RunnerContext<RV>>,
    shutdown_listener: DelegatedShutdownListener,
    retire_listener: DelegatedShutdownListener,
    value: V,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> UserContext<RV, V> {
    pub(crate) fn new(
        user_index: usize,
        runner_context: Arc<RunnerContext<RV>>,
        shutdown_listener: DelegatedShutdownListener,
        retire_listener: DelegatedShutdownListener,
    ) -> Self {
        Self {
            user_id: format!("vu-{user_index}"),
            user_index,
            iteration: 0,
            runner_context,
            shutdown_listener,
            retire_listener,
            value: Default::default(),
        }
    }

    /// A name for this user which is unique within the run, such as `vu-3`.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The order in which this user was started, from zero.
    pub fn user_index(&self) -> usize {
        self.user_index
    }

    /// The number of iterations this user has completed.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub(crate) fn complete_iteration(&mut self) {
        self.iteration += 1;
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext<RV>> {
        &self.runner_context
    }

    /// True once this user should not start another iteration, either because the run is
    /// stopping or because the ramp no longer needs this user.
    pub fn should_stop(&self) -> bool {
        self.shutdown_listener.should_shutdown() || self.retire_listener.should_shutdown()
    }

    /// Sleep for `delay`, waking early if this user is told to stop.
    pub(crate) fn pause(&self, delay: Duration) {
        let mut shutdown_listener = self.shutdown_listener.clone();
        let mut retire_listener = self.retire_listener.clone();
        let _ = self
            .runner_context
            .executor()
            .execute_in_place(async move {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {},
                    _ = shutdown_listener.wait_for_shutdown() => {},
                    _ = retire_listener.wait_for_shutdown() => {},
                }
                Ok(())
            });
    }

    /// Block until this user is told to stop.
    pub(crate) fn wait_for_stop(&self) {
        let mut shutdown_listener = self.shutdown_listener.clone();
        let mut retire_listener = self.retire_listener.clone();
        let _ = self
            .runner_context
            .executor()
            .execute_in_place(async move {
                tokio::select! {
                    _ = shutdown_listener.wait_for_shutdown() => {},
                    _ = retire_listener.wait_for_shutdown() => {},
                }
                Ok(())
            });
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn get(&self) -> &V {
        &self.value
    }
}
