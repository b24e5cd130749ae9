use std::any::Any;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Context as _;
use load_tunnel_core::prelude::{ShutdownHandle, ThinkTime, UserBailError};

use crate::context::{RunnerContext, UserContext, UserValuesConstraint};
use crate::definition::UserHookMut;

/// The hooks every virtual user runs.
pub(crate) struct UserHooks<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub(crate) setup: Option<UserHookMut<RV, V>>,
    pub(crate) behaviour: Option<UserHookMut<RV, V>>,
    pub(crate) teardown: Option<UserHookMut<RV, V>>,
    pub(crate) think_time: Option<ThinkTime>,
}

// Derived impls would require `RV: Copy` and `V: Copy`.
impl<RV: UserValuesConstraint, V: UserValuesConstraint> Clone for UserHooks<RV, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> Copy for UserHooks<RV, V> {}

struct UserHandle {
    id: String,
    retire: ShutdownHandle,
    thread: JoinHandle<()>,
}

/// The set of running virtual users, grown and shrunk to follow the ramp.
///
/// Only the scheduler thread touches the pool. Users that are retired keep running until their
/// current iteration and teardown complete, and are joined on a later tick or when the pool is
/// drained.
pub(crate) struct UserPool<RV: UserValuesConstraint, V: UserValuesConstraint> {
    runner_context: Arc<RunnerContext<RV>>,
    shutdown_handle: ShutdownHandle,
    hooks: UserHooks<RV, V>,
    active: Vec<UserHandle>,
    draining: Vec<UserHandle>,
    users_started: usize,
    peak_users: usize,
    active_users: Arc<AtomicUsize>,
    iterations: Arc<AtomicU64>,
    errors: Vec<String>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> UserPool<RV, V> {
    pub(crate) fn new(
        runner_context: Arc<RunnerContext<RV>>,
        shutdown_handle: ShutdownHandle,
        hooks: UserHooks<RV, V>,
    ) -> Self {
        Self {
            runner_context,
            shutdown_handle,
            hooks,
            active: Vec::new(),
            draining: Vec::new(),
            users_started: 0,
            peak_users: 0,
            active_users: Arc::new(AtomicUsize::new(0)),
            iterations: Arc::new(AtomicU64::new(0)),
            errors: Vec::new(),
        }
    }

    /// Start or retire users until `target` users are active.
    ///
    /// Users that stopped on their own, because they bailed or their setup failed, no longer
    /// count as active and are replaced here. Excess users are retired newest first.
    pub(crate) fn reconcile(&mut self, target: usize) -> anyhow::Result<()> {
        self.reap();

        while self.active.len() < target {
            let user = self.spawn_user()?;
            self.active.push(user);
        }

        while self.active.len() > target {
            let Some(user) = self.active.pop() else {
                break;
            };
            log::debug!("Retiring virtual user {}", user.id);
            user.retire.shutdown();
            self.draining.push(user);
        }

        self.peak_users = self.peak_users.max(self.active.len());
        self.active_users.store(self.active.len(), Ordering::Relaxed);

        Ok(())
    }

    /// Stop every user and wait for all of them to finish.
    pub(crate) fn drain(&mut self) {
        let users = self
            .active
            .drain(..)
            .chain(self.draining.drain(..))
            .collect::<Vec<_>>();
        log::info!("Waiting for {} virtual users to stop", users.len());

        for user in &users {
            user.retire.shutdown();
        }
        for user in users {
            self.join(user);
        }

        self.active_users.store(0, Ordering::Relaxed);
    }

    pub(crate) fn users_started(&self) -> usize {
        self.users_started
    }

    pub(crate) fn peak_users(&self) -> usize {
        self.peak_users
    }

    pub(crate) fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// The number of active users, shared for display while the run progresses.
    pub(crate) fn active_users(&self) -> Arc<AtomicUsize> {
        self.active_users.clone()
    }

    /// Errors from users that panicked.
    pub(crate) fn errors(&self) -> &[String] {
        &self.errors
    }

    fn reap(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.active)
            .into_iter()
            .partition(|user| user.thread.is_finished());
        self.active = running;

        let (drained, draining): (Vec<_>, Vec<_>) = std::mem::take(&mut self.draining)
            .into_iter()
            .partition(|user| user.thread.is_finished());
        self.draining = draining;

        for user in finished.into_iter().chain(drained) {
            self.join(user);
        }
    }

    fn join(&mut self, user: UserHandle) {
        if let Err(panic) = user.thread.join() {
            let msg = format!(
                "Virtual user {} panicked: {}",
                user.id,
                panic_message(panic.as_ref())
            );
            log::error!("{msg}");
            self.errors.push(msg);
        }
    }

    fn spawn_user(&mut self) -> anyhow::Result<UserHandle> {
        let user_index = self.users_started;
        let retire = ShutdownHandle::new();
        let context = UserContext::<RV, V>::new(
            user_index,
            self.runner_context.clone(),
            self.shutdown_handle.new_listener(),
            retire.new_listener(),
        );
        let id = context.user_id().to_string();
        let hooks = self.hooks;
        let iterations = self.iterations.clone();

        let thread = std::thread::Builder::new()
            .name(id.clone())
            .spawn(move || run_user(context, hooks, iterations))
            .with_context(|| format!("Failed to spawn thread for virtual user {id}"))?;

        log::debug!("Started virtual user {id}");
        self.users_started += 1;

        Ok(UserHandle { id, retire, thread })
    }
}

fn run_user<RV: UserValuesConstraint, V: UserValuesConstraint>(
    mut context: UserContext<RV, V>,
    hooks: UserHooks<RV, V>,
    iterations: Arc<AtomicU64>,
) {
    let user_id = context.user_id().to_string();

    if let Some(setup) = hooks.setup {
        if let Err(e) = setup(&mut context) {
            log::error!("User setup failed for {}: {:?}", user_id, e);
            return;
        }
    }

    match hooks.behaviour {
        Some(behaviour) => {
            while !context.should_stop() {
                let bailed = match behaviour(&mut context) {
                    Ok(()) => false,
                    Err(e) if e.is::<UserBailError>() => {
                        log::warn!("Virtual user {} is bailing: {}", user_id, e);
                        true
                    }
                    Err(e) => {
                        log::error!("User behaviour failed for {}: {:?}", user_id, e);
                        false
                    }
                };

                context.complete_iteration();
                iterations.fetch_add(1, Ordering::Relaxed);

                if bailed {
                    break;
                }

                if let Some(think_time) = hooks.think_time {
                    if !context.should_stop() {
                        context.pause(think_time.sample());
                    }
                }
            }
        }
        // Without a behaviour the user still holds its place in the pool until it is stopped.
        None => context.wait_for_stop(),
    }

    log::debug!(
        "Stopping virtual user {} after {} iterations",
        user_id,
        context.iteration()
    );

    if let Some(teardown) = hooks.teardown {
        if let Err(e) = teardown(&mut context) {
            log::error!("User teardown failed for {}: {:?}", user_id, e);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
