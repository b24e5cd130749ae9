use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use load_tunnel_core::prelude::{Scenario, ThinkTime};
use load_tunnel_instruments::Threshold;

use crate::catalog::ScenarioCatalog;
use crate::cli::{LoadTunnelScenarioCli, ReporterOpt};
use crate::context::{RunnerContext, UserContext, UserValuesConstraint};

pub type HookResult = anyhow::Result<()>;

pub type GlobalHookMut<RV> = fn(&mut RunnerContext<RV>) -> HookResult;
pub type GlobalHook<RV> = fn(Arc<RunnerContext<RV>>) -> HookResult;
pub type UserHookMut<RV, V> = fn(&mut UserContext<RV, V>) -> HookResult;

const DEFAULT_SCENARIO: &str = "smoke";
const DEFAULT_SCHEDULER_TICK: Duration = Duration::from_secs(1);

/// The builder for a scenario definition.
///
/// This must be used at the start of a test to define the scenario that you want to run.
pub struct ScenarioDefinitionBuilder<RV: UserValuesConstraint, V: UserValuesConstraint> {
    /// The name of the scenario, which should be unique within the test suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    /// This value is initialised for you and you cannot change it.
    #[doc(hidden)]
    cli: LoadTunnelScenarioCli,
    /// The catalog that load profile names are looked up in.
    catalog: Option<ScenarioCatalog>,
    /// The load profile to use when none is selected on the command line.
    default_scenario: String,
    /// A load profile that replaces any selection made on the command line.
    scenario: Option<Scenario>,
    /// Thresholds as `(metric, expression)` pairs, parsed when the run starts.
    thresholds: Vec<(String, String)>,
    scheduler_tick: Duration,
    /// Global setup hook for this scenario. It will be run once, before any users are started.
    setup_fn: Option<GlobalHookMut<RV>>,
    /// Setup hook for a virtual user, which will be run once for each user as it starts.
    ///
    /// If it fails, the user does not run. The pool will start a replacement on a later tick.
    setup_user_fn: Option<UserHookMut<RV, V>>,
    /// The iteration body, run repeatedly by every virtual user until the user is stopped.
    user_behaviour: Option<UserHookMut<RV, V>>,
    /// Teardown hook for a virtual user, run once the user has stopped iterating.
    teardown_user_fn: Option<UserHookMut<RV, V>>,
    /// Global teardown hook, run once all users have stopped. This is best effort: an error is
    /// logged and results are still reported.
    teardown_fn: Option<GlobalHook<RV>>,
}

pub(crate) struct ScenarioDefinition<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub(crate) name: String,
    pub(crate) scenario: Scenario,
    pub(crate) user_cap: Option<usize>,
    pub(crate) thresholds: Vec<Threshold>,
    pub(crate) scheduler_tick: Duration,
    pub(crate) base_url: Option<String>,
    pub(crate) request_timeout: Duration,
    pub(crate) no_progress: bool,
    pub(crate) reporter: ReporterOpt,
    pub(crate) run_summary_path: Option<PathBuf>,
    pub(crate) run_id: Option<String>,
    pub(crate) setup_fn: Option<GlobalHookMut<RV>>,
    pub(crate) setup_user_fn: Option<UserHookMut<RV, V>>,
    pub(crate) user_behaviour: Option<UserHookMut<RV, V>>,
    pub(crate) teardown_user_fn: Option<UserHookMut<RV, V>>,
    pub(crate) teardown_fn: Option<GlobalHook<RV>>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinitionBuilder<RV, V> {
    /// Initialise a new scenario definition from the scenario name and command line arguments.
    /// See the [ScenarioDefinitionBuilder::name] for more information about the name.
    pub fn new(name: &str, cli: LoadTunnelScenarioCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            catalog: None,
            default_scenario: DEFAULT_SCENARIO.to_string(),
            scenario: None,
            thresholds: Vec::new(),
            scheduler_tick: DEFAULT_SCHEDULER_TICK,
            setup_fn: None,
            setup_user_fn: None,
            user_behaviour: None,
            teardown_user_fn: None,
            teardown_fn: None,
        }
    }

    /// Like [ScenarioDefinitionBuilder::new] but initialises logging and parses the command line
    /// for you. Use this from a scenario's `main` function.
    pub fn new_with_init(name: &str) -> Self {
        Self::new(name, crate::init::init())
    }

    /// The catalog profile to run when neither `--scenario` nor a custom ramp is given.
    pub fn with_default_scenario(mut self, name: &str) -> Self {
        self.default_scenario = name.to_string();
        self
    }

    /// Run exactly this load profile, ignoring any selection made on the command line.
    ///
    /// The `--local-vus` cap still applies.
    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = Some(scenario);
        self
    }

    /// Look profile names up in `catalog` instead of [ScenarioCatalog::builtin].
    pub fn with_catalog(mut self, catalog: ScenarioCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Add a threshold on a metric series, for example `("wallet_failed_requests", "rate<0.1")`.
    ///
    /// A series can have more than one threshold. Expressions are validated when the run starts
    /// and an invalid expression aborts the run.
    pub fn with_threshold(mut self, metric: &str, expression: &str) -> Self {
        self.thresholds
            .push((metric.to_string(), expression.to_string()));
        self
    }

    /// How often the active users are compared against the ramp. Overridden by
    /// `--scheduler-tick-ms`.
    pub fn with_scheduler_tick(mut self, tick: Duration) -> Self {
        self.scheduler_tick = tick;
        self
    }

    /// Set the global setup hook [ScenarioDefinitionBuilder::setup_fn] for this scenario.
    pub fn use_setup(mut self, setup_fn: GlobalHookMut<RV>) -> Self {
        self.setup_fn = Some(setup_fn);
        self
    }

    /// Set the user setup hook [ScenarioDefinitionBuilder::setup_user_fn] for this scenario.
    pub fn use_user_setup(mut self, setup_user_fn: UserHookMut<RV, V>) -> Self {
        self.setup_user_fn = Some(setup_user_fn);
        self
    }

    /// Set the iteration body [ScenarioDefinitionBuilder::user_behaviour] for this scenario.
    pub fn use_user_behaviour(mut self, behaviour: UserHookMut<RV, V>) -> Self {
        self.user_behaviour = Some(behaviour);
        self
    }

    /// Set the user teardown hook [ScenarioDefinitionBuilder::teardown_user_fn] for this scenario.
    pub fn use_user_teardown(mut self, teardown_user_fn: UserHookMut<RV, V>) -> Self {
        self.teardown_user_fn = Some(teardown_user_fn);
        self
    }

    /// Set the global teardown hook [ScenarioDefinitionBuilder::teardown_fn] for this scenario.
    pub fn use_teardown(mut self, teardown_fn: GlobalHook<RV>) -> Self {
        self.teardown_fn = Some(teardown_fn);
        self
    }

    /// Resolve the load profile and validate the configuration.
    pub(crate) fn build(self) -> anyhow::Result<ScenarioDefinition<RV, V>> {
        let scenario = match self.scenario {
            Some(scenario) => scenario,
            None => {
                let catalog = match self.catalog {
                    Some(catalog) => catalog,
                    None => ScenarioCatalog::builtin()?,
                };
                catalog.resolve(&self.cli, &self.default_scenario)?
            }
        };

        if self.cli.local_vus == Some(0) {
            anyhow::bail!("--local-vus must allow at least one virtual user");
        }
        if self.cli.request_timeout_ms == 0 {
            anyhow::bail!("--request-timeout-ms must be greater than zero");
        }

        let scheduler_tick = self
            .cli
            .scheduler_tick_ms
            .map(Duration::from_millis)
            .unwrap_or(self.scheduler_tick);
        if scheduler_tick.is_zero() {
            anyhow::bail!("The scheduler tick must be greater than zero");
        }

        let thresholds = self
            .thresholds
            .iter()
            .map(|(metric, expression)| Threshold::parse(metric, expression))
            .collect::<Result<Vec<_>, _>>()
            .context("Invalid threshold")?;

        Ok(ScenarioDefinition {
            name: self.name,
            scenario,
            user_cap: self.cli.local_vus,
            thresholds,
            scheduler_tick,
            base_url: self.cli.base_url,
            request_timeout: Duration::from_millis(self.cli.request_timeout_ms),
            no_progress: self.cli.no_progress,
            reporter: self.cli.reporter,
            run_summary_path: self.cli.run_summary_path,
            run_id: self.cli.run_id,
            setup_fn: self.setup_fn,
            setup_user_fn: self.setup_user_fn,
            user_behaviour: self.user_behaviour,
            teardown_user_fn: self.teardown_user_fn,
            teardown_fn: self.teardown_fn,
        })
    }
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinition<RV, V> {
    pub(crate) fn think_time(&self) -> Option<ThinkTime> {
        self.scenario.think_time()
    }
}
