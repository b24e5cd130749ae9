use std::collections::BTreeMap;
use std::time::Duration;

use load_tunnel_core::prelude::{RampError, Scenario, ScenarioStage, ThinkTime};

use crate::cli::LoadTunnelScenarioCli;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScenarioSelectionError {
    #[error("unknown scenario '{name}', expected one of: {available}")]
    NotFound { name: String, available: String },
    #[error("a custom ramp needs both --target-vus and --duration-minutes")]
    IncompleteCustomRamp,
    #[error("custom ramp duration must be a positive number of minutes, got {0}")]
    InvalidCustomDuration(f64),
    #[error(transparent)]
    Ramp(#[from] RampError),
}

/// Named load profiles, populated once and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ScenarioCatalog {
    scenarios: BTreeMap<String, Scenario>,
}

impl ScenarioCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in profiles.
    ///
    /// The general profiles pause 1 to 3 seconds between iterations, like a person using the
    /// wallet would. The wallet_* profiles and `mega` run iterations back-to-back.
    ///
    /// `mega` only fixes its shape, a constant population. Its size of 1000 users for five
    /// minutes is a default picked for the wallet creation scenario, so cap it with
    /// `--local-vus` for smaller runs.
    pub fn builtin() -> Result<Self, RampError> {
        let browsing = ThinkTime::new(Duration::from_secs(1), Duration::from_secs(3))?;
        let ramp = |name: &str, stages: Vec<ScenarioStage>| Scenario::new(name, Some(0), stages);

        Ok(Self::empty()
            .with(
                ramp(
                    "smoke",
                    vec![
                        ScenarioStage::mins(1, 10),
                        ScenarioStage::mins(1, 10),
                        ScenarioStage::mins(1, 0),
                    ],
                )?
                .with_think_time(browsing),
            )
            .with(
                ramp(
                    "load",
                    vec![
                        ScenarioStage::mins(2, 50),
                        ScenarioStage::mins(5, 50),
                        ScenarioStage::mins(2, 0),
                    ],
                )?
                .with_think_time(browsing),
            )
            .with(
                ramp(
                    "stress",
                    vec![
                        ScenarioStage::mins(2, 100),
                        ScenarioStage::mins(5, 100),
                        ScenarioStage::mins(2, 0),
                    ],
                )?
                .with_think_time(browsing),
            )
            .with(
                ramp(
                    "spike",
                    vec![ScenarioStage::mins(1, 200), ScenarioStage::mins(1, 0)],
                )?
                .with_think_time(browsing),
            )
            .with(
                ramp(
                    "endurance",
                    vec![
                        ScenarioStage::mins(5, 50),
                        ScenarioStage::mins(20, 50),
                        ScenarioStage::mins(5, 0),
                    ],
                )?
                .with_think_time(browsing),
            )
            .with(
                ramp(
                    "soak",
                    vec![
                        ScenarioStage::mins(5, 25),
                        ScenarioStage::mins(50, 25),
                        ScenarioStage::mins(5, 0),
                    ],
                )?
                .with_think_time(browsing),
            )
            .with(ramp(
                "wallet_light",
                vec![
                    ScenarioStage::secs(30, 5),
                    ScenarioStage::mins(1, 5),
                    ScenarioStage::secs(30, 0),
                ],
            )?)
            .with(ramp(
                "wallet_moderate",
                vec![
                    ScenarioStage::secs(30, 20),
                    ScenarioStage::mins(2, 20),
                    ScenarioStage::secs(30, 0),
                ],
            )?)
            .with(ramp(
                "wallet_heavy",
                vec![
                    ScenarioStage::mins(1, 50),
                    ScenarioStage::mins(3, 50),
                    ScenarioStage::mins(1, 0),
                ],
            )?)
            .with(ramp(
                "wallet_extreme",
                vec![
                    ScenarioStage::mins(1, 100),
                    ScenarioStage::mins(3, 100),
                    ScenarioStage::mins(1, 0),
                ],
            )?)
            .with(Scenario::new(
                "mega",
                None,
                vec![ScenarioStage::mins(5, 1000)],
            )?))
    }

    /// Add or replace a profile.
    pub fn with(mut self, scenario: Scenario) -> Self {
        self.scenarios
            .insert(scenario.name().to_string(), scenario);
        self
    }

    pub fn lookup(&self, name: &str) -> Result<&Scenario, ScenarioSelectionError> {
        self.scenarios
            .get(name)
            .ok_or_else(|| ScenarioSelectionError::NotFound {
                name: name.to_string(),
                available: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scenarios.keys().map(String::as_str)
    }

    /// Pick the scenario for a run.
    ///
    /// A custom ramp given on the command line wins over a named profile, and a named profile wins
    /// over `default_name`.
    pub fn resolve(
        &self,
        cli: &LoadTunnelScenarioCli,
        default_name: &str,
    ) -> Result<Scenario, ScenarioSelectionError> {
        match (cli.target_vus, cli.duration_minutes) {
            (Some(target), Some(minutes)) => {
                let duration = Duration::try_from_secs_f64(minutes * 60.0)
                    .ok()
                    .filter(|duration| !duration.is_zero())
                    .ok_or(ScenarioSelectionError::InvalidCustomDuration(minutes))?;
                Ok(Scenario::custom(
                    cli.initial_vus.unwrap_or_default(),
                    target,
                    duration,
                )?)
            }
            (None, None) if cli.initial_vus.is_none() => {
                let name = cli.scenario.as_deref().unwrap_or(default_name);
                self.lookup(name).cloned()
            }
            _ => Err(ScenarioSelectionError::IncompleteCustomRamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ReporterOpt;
    use load_tunnel_core::prelude::RampSchedule;
    use pretty_assertions::assert_eq;

    fn cli() -> LoadTunnelScenarioCli {
        LoadTunnelScenarioCli {
            base_url: None,
            scenario: None,
            local_vus: None,
            initial_vus: None,
            target_vus: None,
            duration_minutes: None,
            request_timeout_ms: 5000,
            scheduler_tick_ms: None,
            no_progress: true,
            reporter: ReporterOpt::Noop,
            run_summary_path: None,
            run_id: None,
        }
    }

    #[test]
    fn builtin_contains_every_profile() {
        let catalog = ScenarioCatalog::builtin().unwrap();

        assert_eq!(
            vec![
                "endurance",
                "load",
                "mega",
                "smoke",
                "soak",
                "spike",
                "stress",
                "wallet_extreme",
                "wallet_heavy",
                "wallet_light",
                "wallet_moderate",
            ],
            catalog.names().collect::<Vec<_>>()
        );
    }

    #[test]
    fn smoke_profile_matches_expected_curve() {
        let catalog = ScenarioCatalog::builtin().unwrap();
        let smoke = catalog.lookup("smoke").unwrap();
        let schedule = RampSchedule::new(smoke);

        assert_eq!(Duration::from_secs(180), smoke.total_duration());
        assert_eq!(5, schedule.target_users_at(Duration::from_secs(30)));
        assert_eq!(10, schedule.target_users_at(Duration::from_secs(90)));
        assert_eq!(5, schedule.target_users_at(Duration::from_secs(150)));
        assert_eq!(0, schedule.target_users_at(Duration::from_secs(180)));
        assert!(smoke.think_time().is_some());
    }

    #[test]
    fn mega_holds_a_constant_population() {
        let catalog = ScenarioCatalog::builtin().unwrap();
        let mega = catalog.lookup("mega").unwrap();
        let schedule = RampSchedule::new(mega).with_cap(Some(20));

        assert_eq!(20, schedule.target_users_at(Duration::ZERO));
        assert_eq!(20, schedule.target_users_at(Duration::from_secs(299)));
        assert!(mega.think_time().is_none());
    }

    #[test]
    fn unknown_name_is_a_configuration_error() {
        let catalog = ScenarioCatalog::builtin().unwrap();
        let err = catalog.lookup("tsunami").unwrap_err();

        assert!(matches!(err, ScenarioSelectionError::NotFound { ref name, .. } if name == "tsunami"));
        assert!(err.to_string().contains("smoke"));
    }

    #[test]
    fn resolve_prefers_cli_name_over_default() {
        let catalog = ScenarioCatalog::builtin().unwrap();
        let mut cli = cli();

        assert_eq!("smoke", catalog.resolve(&cli, "smoke").unwrap().name());

        cli.scenario = Some("spike".to_string());
        assert_eq!("spike", catalog.resolve(&cli, "smoke").unwrap().name());
    }

    #[test]
    fn resolve_custom_ramp() {
        let catalog = ScenarioCatalog::builtin().unwrap();
        let mut cli = cli();
        cli.scenario = Some("smoke".to_string());
        cli.initial_vus = Some(5);
        cli.target_vus = Some(50);
        cli.duration_minutes = Some(4.0);

        let scenario = catalog.resolve(&cli, "smoke").unwrap();

        assert_eq!("custom", scenario.name());
        assert_eq!(Some(5), scenario.start_concurrency());
        assert_eq!(
            &[ScenarioStage::mins(2, 50), ScenarioStage::mins(2, 0)],
            scenario.stages()
        );
    }

    #[test]
    fn resolve_rejects_incomplete_custom_ramp() {
        let catalog = ScenarioCatalog::builtin().unwrap();

        let mut missing_duration = cli();
        missing_duration.target_vus = Some(50);
        assert_eq!(
            Err(ScenarioSelectionError::IncompleteCustomRamp),
            catalog.resolve(&missing_duration, "smoke")
        );

        let mut only_initial = cli();
        only_initial.initial_vus = Some(3);
        assert_eq!(
            Err(ScenarioSelectionError::IncompleteCustomRamp),
            catalog.resolve(&only_initial, "smoke")
        );

        let mut negative = cli();
        negative.target_vus = Some(50);
        negative.duration_minutes = Some(-1.0);
        assert_eq!(
            Err(ScenarioSelectionError::InvalidCustomDuration(-1.0)),
            catalog.resolve(&negative, "smoke")
        );

        let mut huge = cli();
        huge.target_vus = Some(10);
        huge.duration_minutes = Some(1e300);
        assert_eq!(
            Err(ScenarioSelectionError::InvalidCustomDuration(1e300)),
            catalog.resolve(&huge, "smoke")
        );

        let mut not_a_number = cli();
        not_a_number.target_vus = Some(10);
        not_a_number.duration_minutes = Some(f64::NAN);
        assert!(matches!(
            catalog.resolve(&not_a_number, "smoke"),
            Err(ScenarioSelectionError::InvalidCustomDuration(_))
        ));
    }
}
