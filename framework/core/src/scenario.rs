use std::time::Duration;

use rand::Rng;

/// One linear segment of the load curve.
///
/// The number of virtual users is ramped from the previous stage's target to this stage's
/// target over `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioStage {
    pub duration: Duration,
    pub target: usize,
}

impl ScenarioStage {
    pub const fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }

    pub const fn secs(seconds: u64, target: usize) -> Self {
        Self::new(Duration::from_secs(seconds), target)
    }

    pub const fn mins(minutes: u64, target: usize) -> Self {
        Self::new(Duration::from_secs(minutes * 60), target)
    }
}

/// Pause inserted between two iterations of the same virtual user, drawn uniformly from
/// `min..=max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkTime {
    min: Duration,
    max: Duration,
}

impl ThinkTime {
    pub fn new(min: Duration, max: Duration) -> Result<Self, RampError> {
        if min > max {
            return Err(RampError::InvalidThinkTime { min, max });
        }

        Ok(Self { min, max })
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }

        let millis = rand::thread_rng()
            .gen_range(self.min.as_millis() as u64..=self.max.as_millis() as u64);
        Duration::from_millis(millis)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RampError {
    #[error("scenario '{0}' has no stages")]
    NoStages(String),
    #[error(
        "stage {index} of scenario '{scenario}' changes the target to {target} but has a zero duration"
    )]
    ZeroDurationRamp {
        scenario: String,
        index: usize,
        target: usize,
    },
    #[error("think time minimum {min:?} is greater than maximum {max:?}")]
    InvalidThinkTime { min: Duration, max: Duration },
}

/// A named load profile.
///
/// Immutable once built: the catalog hands out clones and the run controller only reads them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    name: String,
    start_concurrency: Option<usize>,
    stages: Vec<ScenarioStage>,
    think_time: Option<ThinkTime>,
}

impl Scenario {
    /// Build a scenario, checking that every stage which changes the target has time to ramp.
    ///
    /// Without an explicit `start_concurrency` the curve starts at the first stage's target.
    pub fn new(
        name: impl Into<String>,
        start_concurrency: Option<usize>,
        stages: Vec<ScenarioStage>,
    ) -> Result<Self, RampError> {
        let name = name.into();
        let first = stages
            .first()
            .ok_or_else(|| RampError::NoStages(name.clone()))?;

        let mut previous = start_concurrency.unwrap_or(first.target);
        for (index, stage) in stages.iter().enumerate() {
            if stage.duration.is_zero() && stage.target != previous {
                return Err(RampError::ZeroDurationRamp {
                    scenario: name,
                    index,
                    target: stage.target,
                });
            }
            previous = stage.target;
        }

        Ok(Self {
            name,
            start_concurrency,
            stages,
            think_time: None,
        })
    }

    /// Ramp from `initial` to `target` over the first half of `duration`, then back down to zero
    /// over the second half.
    pub fn custom(
        initial: usize,
        target: usize,
        duration: Duration,
    ) -> Result<Self, RampError> {
        let half = duration / 2;
        Self::new(
            "custom",
            Some(initial),
            vec![
                ScenarioStage::new(half, target),
                ScenarioStage::new(duration - half, 0),
            ],
        )
    }

    pub fn with_think_time(mut self, think_time: ThinkTime) -> Self {
        self.think_time = Some(think_time);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_concurrency(&self) -> Option<usize> {
        self.start_concurrency
    }

    /// The number of users at `t = 0`.
    pub fn initial_concurrency(&self) -> usize {
        self.start_concurrency
            .unwrap_or_else(|| self.stages.first().map(|s| s.target).unwrap_or_default())
    }

    pub fn stages(&self) -> &[ScenarioStage] {
        &self.stages
    }

    pub fn think_time(&self) -> Option<ThinkTime> {
        self.think_time
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_empty_stage_list() {
        let err = Scenario::new("empty", Some(0), vec![]).unwrap_err();
        assert_eq!(RampError::NoStages("empty".to_string()), err);
    }

    #[test]
    fn reject_zero_duration_stage_that_changes_target() {
        let err = Scenario::new(
            "jump",
            Some(0),
            vec![ScenarioStage::secs(10, 5), ScenarioStage::secs(0, 8)],
        )
        .unwrap_err();

        assert_eq!(
            RampError::ZeroDurationRamp {
                scenario: "jump".to_string(),
                index: 1,
                target: 8,
            },
            err
        );
    }

    #[test]
    fn allow_zero_duration_stage_that_holds_target() {
        let scenario = Scenario::new(
            "hold",
            Some(0),
            vec![ScenarioStage::secs(10, 5), ScenarioStage::secs(0, 5)],
        )
        .unwrap();
        assert_eq!(Duration::from_secs(10), scenario.total_duration());
    }

    #[test]
    fn custom_scenario_splits_duration() {
        let scenario = Scenario::custom(2, 40, Duration::from_secs(600)).unwrap();

        assert_eq!(Some(2), scenario.start_concurrency());
        assert_eq!(
            &[ScenarioStage::secs(300, 40), ScenarioStage::secs(300, 0)],
            scenario.stages()
        );
    }

    #[test]
    fn implicit_start_uses_first_target() {
        let scenario = Scenario::new("flat", None, vec![ScenarioStage::secs(30, 7)]).unwrap();
        assert_eq!(7, scenario.initial_concurrency());
    }

    #[test]
    fn think_time_sample_stays_in_range() {
        let think_time =
            ThinkTime::new(Duration::from_millis(10), Duration::from_millis(20)).unwrap();
        for _ in 0..100 {
            let sample = think_time.sample();
            assert!(sample >= think_time.min() && sample <= think_time.max());
        }
    }

    #[test]
    fn think_time_rejects_inverted_range() {
        assert!(ThinkTime::new(Duration::from_secs(3), Duration::from_secs(1)).is_err());
    }
}
