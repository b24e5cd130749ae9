use std::time::Duration;

use crate::scenario::Scenario;

/// The load curve of a [Scenario], precomputed for fast lookups by the scheduler.
///
/// Stage `i` covers the half-open interval `[boundaries[i-1], boundaries[i])` of elapsed time,
/// and within it the concurrency is linearly interpolated from the previous target to the
/// stage's target.
#[derive(Debug, Clone)]
pub struct RampSchedule {
    start: usize,
    targets: Vec<usize>,
    durations: Vec<Duration>,
    boundaries: Vec<Duration>,
    cap: Option<usize>,
}

impl RampSchedule {
    pub fn new(scenario: &Scenario) -> Self {
        let durations = scenario
            .stages()
            .iter()
            .map(|s| s.duration)
            .collect::<Vec<_>>();
        let boundaries = durations
            .iter()
            .scan(Duration::ZERO, |acc, d| {
                *acc += *d;
                Some(*acc)
            })
            .collect();

        Self {
            start: scenario.initial_concurrency(),
            targets: scenario.stages().iter().map(|s| s.target).collect(),
            durations,
            boundaries,
            cap: None,
        }
    }

    /// Clamp the number of users returned by [RampSchedule::target_users_at]. The shape of the
    /// curve returned by [RampSchedule::concurrency_at] is unaffected.
    pub fn with_cap(mut self, cap: Option<usize>) -> Self {
        self.cap = cap;
        self
    }

    pub fn total_duration(&self) -> Duration {
        self.boundaries.last().copied().unwrap_or_default()
    }

    pub fn is_complete(&self, elapsed: Duration) -> bool {
        elapsed >= self.total_duration()
    }

    /// The exact value of the ramp curve at `elapsed`.
    pub fn concurrency_at(&self, elapsed: Duration) -> f64 {
        // First boundary strictly after `elapsed`, which skips zero-length stages.
        let index = self.boundaries.partition_point(|b| *b <= elapsed);
        if index >= self.targets.len() {
            return self.targets.last().copied().unwrap_or(self.start) as f64;
        }

        let from = if index == 0 {
            self.start
        } else {
            self.targets[index - 1]
        } as f64;
        let to = self.targets[index] as f64;
        let stage_start = if index == 0 {
            Duration::ZERO
        } else {
            self.boundaries[index - 1]
        };

        let fraction =
            (elapsed - stage_start).as_secs_f64() / self.durations[index].as_secs_f64();
        from + (to - from) * fraction
    }

    /// The number of users that should be active at `elapsed`, rounded to the nearest whole user
    /// and clamped by the operator cap.
    pub fn target_users_at(&self, elapsed: Duration) -> usize {
        let users = self.concurrency_at(elapsed).round().max(0.0) as usize;
        match self.cap {
            Some(cap) => users.min(cap),
            None => users,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioStage;

    fn smoke() -> Scenario {
        Scenario::new(
            "smoke",
            Some(0),
            vec![
                ScenarioStage::secs(60, 10),
                ScenarioStage::secs(60, 10),
                ScenarioStage::secs(60, 0),
            ],
        )
        .unwrap()
    }

    fn at(schedule: &RampSchedule, secs: f64) -> f64 {
        schedule.concurrency_at(Duration::from_secs_f64(secs))
    }

    #[test]
    fn smoke_curve_ramps_holds_and_drains() {
        let schedule = RampSchedule::new(&smoke());

        assert_eq!(0.0, at(&schedule, 0.0));
        assert_eq!(5.0, at(&schedule, 30.0));
        assert_eq!(10.0, at(&schedule, 60.0));
        assert_eq!(10.0, at(&schedule, 90.0));
        assert_eq!(5.0, at(&schedule, 150.0));
        assert_eq!(0.0, at(&schedule, 180.0));
        assert_eq!(Duration::from_secs(180), schedule.total_duration());
    }

    #[test]
    fn curve_matches_targets_at_every_boundary() {
        let scenario = Scenario::new(
            "zigzag",
            Some(3),
            vec![
                ScenarioStage::secs(7, 20),
                ScenarioStage::secs(13, 4),
                ScenarioStage::secs(1, 4),
                ScenarioStage::secs(9, 50),
            ],
        )
        .unwrap();
        let schedule = RampSchedule::new(&scenario);

        let mut boundary = Duration::ZERO;
        assert_eq!(3.0, schedule.concurrency_at(boundary));
        for stage in scenario.stages() {
            boundary += stage.duration;
            assert_eq!(stage.target as f64, schedule.concurrency_at(boundary));
        }
    }

    #[test]
    fn curve_is_continuous_around_boundaries() {
        let schedule = RampSchedule::new(&smoke());
        let epsilon = Duration::from_micros(1);

        for boundary in [60, 120] {
            let boundary = Duration::from_secs(boundary);
            let before = schedule.concurrency_at(boundary - epsilon);
            let after = schedule.concurrency_at(boundary + epsilon);
            assert!((before - after).abs() < 0.001, "jump at {boundary:?}");
        }
    }

    #[test]
    fn zero_duration_stage_is_skipped() {
        let scenario = Scenario::new(
            "hold",
            Some(0),
            vec![
                ScenarioStage::secs(10, 10),
                ScenarioStage::secs(0, 10),
                ScenarioStage::secs(10, 0),
            ],
        )
        .unwrap();
        let schedule = RampSchedule::new(&scenario);

        assert_eq!(10.0, schedule.concurrency_at(Duration::from_secs(10)));
        assert_eq!(5.0, schedule.concurrency_at(Duration::from_secs(15)));
    }

    #[test]
    fn single_stage_without_start_holds_constant_population() {
        let scenario = Scenario::new("flat", None, vec![ScenarioStage::secs(60, 25)]).unwrap();
        let schedule = RampSchedule::new(&scenario);

        for secs in [0, 1, 30, 59, 60] {
            assert_eq!(25, schedule.target_users_at(Duration::from_secs(secs)));
        }
    }

    #[test]
    fn cap_clamps_target_without_changing_curve() {
        let schedule = RampSchedule::new(&smoke()).with_cap(Some(4));

        assert_eq!(3, schedule.target_users_at(Duration::from_secs(18)));
        assert_eq!(4, schedule.target_users_at(Duration::from_secs(30)));
        assert_eq!(4, schedule.target_users_at(Duration::from_secs(90)));
        assert_eq!(10.0, schedule.concurrency_at(Duration::from_secs(90)));
        assert_eq!(0, schedule.target_users_at(Duration::from_secs(180)));
    }

    #[test]
    fn final_target_of_zero_drains_everyone() {
        let schedule = RampSchedule::new(&smoke());
        assert_eq!(0, schedule.target_users_at(Duration::from_secs(180)));
        assert_eq!(0, schedule.target_users_at(Duration::from_secs(500)));
        assert!(schedule.is_complete(Duration::from_secs(180)));
        assert!(!schedule.is_complete(Duration::from_secs(179)));
    }
}
