use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use load_tunnel_summary_model::{MetricsSummary, RateSummary, ThresholdResult, TrendSummary};
use parking_lot::{Mutex, RwLock};

use crate::threshold::{Aggregation, Threshold};

/// Nearest-rank percentile of an ascending sorted slice.
///
/// `p` is a percentage in `[0, 100]`. The index used is `ceil(p / 100 * n) - 1`, clamped to the
/// slice. Returns `None` for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }

    let n = sorted.len() as f64;
    // Multiply before dividing so that whole percentages of whole counts stay exact.
    let exact = p * n / 100.0;
    let nearest = exact.round();
    let rank = if (exact - nearest).abs() <= 1e-9 * nearest.max(1.0) {
        nearest
    } else {
        exact.ceil()
    };

    let index = (rank as isize - 1).clamp(0, sorted.len() as isize - 1) as usize;
    Some(sorted[index])
}

/// Retains every sample so that exact percentiles can be computed at the end of the run.
#[derive(Debug, Default)]
pub struct TrendSeries {
    samples: Mutex<Vec<f64>>,
}

impl TrendSeries {
    pub fn add(&self, value: f64) {
        self.samples.lock().push(value);
    }

    fn sorted_samples(&self) -> Vec<f64> {
        let mut samples = self.samples.lock().clone();
        samples.sort_by(f64::total_cmp);
        samples
    }

    pub fn summarize(&self) -> TrendSummary {
        summarize_sorted(&self.sorted_samples())
    }

    fn aggregate(&self, aggregation: Aggregation) -> Option<f64> {
        let sorted = self.sorted_samples();
        match aggregation {
            Aggregation::Avg => {
                (!sorted.is_empty()).then(|| sorted.iter().sum::<f64>() / sorted.len() as f64)
            }
            Aggregation::Min => sorted.first().copied(),
            Aggregation::Max => sorted.last().copied(),
            Aggregation::Med => percentile(&sorted, 50.0),
            Aggregation::Percentile(p) => percentile(&sorted, p),
            Aggregation::Rate => None,
        }
    }
}

fn summarize_sorted(sorted: &[f64]) -> TrendSummary {
    if sorted.is_empty() {
        return TrendSummary::default();
    }

    let at = |p| percentile(sorted, p).unwrap_or_default();
    TrendSummary {
        count: sorted.len(),
        min: sorted[0],
        avg: sorted.iter().sum::<f64>() / sorted.len() as f64,
        med: at(50.0),
        p90: at(90.0),
        p95: at(95.0),
        max: sorted[sorted.len() - 1],
    }
}

/// Counts how many observations matched out of all observations.
#[derive(Debug, Default)]
pub struct RateSeries {
    matches: AtomicU64,
    total: AtomicU64,
}

impl RateSeries {
    pub fn add(&self, is_match: bool) {
        if is_match {
            self.matches.fetch_add(1, Ordering::Relaxed);
        }
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summarize(&self) -> RateSummary {
        let total = self.total.load(Ordering::Relaxed);
        let matches = self.matches.load(Ordering::Relaxed);
        RateSummary {
            matches,
            total,
            rate: if total == 0 {
                0.0
            } else {
                matches as f64 / total as f64
            },
        }
    }
}

/// The metrics aggregator for one run.
///
/// Safe to share between any number of virtual users. Series are created on first use and each
/// series synchronises on its own, so writers to different series never wait on each other once
/// the series exist.
#[derive(Debug, Default)]
pub struct Metrics {
    trends: RwLock<HashMap<String, Arc<TrendSeries>>>,
    rates: RwLock<HashMap<String, Arc<RateSeries>>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample to a trend series.
    pub fn record_latency(&self, series: &str, milliseconds: f64) {
        self.trend(series).add(milliseconds);
    }

    /// Add an observation to a rate series, counting it as a match if `is_match` is true.
    pub fn record_outcome(&self, series: &str, is_match: bool) {
        self.rate(series).add(is_match);
    }

    pub fn trend(&self, name: &str) -> Arc<TrendSeries> {
        if let Some(series) = self.trends.read().get(name) {
            return series.clone();
        }
        self.trends
            .write()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    pub fn rate(&self, name: &str) -> Arc<RateSeries> {
        if let Some(series) = self.rates.read().get(name) {
            return series.clone();
        }
        self.rates
            .write()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    pub fn summarize(&self) -> MetricsSummary {
        MetricsSummary {
            trends: self
                .trends
                .read()
                .iter()
                .map(|(name, series)| (name.clone(), series.summarize()))
                .collect::<BTreeMap<_, _>>(),
            rates: self
                .rates
                .read()
                .iter()
                .map(|(name, series)| (name.clone(), series.summarize()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    /// Check thresholds against the recorded series.
    ///
    /// A threshold on a series with no observations passes with a warning. A threshold whose
    /// aggregation does not fit the recorded series kind fails.
    pub fn evaluate(&self, thresholds: &[Threshold]) -> Vec<ThresholdResult> {
        thresholds
            .iter()
            .map(|threshold| {
                let observed = self.observe(threshold);
                let passed = match observed {
                    Observation::Value(value) => threshold.comparison().holds(value),
                    Observation::Empty => {
                        log::warn!(
                            "No observations for '{}', skipping threshold '{}'",
                            threshold.metric(),
                            threshold.expression()
                        );
                        true
                    }
                    Observation::KindMismatch => {
                        log::error!(
                            "Threshold '{}' cannot be applied to series '{}'",
                            threshold.expression(),
                            threshold.metric()
                        );
                        false
                    }
                };

                ThresholdResult {
                    metric: threshold.metric().to_string(),
                    expression: threshold.expression().to_string(),
                    observed: match observed {
                        Observation::Value(value) => Some(value),
                        _ => None,
                    },
                    passed,
                }
            })
            .collect()
    }

    fn observe(&self, threshold: &Threshold) -> Observation {
        let aggregation = threshold.aggregation();
        let trend = self.trends.read().get(threshold.metric()).cloned();
        let rate = self.rates.read().get(threshold.metric()).cloned();

        match (aggregation, trend, rate) {
            (Aggregation::Rate, _, Some(rate)) => {
                let summary = rate.summarize();
                if summary.total == 0 {
                    Observation::Empty
                } else {
                    Observation::Value(summary.rate)
                }
            }
            (Aggregation::Rate, Some(_), None) => Observation::KindMismatch,
            (_, Some(trend), _) => match trend.aggregate(aggregation) {
                Some(value) => Observation::Value(value),
                None => Observation::Empty,
            },
            (_, None, Some(_)) => Observation::KindMismatch,
            (_, None, None) => Observation::Empty,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Observation {
    Value(f64),
    Empty,
    KindMismatch,
}
