mod metrics;
mod report;
mod threshold;

use std::time::{Duration, Instant};

pub use metrics::{percentile, Metrics, RateSeries, TrendSeries};
pub use report::{ReportCollector, ReportConfig, Reporter, SummaryReportCollector};
pub use threshold::{Aggregation, Comparison, Threshold, ThresholdParseError};

/// Timing for a single operation, such as one HTTP call.
///
/// Create the record immediately before the operation starts and pass it to
/// [Reporter::add_operation] once it completes.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    operation_id: String,
    started: Instant,
    elapsed: Option<Duration>,
}

impl OperationRecord {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            started: Instant::now(),
            elapsed: None,
        }
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Stop the clock. Calling this again keeps the first measurement.
    pub fn finish(&mut self) -> Duration {
        *self.elapsed.get_or_insert_with(|| self.started.elapsed())
    }

    /// The measured time in milliseconds, stopping the clock if that has not happened yet.
    pub fn elapsed_ms(&mut self) -> f64 {
        self.finish().as_micros() as f64 / 1000.0
    }
}
