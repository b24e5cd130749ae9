mod summary_report;

use std::sync::Arc;

use load_tunnel_summary_model::{MetricsSummary, ThresholdResult};

use crate::metrics::Metrics;
use crate::threshold::Threshold;
use crate::OperationRecord;

pub use summary_report::SummaryReportCollector;

/// Receives the final results of a run.
pub trait ReportCollector: Send + Sync {
    fn finalize(&self, summary: &MetricsSummary, thresholds: &[ThresholdResult]);
}

#[derive(Default)]
pub struct ReportConfig {
    enable_summary: bool,
}

impl ReportConfig {
    /// Print text tables of every series and threshold when the run is finalized.
    pub fn enable_summary(mut self) -> Self {
        self.enable_summary = true;
        self
    }

    pub fn init(self) -> Reporter {
        let mut collectors: Vec<Box<dyn ReportCollector>> = Vec::new();
        if self.enable_summary {
            collectors.push(Box::new(SummaryReportCollector::new()));
        }

        Reporter {
            metrics: Arc::new(Metrics::new()),
            collectors,
        }
    }
}

/// The handle that instrumented clients report into.
///
/// Metrics are always aggregated, because thresholds need them. Collectors only decide what is
/// done with the results at the end of the run.
pub struct Reporter {
    metrics: Arc<Metrics>,
    collectors: Vec<Box<dyn ReportCollector>>,
}

impl Reporter {
    /// Record the duration of a finished operation into the `<operation_id>_latency` trend and
    /// return it in milliseconds.
    pub fn add_operation(&self, operation_record: &mut OperationRecord) -> f64 {
        let elapsed_ms = operation_record.elapsed_ms();
        self.metrics.record_latency(
            &format!("{}_latency", operation_record.operation_id()),
            elapsed_ms,
        );
        elapsed_ms
    }

    pub fn add_latency(&self, series: &str, milliseconds: f64) {
        self.metrics.record_latency(series, milliseconds);
    }

    pub fn add_rate(&self, series: &str, is_match: bool) {
        self.metrics.record_outcome(series, is_match);
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Summarize every series, check the thresholds and hand the results to the collectors.
    pub fn finalize(&self, thresholds: &[Threshold]) -> (MetricsSummary, Vec<ThresholdResult>) {
        let summary = self.metrics.summarize();
        let results = self.metrics.evaluate(thresholds);

        for collector in &self.collectors {
            collector.finalize(&summary, &results);
        }

        (summary, results)
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("metrics", &self.metrics)
            .field("collectors", &self.collectors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_operation_records_latency_trend() {
        let reporter = ReportConfig::default().init();
        let mut record = OperationRecord::new("wallet_balance");
        std::thread::sleep(std::time::Duration::from_millis(5));

        let elapsed = reporter.add_operation(&mut record);

        let summary = reporter.metrics().summarize();
        let trend = summary.trends["wallet_balance_latency"];
        assert_eq!(1, trend.count);
        assert_eq!(elapsed, trend.max);
        assert!(elapsed >= 5.0);
    }

    #[test]
    fn finalize_returns_summary_and_threshold_results() {
        let reporter = ReportConfig::default().init();
        reporter.add_rate("wallet_failed_requests", true);
        reporter.add_rate("wallet_failed_requests", false);
        reporter.add_latency("http_req_duration", 120.0);

        let (summary, results) = reporter.finalize(&[
            Threshold::parse("wallet_failed_requests", "rate<0.1").unwrap(),
            Threshold::parse("http_req_duration", "p(95)<500").unwrap(),
        ]);

        assert_eq!(0.5, summary.rates["wallet_failed_requests"].rate);
        assert!(!results[0].passed);
        assert!(results[1].passed);
    }
}
