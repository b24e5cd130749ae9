use std::fmt::Write;

use load_tunnel_summary_model::{MetricsSummary, ThresholdResult};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::report::ReportCollector;

#[derive(Tabled)]
struct TrendRow {
    #[tabled(rename = "series")]
    name: String,
    count: usize,
    #[tabled(display = "float2")]
    avg: f64,
    #[tabled(display = "float2")]
    min: f64,
    #[tabled(display = "float2")]
    med: f64,
    #[tabled(display = "float2")]
    max: f64,
    #[tabled(rename = "p(90)", display = "float2")]
    p90: f64,
    #[tabled(rename = "p(95)", display = "float2")]
    p95: f64,
}

#[derive(Tabled)]
struct RateRow {
    #[tabled(rename = "series")]
    name: String,
    #[tabled(display = "float2")]
    rate: f64,
    matches: u64,
    total: u64,
}

#[derive(Tabled)]
struct ThresholdRow {
    metric: String,
    expression: String,
    #[tabled(display = "observed")]
    observed: Option<f64>,
    #[tabled(display = "verdict")]
    passed: bool,
}

fn float2(n: &f64) -> String {
    format!("{:.2}", n)
}

fn observed(value: &Option<f64>) -> String {
    value.map(|v| float2(&v)).unwrap_or_else(|| "-".to_string())
}

fn verdict(passed: &bool) -> String {
    if *passed { "pass" } else { "FAIL" }.to_string()
}

/// Prints the end of run tables to stdout.
pub struct SummaryReportCollector;

impl SummaryReportCollector {
    pub fn new() -> Self {
        Self
    }

    /// Render the trend, rate and threshold tables as text.
    pub fn render(summary: &MetricsSummary, thresholds: &[ThresholdResult]) -> String {
        let mut out = String::new();

        if !summary.trends.is_empty() {
            let rows = summary
                .trends
                .iter()
                .map(|(name, trend)| TrendRow {
                    name: name.clone(),
                    count: trend.count,
                    avg: trend.avg,
                    min: trend.min,
                    med: trend.med,
                    max: trend.max,
                    p90: trend.p90,
                    p95: trend.p95,
                })
                .collect::<Vec<_>>();
            let mut table = Table::new(rows);
            table.with(Style::modern());
            let _ = writeln!(out, "\nTrends (ms)\n{table}");
        }

        if !summary.rates.is_empty() {
            let rows = summary
                .rates
                .iter()
                .map(|(name, rate)| RateRow {
                    name: name.clone(),
                    rate: rate.rate,
                    matches: rate.matches,
                    total: rate.total,
                })
                .collect::<Vec<_>>();
            let mut table = Table::new(rows);
            table.with(Style::modern());
            let _ = writeln!(out, "\nRates\n{table}");
        }

        if !thresholds.is_empty() {
            let rows = thresholds
                .iter()
                .map(|t| ThresholdRow {
                    metric: t.metric.clone(),
                    expression: t.expression.clone(),
                    observed: t.observed,
                    passed: t.passed,
                })
                .collect::<Vec<_>>();
            let mut table = Table::new(rows);
            table.with(Style::modern());
            let _ = writeln!(out, "\nThresholds\n{table}");
        }

        out
    }
}

impl Default for SummaryReportCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportCollector for SummaryReportCollector {
    fn finalize(&self, summary: &MetricsSummary, thresholds: &[ThresholdResult]) {
        println!("\nSummary of operations");
        println!("{}", Self::render(summary, thresholds));
    }
}
