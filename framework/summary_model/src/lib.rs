use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Summary statistics of a trend series, in the series' unit (milliseconds for latencies).
///
/// All statistics are zero when the series has no samples.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct TrendSummary {
    pub count: usize,
    pub min: f64,
    pub avg: f64,
    pub med: f64,
    pub p90: f64,
    pub p95: f64,
    pub max: f64,
}

/// Summary of a rate series: the fraction of observations that matched.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RateSummary {
    pub matches: u64,
    pub total: u64,
    pub rate: f64,
}

/// All series recorded during a run, keyed by series name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsSummary {
    pub trends: BTreeMap<String, TrendSummary>,
    pub rates: BTreeMap<String, RateSummary>,
}

/// The outcome of checking one threshold at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdResult {
    /// The series the threshold applies to
    pub metric: String,
    /// The threshold expression as configured, for example `p(95)<500`
    pub expression: String,
    /// The value the expression was checked against
    ///
    /// Not set if the series recorded no observations, or if the aggregation does not apply to
    /// the kind of series that was recorded.
    pub observed: Option<f64>,
    pub passed: bool,
}

/// One stage of the load curve that was run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StageSummary {
    pub duration_s: f64,
    pub target: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// All thresholds passed and no error interrupted the run
    Passed,
    /// At least one threshold failed or the run hit an error while running
    Failed,
}

/// Summary of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run.
    pub run_id: String,
    /// The name of the scenario that was run
    pub scenario_name: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// The planned length of the load curve, in seconds
    pub run_duration_s: f64,
    /// The ramp stages of the selected scenario
    pub stages: Vec<StageSummary>,
    /// The explicit starting concurrency, if the scenario sets one
    pub start_concurrency: Option<usize>,
    /// The operator cap on concurrent virtual users, if one was given
    pub user_cap: Option<usize>,
    /// The largest number of virtual users that were active at the same time
    pub peak_users: usize,
    /// The number of virtual users started over the whole run
    pub users_started: usize,
    /// The number of iterations that completed, successfully or not
    pub iterations: u64,
    /// Latency and other trend series
    pub trends: BTreeMap<String, TrendSummary>,
    /// Outcome rate series
    pub rates: BTreeMap<String, RateSummary>,
    /// Threshold results, in the order the thresholds were configured
    pub thresholds: Vec<ThresholdResult>,
    pub status: RunStatus,
    /// Set if something went wrong while the run was in progress
    ///
    /// Metrics are still reported in this case but they may only cover part of the run.
    pub run_error: Option<String>,
    /// Environment variables set for the run
    ///
    /// This won't capture all environment variables. Just the ones that the runner is aware of or
    /// that are included by the scenario itself.
    pub env: HashMap<String, String>,
    /// The version of the load tunnel runner that produced this summary
    pub load_tunnel_version: String,
}

impl RunSummary {
    /// Create a new run summary
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: String,
        scenario_name: String,
        started_at: i64,
        run_duration_s: f64,
        stages: Vec<StageSummary>,
        start_concurrency: Option<usize>,
        user_cap: Option<usize>,
        load_tunnel_version: String,
    ) -> Self {
        Self {
            run_id,
            scenario_name,
            started_at,
            run_duration_s,
            stages,
            start_concurrency,
            user_cap,
            peak_users: 0,
            users_started: 0,
            iterations: 0,
            trends: BTreeMap::new(),
            rates: BTreeMap::new(),
            thresholds: Vec::new(),
            status: RunStatus::Passed,
            run_error: None,
            env: HashMap::with_capacity(0),
            load_tunnel_version,
        }
    }

    /// Add an environment variable
    pub fn add_env(&mut self, key: String, value: String) {
        self.env.insert(key, value);
    }

    /// Attach the metrics and threshold results and work out the final status.
    pub fn set_results(
        &mut self,
        metrics: MetricsSummary,
        thresholds: Vec<ThresholdResult>,
        run_error: Option<String>,
    ) {
        self.trends = metrics.trends;
        self.rates = metrics.rates;
        self.status = if run_error.is_none() && thresholds.iter().all(|t| t.passed) {
            RunStatus::Passed
        } else {
            RunStatus::Failed
        };
        self.thresholds = thresholds;
        self.run_error = run_error;
    }

    pub fn passed(&self) -> bool {
        self.status == RunStatus::Passed
    }

    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdResult> {
        self.thresholds.iter().filter(|t| !t.passed)
    }

    /// Compute a fingerprint for this run summary
    ///
    /// The fingerprint is intended to uniquely identify the configuration used to run the scenario.
    /// It uses the
    ///     - Scenario name
    ///     - Stages and start concurrency
    ///     - User cap
    ///     - Selected environment variables
    ///     - Load tunnel version
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.scenario_name.as_bytes());
        for stage in &self.stages {
            Digest::update(&mut hasher, stage.duration_s.to_le_bytes());
            Digest::update(&mut hasher, stage.target.to_le_bytes());
        }
        if let Some(start) = self.start_concurrency {
            Digest::update(&mut hasher, start.to_le_bytes());
        }
        if let Some(cap) = self.user_cap {
            Digest::update(&mut hasher, b"cap");
            Digest::update(&mut hasher, cap.to_le_bytes());
        }
        self.env
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, v.as_bytes());
            });
        Digest::update(&mut hasher, self.load_tunnel_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: PathBuf) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_summary(run_summary, &mut file)?;
    file.write_all("\n".as_bytes())?;
    Ok(())
}

/// Serialize the run summary to a writer
pub fn store_run_summary<W: Write>(run_summary: &RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_summary)?;
    Ok(())
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_summary].
pub fn load_summary_runs(path: PathBuf) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunSummary = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}
