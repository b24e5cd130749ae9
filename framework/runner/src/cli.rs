use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReporterOpt {
    /// Print tables of every series and threshold at the end of the run
    Summary,
    /// Aggregate metrics for thresholds and the run summary but print nothing
    Noop,
}

#[derive(Debug, Clone, Parser)]
#[command(about, long_about = None)]
pub struct LoadTunnelScenarioCli {
    /// The base URL of the service to test, for example `http://localhost:3500/api`
    #[clap(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// The named load profile to run. See the scenario catalog for the available names.
    ///
    /// If neither this nor a custom ramp is given, the scenario's default profile is used.
    #[clap(long, env = "SCENARIO")]
    pub scenario: Option<String>,

    /// Cap the number of concurrent virtual users, for local or small-scale runs.
    ///
    /// The ramp keeps its shape, the number of users is clamped to this value.
    #[clap(long, env = "LOCAL_VUS")]
    pub local_vus: Option<usize>,

    /// Run a custom ramp instead of a named profile, starting from this many users.
    #[clap(long)]
    pub initial_vus: Option<usize>,

    /// Run a custom ramp instead of a named profile, ramping up to this many users over the first
    /// half of `--duration-minutes` and back down to zero over the second half.
    #[clap(long)]
    pub target_vus: Option<usize>,

    /// The length of a custom ramp, in minutes. Required with `--target-vus`.
    #[clap(long)]
    pub duration_minutes: Option<f64>,

    /// Timeout for each request made by a virtual user, in milliseconds. Requests are not retried.
    #[clap(long, default_value = "5000")]
    pub request_timeout_ms: u64,

    /// How often the scheduler compares the active users against the ramp, in milliseconds.
    #[clap(long)]
    pub scheduler_tick_ms: Option<u64>,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// How to report the results at the end of the run.
    #[clap(long, value_enum, default_value_t = ReporterOpt::Summary)]
    pub reporter: ReporterOpt,

    /// Append the structured run summary to this file as one JSON line.
    #[clap(long)]
    pub run_summary_path: Option<PathBuf>,

    /// Use this run id instead of generating one.
    #[clap(long)]
    pub run_id: Option<String>,
}
