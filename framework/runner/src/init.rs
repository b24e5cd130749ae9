use crate::cli::LoadTunnelScenarioCli;
use clap::Parser;

/// Initialise the CLI and logging for the load tunnel runner.
pub fn init() -> LoadTunnelScenarioCli {
    env_logger::init();

    LoadTunnelScenarioCli::parse()
}
