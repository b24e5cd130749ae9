mod catalog;
mod cli;
mod context;
mod definition;
mod executor;
mod init;
mod monitor;
mod pool;
mod progress;
mod run;
mod shutdown;
mod types;

pub mod prelude {
    pub use crate::catalog::{ScenarioCatalog, ScenarioSelectionError};
    pub use crate::cli::{LoadTunnelScenarioCli, ReporterOpt};
    pub use crate::context::{RunnerContext, UserContext, UserValuesConstraint};
    pub use crate::definition::{HookResult, ScenarioDefinitionBuilder};
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::run::{run, RunState, RunStateError, RunStateMachine};
    pub use crate::types::LoadTunnelResult;

    pub use load_tunnel_core::prelude::*;
    pub use load_tunnel_instruments::{OperationRecord, Reporter};
    pub use load_tunnel_summary_model::{RunStatus, RunSummary};
}
