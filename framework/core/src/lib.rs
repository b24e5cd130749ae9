mod bail;
mod ramp;
mod scenario;
mod shutdown;

pub mod prelude {
    pub use crate::bail::UserBailError;
    pub use crate::ramp::RampSchedule;
    pub use crate::scenario::{RampError, Scenario, ScenarioStage, ThinkTime};
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle};
}
