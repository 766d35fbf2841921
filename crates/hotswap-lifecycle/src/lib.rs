mod host;
mod manager;
mod policy;
mod protocol;
mod reporting;
mod runtime;
mod session;

pub use host::{
    BuildIdentifier, ContentHasher, FileBuildStamp, LaunchConfiguration, StaticBuildTime, UiHost,
};
pub use manager::{Outcome, StatusSnapshot, TimerRequest, Transition, UpdateManager};
pub use policy::{decide, Decision, Trigger};
pub use protocol::{Applied, RolledBack};
pub use reporting::{ReportOutcome, ReportingQueue};
pub use runtime::{HashTarget, LifecycleCommand, LifecycleRuntime, RuntimeHandle};
pub use session::{PendingNavigation, Session};
