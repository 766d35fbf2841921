use std::time::Duration;

use hotswap_core::{InstallMode, InstallOptions};

/// Lifecycle moment at which an install is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    InstallRequest,
    ProcessStart,
    Resume { background: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    ApplyNow,
    Defer,
}

/// Deferred installs always apply at process start, including on-next-resume
/// ones: the first run after an install gets a chance to pick it up.
pub fn decide(options: &InstallOptions, trigger: Trigger) -> Decision {
    match (options.install_mode, trigger) {
        (InstallMode::Immediate, _) => Decision::ApplyNow,
        (_, Trigger::InstallRequest) => Decision::Defer,
        (_, Trigger::ProcessStart) => Decision::ApplyNow,
        (InstallMode::OnNextRestart, Trigger::Resume { .. }) => Decision::Defer,
        (InstallMode::OnNextResume, Trigger::Resume { background }) => {
            if background >= options.minimum_background() {
                Decision::ApplyNow
            } else {
                Decision::Defer
            }
        }
    }
}
