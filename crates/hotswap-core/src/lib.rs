mod config;
mod install;
mod metadata;
mod report;

pub use config::{default_state_root, HostConfig, SafetyNetConfig, SafetyNetMode};
pub use install::{
    InstallMode, InstallOptions, PendingInstallRecord, SafetyNet, PENDING_INSTALL_SCHEMA,
};
pub use metadata::{PackageMetadata, PackageSlot};
pub use report::{LastVersion, ReportCall, ReportingStatus, StatusReport};

#[cfg(test)]
mod tests;
