use std::fs;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use hotswap_core::{HostConfig, ReportCall};

pub use hotswap_security::ContentHasher;

/// The embedding UI surface that displays content and receives reports.
pub trait UiHost: Send + Sync {
    fn navigate_to(&self, url: &str);

    fn is_attached(&self) -> bool;

    /// Fire-and-forget; delivery failures are the host's concern.
    fn deliver_report(&self, call: &ReportCall);

    fn clear_history(&self) {}
}

pub trait BuildIdentifier: Send + Sync {
    fn native_build_time(&self) -> Option<String>;
}

/// Reports a stamp file's modification time in epoch milliseconds.
#[derive(Debug, Clone)]
pub struct FileBuildStamp {
    path: PathBuf,
}

impl FileBuildStamp {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BuildIdentifier for FileBuildStamp {
    fn native_build_time(&self) -> Option<String> {
        let modified = match fs::metadata(&self.path).and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(err) => {
                tracing::debug!(
                    path = %self.path.display(),
                    error = %err,
                    "build stamp unavailable"
                );
                return None;
            }
        };
        let millis = modified.duration_since(UNIX_EPOCH).ok()?.as_millis();
        Some(millis.to_string())
    }
}

/// Build identifier known up front, or deliberately unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticBuildTime(pub Option<String>);

impl BuildIdentifier for StaticBuildTime {
    fn native_build_time(&self) -> Option<String> {
        self.0.clone()
    }
}

pub trait LaunchConfiguration: Send + Sync {
    fn launch_url(&self) -> String;

    /// Update server the host checks against, if one is configured.
    fn server_url(&self) -> Option<String> {
        None
    }
}

impl LaunchConfiguration for HostConfig {
    fn launch_url(&self) -> String {
        self.launch_url.clone()
    }

    fn server_url(&self) -> Option<String> {
        self.server_url.clone()
    }
}
