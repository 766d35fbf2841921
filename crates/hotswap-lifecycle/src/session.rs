use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::UiHost;

/// Per-attachment state of the UI host.
///
/// A new session is created on every attach; teardown only drops the
/// liveness flag so navigations already handed out become no-ops.
#[derive(Debug)]
pub struct Session {
    live: Arc<AtomicBool>,
    did_update: bool,
    should_clear_history: bool,
}

impl Session {
    pub fn attach() -> Self {
        Self::with_liveness(true)
    }

    pub fn detached() -> Self {
        Self::with_liveness(false)
    }

    fn with_liveness(live: bool) -> Self {
        Self {
            live: Arc::new(AtomicBool::new(live)),
            did_update: false,
            should_clear_history: false,
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn teardown(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    pub fn did_update(&self) -> bool {
        self.did_update
    }

    pub(crate) fn mark_updated(&mut self) {
        self.did_update = true;
    }

    pub(crate) fn navigation(&mut self, url: String) -> PendingNavigation {
        self.should_clear_history = true;
        PendingNavigation {
            url,
            live: Arc::clone(&self.live),
        }
    }

    pub(crate) fn take_history_clear(&mut self) -> bool {
        std::mem::take(&mut self.should_clear_history)
    }
}

/// Navigation produced by a handler, fired once its state change committed.
#[derive(Debug, Clone)]
pub struct PendingNavigation {
    url: String,
    live: Arc<AtomicBool>,
}

impl PendingNavigation {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Navigates only while the issuing session is live and the host is
    /// attached. Returns whether the host was told to navigate.
    pub fn fire(self, host: &dyn UiHost) -> bool {
        if !self.live.load(Ordering::SeqCst) || !host.is_attached() {
            tracing::debug!(url = %self.url, "navigation skipped: host detached");
            return false;
        }
        tracing::info!(url = %self.url, "navigating host");
        host.navigate_to(&self.url);
        true
    }
}
