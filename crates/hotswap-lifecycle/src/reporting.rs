use anyhow::Result;
use hotswap_core::{ReportingStatus, StatusReport};
use hotswap_store::Preferences;

use crate::UiHost;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// No deployment key; neither delivered nor kept.
    Dropped,
    /// Store-version report for the version already on record.
    Duplicate,
    Delivered,
    /// Host unavailable; kept in the failed-report slot for retry.
    Persisted,
}

/// Delivers status reports to the host, keeping the last undeliverable one.
#[derive(Debug, Clone)]
pub struct ReportingQueue {
    preferences: Preferences,
}

impl ReportingQueue {
    pub fn new(preferences: Preferences) -> Self {
        Self { preferences }
    }

    pub fn enqueue(&self, report: StatusReport, host: &dyn UiHost) -> Result<ReportOutcome> {
        if !report.has_deployment_key() {
            tracing::debug!(
                status = report.status.as_str(),
                "status report without deployment key dropped"
            );
            return Ok(ReportOutcome::Dropped);
        }

        let last_version = self.preferences.last_version();
        if report.status == ReportingStatus::StoreVersion
            && last_version.as_ref() == Some(&report.version_pointer())
        {
            tracing::debug!("store version already reported");
            return Ok(ReportOutcome::Duplicate);
        }

        let report = report.with_last_version(last_version.as_ref());
        if !host.is_attached() {
            self.preferences.save_failed_report(&report)?;
            tracing::info!(
                status = report.status.as_str(),
                "host detached, status report kept for retry"
            );
            return Ok(ReportOutcome::Persisted);
        }

        let call = report.to_call();
        tracing::info!(status = report.status.as_str(), call = %call, "delivering status report");
        host.deliver_report(&call);

        if report.status.records_version() {
            self.preferences.save_last_version(&report.version_pointer())?;
            self.preferences.clear_failed_report()?;
        }
        Ok(ReportOutcome::Delivered)
    }

    /// Re-enqueues the stored failed report, if there is one.
    pub fn retry_failed(&self, host: &dyn UiHost) -> Result<Option<ReportOutcome>> {
        if !self.preferences.has_failed_report() {
            return Ok(None);
        }
        match self.preferences.get_and_clear_failed_report()? {
            Some(report) => {
                tracing::debug!(status = report.status.as_str(), "retrying failed status report");
                self.enqueue(report, host).map(Some)
            }
            None => Ok(None),
        }
    }
}
