use std::collections::BTreeSet;

use anyhow::{Context, Result};
use hotswap_core::{LastVersion, PendingInstallRecord, StatusReport};
use serde_json::{Map, Value};

use crate::{PreferenceGroup, StateLayout, StateStore};

const FAILED_UPDATES_KEY: &str = "FAILED_UPDATES_KEY";
const PENDING_INSTALL_RECORD_KEY: &str = "PENDING_INSTALL_RECORD";
const LEGACY_INSTALL_MODE_KEY: &str = "INSTALL_MODE_KEY";
const INSTALL_NEEDS_CONFIRMATION_KEY: &str = "INSTALL_NEEDS_CONFIRMATION_KEY";
const BINARY_HASH_KEY: &str = "BINARY_HASH_KEY";
const LAST_VERSION_KEY: &str = "LAST_VERSION_KEY";
const FAILED_REPORT_KEY: &str = "FAILED_REPORT_KEY";
const HAS_FAILED_REPORT_KEY: &str = "HAS_FAILED_REPORT_KEY";

/// Typed view over the update-lifecycle preference groups.
#[derive(Debug, Clone)]
pub struct Preferences {
    store: StateStore,
}

impl Preferences {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub fn open(layout: StateLayout) -> Self {
        Self::new(StateStore::new(layout))
    }

    pub fn failed_updates(&self) -> BTreeSet<String> {
        let Some(value) = self
            .store
            .get(PreferenceGroup::FailedUpdates, FAILED_UPDATES_KEY)
        else {
            return BTreeSet::new();
        };
        match serde_json::from_value::<BTreeSet<String>>(value) {
            Ok(hashes) => hashes,
            Err(err) => {
                tracing::warn!(error = %err, "malformed failed-update set treated as empty");
                BTreeSet::new()
            }
        }
    }

    pub fn save_failed_update(&self, package_hash: &str) -> Result<()> {
        let mut hashes = self.failed_updates();
        if !hashes.insert(package_hash.to_string()) {
            return Ok(());
        }
        self.store.set(
            PreferenceGroup::FailedUpdates,
            FAILED_UPDATES_KEY,
            serde_json::to_value(&hashes).context("failed to serialize failed-update set")?,
        )
    }

    pub fn is_failed_update(&self, package_hash: Option<&str>) -> bool {
        match package_hash {
            Some(hash) => self.failed_updates().contains(hash),
            None => false,
        }
    }

    pub fn clear_failed_updates(&self) -> Result<()> {
        self.store.clear_group(PreferenceGroup::FailedUpdates)
    }

    /// Stores `record` as the single outstanding deferred install, dropping
    /// whatever shape was there before.
    pub fn save_pending_install(&self, record: &PendingInstallRecord) -> Result<()> {
        let mut entries = Map::new();
        entries.insert(PENDING_INSTALL_RECORD_KEY.to_string(), record.to_value()?);
        self.store
            .replace_group(PreferenceGroup::PendingInstall, entries)
    }

    pub fn pending_install(&self) -> Option<PendingInstallRecord> {
        let value = self
            .store
            .get(PreferenceGroup::PendingInstall, PENDING_INSTALL_RECORD_KEY)
            .or_else(|| {
                self.store
                    .get(PreferenceGroup::PendingInstall, LEGACY_INSTALL_MODE_KEY)
            })?;
        match PendingInstallRecord::migrate(&value) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(error = %err, "unusable pending install record ignored");
                None
            }
        }
    }

    pub fn clear_pending_install(&self) -> Result<()> {
        self.store.clear_group(PreferenceGroup::PendingInstall)
    }

    pub fn mark_install_needs_confirmation(&self) -> Result<()> {
        self.store.set(
            PreferenceGroup::InstallNeedsConfirmation,
            INSTALL_NEEDS_CONFIRMATION_KEY,
            Value::Bool(true),
        )
    }

    pub fn clear_install_needs_confirmation(&self) -> Result<()> {
        self.store
            .clear_group(PreferenceGroup::InstallNeedsConfirmation)
    }

    pub fn install_needs_confirmation(&self) -> bool {
        self.store
            .get(
                PreferenceGroup::InstallNeedsConfirmation,
                INSTALL_NEEDS_CONFIRMATION_KEY,
            )
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
    }

    pub fn cached_binary_hash(&self) -> Option<String> {
        self.store
            .get(PreferenceGroup::BinaryHash, BINARY_HASH_KEY)
            .and_then(|value| value.as_str().map(str::to_string))
            .filter(|hash| !hash.is_empty())
    }

    pub fn save_binary_hash(&self, binary_hash: &str) -> Result<()> {
        self.store.set(
            PreferenceGroup::BinaryHash,
            BINARY_HASH_KEY,
            Value::String(binary_hash.to_string()),
        )
    }

    pub fn last_version(&self) -> Option<LastVersion> {
        let value = self
            .store
            .get(PreferenceGroup::LastVersion, LAST_VERSION_KEY)?;
        match serde_json::from_value(value) {
            Ok(last_version) => Some(last_version),
            Err(err) => {
                tracing::warn!(error = %err, "malformed last-version pointer ignored");
                None
            }
        }
    }

    pub fn save_last_version(&self, last_version: &LastVersion) -> Result<()> {
        self.store.set(
            PreferenceGroup::LastVersion,
            LAST_VERSION_KEY,
            serde_json::to_value(last_version).context("failed to serialize last version")?,
        )
    }

    pub fn save_failed_report(&self, report: &StatusReport) -> Result<()> {
        let mut entries = Map::new();
        entries.insert(
            FAILED_REPORT_KEY.to_string(),
            serde_json::to_value(report).context("failed to serialize status report")?,
        );
        entries.insert(HAS_FAILED_REPORT_KEY.to_string(), Value::Bool(true));
        self.store
            .replace_group(PreferenceGroup::FailedReport, entries)
    }

    pub fn has_failed_report(&self) -> bool {
        let flagged = self
            .store
            .get(PreferenceGroup::FailedReport, HAS_FAILED_REPORT_KEY)
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        flagged && self.failed_report().is_some()
    }

    pub fn failed_report(&self) -> Option<StatusReport> {
        let value = self
            .store
            .get(PreferenceGroup::FailedReport, FAILED_REPORT_KEY)?;
        match serde_json::from_value(value) {
            Ok(report) => Some(report),
            Err(err) => {
                tracing::warn!(error = %err, "malformed failed status report ignored");
                None
            }
        }
    }

    pub fn get_and_clear_failed_report(&self) -> Result<Option<StatusReport>> {
        let report = self.failed_report();
        self.clear_failed_report()?;
        Ok(report)
    }

    pub fn clear_failed_report(&self) -> Result<()> {
        self.store.clear_group(PreferenceGroup::FailedReport)
    }
}
