use std::fs;
use std::io;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use crate::{remove_file_if_exists, write_atomically, StateLayout};

/// Independent preference namespaces; each group is its own file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceGroup {
    FailedUpdates,
    PendingInstall,
    InstallNeedsConfirmation,
    BinaryHash,
    LastVersion,
    FailedReport,
}

impl PreferenceGroup {
    pub const ALL: [Self; 6] = [
        Self::FailedUpdates,
        Self::PendingInstall,
        Self::InstallNeedsConfirmation,
        Self::BinaryHash,
        Self::LastVersion,
        Self::FailedReport,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FailedUpdates => "FAILED_UPDATES",
            Self::PendingInstall => "PENDING_INSTALL",
            Self::InstallNeedsConfirmation => "INSTALL_NEEDS_CONFIRMATION",
            Self::BinaryHash => "BINARY_HASH",
            Self::LastVersion => "LAST_VERSION",
            Self::FailedReport => "FAILED_REPORT",
        }
    }
}

/// Durable grouped key/value store.
///
/// Reads never fail: a missing key, a missing group file or a corrupt group
/// file all read as absent. Writes are synced to disk before returning.
#[derive(Debug, Clone)]
pub struct StateStore {
    layout: StateLayout,
}

impl StateStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    pub fn get(&self, group: PreferenceGroup, key: &str) -> Option<Value> {
        self.read_group(group).remove(key)
    }

    pub fn set(&self, group: PreferenceGroup, key: &str, value: Value) -> Result<()> {
        let mut entries = self.read_group(group);
        entries.insert(key.to_string(), value);
        self.write_group(group, &entries)
    }

    pub fn remove(&self, group: PreferenceGroup, key: &str) -> Result<()> {
        let mut entries = self.read_group(group);
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.write_group(group, &entries)
    }

    /// Overwrites the whole group in one durable write.
    pub fn replace_group(&self, group: PreferenceGroup, entries: Map<String, Value>) -> Result<()> {
        self.write_group(group, &entries)
    }

    pub fn clear_group(&self, group: PreferenceGroup) -> Result<()> {
        let path = self.layout.group_path(group);
        remove_file_if_exists(&path)
            .with_context(|| format!("failed to clear preference group: {}", path.display()))
    }

    fn read_group(&self, group: PreferenceGroup) -> Map<String, Value> {
        let path = self.layout.group_path(group);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Map::new(),
            Err(err) => {
                tracing::warn!(
                    group = group.as_str(),
                    path = %path.display(),
                    error = %err,
                    "unreadable preference group treated as empty"
                );
                return Map::new();
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(entries)) => entries,
            Ok(_) => {
                tracing::warn!(
                    group = group.as_str(),
                    path = %path.display(),
                    "preference group is not a JSON object; treated as empty"
                );
                Map::new()
            }
            Err(err) => {
                tracing::warn!(
                    group = group.as_str(),
                    path = %path.display(),
                    error = %err,
                    "malformed preference group treated as empty"
                );
                Map::new()
            }
        }
    }

    fn write_group(&self, group: PreferenceGroup, entries: &Map<String, Value>) -> Result<()> {
        let path = self.layout.group_path(group);
        let payload = serde_json::to_vec_pretty(entries)
            .with_context(|| format!("failed to serialize preference group {}", group.as_str()))?;
        write_atomically(&path, &payload)
            .with_context(|| format!("failed to persist preference group {}", group.as_str()))
    }
}
