use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Sidecar record describing an installed content package.
///
/// Every field except `is_mandatory` may be missing from the sidecar; a
/// missing key stays `None` rather than being coerced to an empty value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default)]
    pub is_mandatory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_build_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
}

impl PackageMetadata {
    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        serde_json::from_str(input).context("failed to parse package metadata")
    }

    pub fn to_json_string(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize package metadata")
    }

    /// Label when present and non-empty, otherwise the app version.
    pub fn label_or_app_version(&self) -> Option<&str> {
        match self.label.as_deref() {
            Some(label) if !label.is_empty() => Some(label),
            _ => self.app_version.as_deref(),
        }
    }

    pub fn has_hash(&self, hash: &str) -> bool {
        !hash.is_empty() && self.package_hash.as_deref() == Some(hash)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageSlot {
    Current,
    Previous,
}

impl PackageSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Previous => "previous",
        }
    }

    pub fn sidecar_file_name(self) -> &'static str {
        match self {
            Self::Current => "currentPackage.json",
            Self::Previous => "oldPackage.json",
        }
    }
}
