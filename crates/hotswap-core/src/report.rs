use std::fmt;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::PackageMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ReportingStatus {
    StoreVersion,
    UpdateConfirmed,
    UpdateRolledBack,
}

impl ReportingStatus {
    pub fn code(self) -> i64 {
        match self {
            Self::StoreVersion => 0,
            Self::UpdateConfirmed => 1,
            Self::UpdateRolledBack => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StoreVersion => "store-version",
            Self::UpdateConfirmed => "update-confirmed",
            Self::UpdateRolledBack => "update-rolled-back",
        }
    }

    /// Statuses that move the last-reported-version pointer forward.
    pub fn records_version(self) -> bool {
        matches!(self, Self::StoreVersion | Self::UpdateConfirmed)
    }
}

impl TryFrom<i64> for ReportingStatus {
    type Error = anyhow::Error;

    fn try_from(code: i64) -> Result<Self> {
        match code {
            0 => Ok(Self::StoreVersion),
            1 => Ok(Self::UpdateConfirmed),
            2 => Ok(Self::UpdateRolledBack),
            other => Err(anyhow!("invalid reporting status code {other}")),
        }
    }
}

impl From<ReportingStatus> for i64 {
    fn from(status: ReportingStatus) -> Self {
        status.code()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastVersion {
    pub label_or_app_version: Option<String>,
    pub deployment_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: ReportingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_version_label_or_app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_version_deployment_key: Option<String>,
}

impl StatusReport {
    pub fn new(
        status: ReportingStatus,
        label: Option<String>,
        app_version: Option<String>,
        deployment_key: Option<String>,
    ) -> Self {
        Self {
            status,
            label,
            app_version,
            deployment_key,
            last_version_label_or_app_version: None,
            last_version_deployment_key: None,
        }
    }

    pub fn for_package(status: ReportingStatus, package: &PackageMetadata) -> Self {
        Self::new(
            status,
            package.label.clone(),
            package.app_version.clone(),
            package.deployment_key.clone(),
        )
    }

    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("failed to parse status report")
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to serialize status report")
    }

    pub fn has_deployment_key(&self) -> bool {
        self.deployment_key
            .as_deref()
            .is_some_and(|key| !key.is_empty())
    }

    pub fn with_last_version(mut self, last_version: Option<&LastVersion>) -> Self {
        self.last_version_label_or_app_version =
            last_version.and_then(|last| last.label_or_app_version.clone());
        self.last_version_deployment_key =
            last_version.and_then(|last| last.deployment_key.clone());
        self
    }

    /// Pointer value this report establishes once delivered.
    pub fn version_pointer(&self) -> LastVersion {
        let label_or_app_version = match self.label.as_deref() {
            Some(label) if !label.is_empty() => Some(label.to_string()),
            _ => self.app_version.clone(),
        };
        LastVersion {
            label_or_app_version,
            deployment_key: self.deployment_key.clone(),
        }
    }

    pub fn to_call(&self) -> ReportCall {
        ReportCall {
            status: self.status.code(),
            label: self.label.clone(),
            app_version: self.app_version.clone(),
            deployment_key: self.deployment_key.clone(),
            previous_label_or_app_version: self.last_version_label_or_app_version.clone(),
            previous_deployment_key: self.last_version_deployment_key.clone(),
        }
    }
}

/// Outbound `reportStatus` invocation handed to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportCall {
    pub status: i64,
    pub label: Option<String>,
    pub app_version: Option<String>,
    pub deployment_key: Option<String>,
    pub previous_label_or_app_version: Option<String>,
    pub previous_deployment_key: Option<String>,
}

impl ReportCall {
    pub fn arguments(&self) -> Vec<String> {
        let mut arguments = vec![self.status.to_string()];
        for value in [
            &self.label,
            &self.app_version,
            &self.deployment_key,
            &self.previous_label_or_app_version,
            &self.previous_deployment_key,
        ] {
            arguments.push(render_argument(value.as_deref()));
        }
        arguments
    }
}

impl fmt::Display for ReportCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reportStatus({})", self.arguments().join(", "))
    }
}

// Absent values must stay distinguishable from empty strings on the far side.
fn render_argument(value: Option<&str>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(value) => serde_json::Value::String(value.to_string()).to_string(),
    }
}
