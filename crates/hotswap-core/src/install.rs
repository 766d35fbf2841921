use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::PackageMetadata;

pub const PENDING_INSTALL_SCHEMA: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum InstallMode {
    Immediate,
    OnNextRestart,
    OnNextResume,
}

impl InstallMode {
    pub fn code(self) -> i64 {
        match self {
            Self::Immediate => 0,
            Self::OnNextRestart => 1,
            Self::OnNextResume => 2,
        }
    }

    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(Self::Immediate),
            1 => Ok(Self::OnNextRestart),
            2 => Ok(Self::OnNextResume),
            other => Err(anyhow!(
                "invalid install mode code {other}: expected 0 (immediate), 1 (on-next-restart) or 2 (on-next-resume)"
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::OnNextRestart => "on-next-restart",
            Self::OnNextResume => "on-next-resume",
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let normalized = input.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "immediate" | "0" => Ok(Self::Immediate),
            "on-next-restart" | "restart" | "1" => Ok(Self::OnNextRestart),
            "on-next-resume" | "resume" | "2" => Ok(Self::OnNextResume),
            _ => Err(anyhow!(
                "invalid install mode '{input}': expected immediate, on-next-restart or on-next-resume"
            )),
        }
    }
}

impl TryFrom<i64> for InstallMode {
    type Error = anyhow::Error;

    fn try_from(code: i64) -> Result<Self> {
        Self::from_code(code)
    }
}

impl From<InstallMode> for i64 {
    fn from(mode: InstallMode) -> Self {
        mode.code()
    }
}

/// How an applied update that never gets confirmed is turned into a rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SafetyNet {
    /// Persisted flag checked at the next process start.
    ConfirmationFlag,
    /// One-shot countdown; a timeout of zero or less disables rollback.
    Timer {
        #[serde(rename = "rollbackTimeout")]
        rollback_timeout_ms: i64,
    },
}

impl Default for SafetyNet {
    fn default() -> Self {
        Self::ConfirmationFlag
    }
}

impl SafetyNet {
    pub fn timer_delay(self) -> Option<Duration> {
        match self {
            Self::Timer {
                rollback_timeout_ms,
            } if rollback_timeout_ms > 0 => Some(Duration::from_millis(rollback_timeout_ms as u64)),
            _ => None,
        }
    }

    pub fn is_unprotected(self) -> bool {
        matches!(self, Self::Timer { rollback_timeout_ms } if rollback_timeout_ms <= 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallOptions {
    pub install_mode: InstallMode,
    pub minimum_background_duration: u64,
    pub safety_net: SafetyNet,
}

impl InstallOptions {
    pub fn new(install_mode: InstallMode) -> Self {
        Self {
            install_mode,
            minimum_background_duration: 0,
            safety_net: SafetyNet::default(),
        }
    }

    pub fn with_minimum_background_duration(mut self, seconds: u64) -> Self {
        self.minimum_background_duration = seconds;
        self
    }

    pub fn with_safety_net(mut self, safety_net: SafetyNet) -> Self {
        self.safety_net = safety_net;
        self
    }

    pub fn minimum_background(&self) -> Duration {
        Duration::from_secs(self.minimum_background_duration)
    }
}

/// Deferred install waiting for its lifecycle trigger.
///
/// `package` is `None` for records written by older schemas: those stored
/// only the install options after the sidecar had already been promoted, so
/// the current slot is what gets activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInstallRecord {
    pub options: InstallOptions,
    pub package: Option<PackageMetadata>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPendingInstall {
    schema: u32,
    install_mode: InstallMode,
    #[serde(default)]
    minimum_background_duration: u64,
    #[serde(default)]
    safety_net: SafetyNet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    package: Option<PackageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyPendingInstall {
    install_mode: i64,
    #[serde(default)]
    minimum_background_duration: Option<u64>,
    #[serde(default)]
    rollback_timeout: Option<i64>,
}

impl PendingInstallRecord {
    pub fn new(options: InstallOptions, package: PackageMetadata) -> Self {
        Self {
            options,
            package: Some(package),
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        let stored = StoredPendingInstall {
            schema: PENDING_INSTALL_SCHEMA,
            install_mode: self.options.install_mode,
            minimum_background_duration: self.options.minimum_background_duration,
            safety_net: self.options.safety_net,
            package: self.package.clone(),
        };
        serde_json::to_value(stored).context("failed to serialize pending install record")
    }

    /// Reads any persisted shape of the record and upgrades it to the
    /// current schema.
    ///
    /// Schema 0 is a bare install-mode integer, schema 1 an object without a
    /// `schema` marker carrying `installMode` plus either
    /// `minimumBackgroundDuration` or the legacy `rollbackTimeout`.
    pub fn migrate(value: &Value) -> Result<Self> {
        if let Some(code) = value.as_i64() {
            return Ok(Self {
                options: InstallOptions::new(InstallMode::from_code(code)?),
                package: None,
            });
        }

        let schema = match value.get("schema") {
            None => 1,
            Some(raw) => raw
                .as_u64()
                .ok_or_else(|| anyhow!("pending install schema marker is not an integer"))?,
        };

        match schema {
            1 => {
                let legacy: LegacyPendingInstall = serde_json::from_value(value.clone())
                    .context("failed parsing schema 1 pending install record")?;
                let safety_net = match legacy.rollback_timeout {
                    Some(rollback_timeout_ms) => SafetyNet::Timer {
                        rollback_timeout_ms,
                    },
                    None => SafetyNet::ConfirmationFlag,
                };
                Ok(Self {
                    options: InstallOptions {
                        install_mode: InstallMode::from_code(legacy.install_mode)?,
                        minimum_background_duration: legacy
                            .minimum_background_duration
                            .unwrap_or_default(),
                        safety_net,
                    },
                    package: None,
                })
            }
            2 => {
                let stored: StoredPendingInstall = serde_json::from_value(value.clone())
                    .context("failed parsing schema 2 pending install record")?;
                Ok(Self {
                    options: InstallOptions {
                        install_mode: stored.install_mode,
                        minimum_background_duration: stored.minimum_background_duration,
                        safety_net: stored.safety_net,
                    },
                    package: stored.package,
                })
            }
            other => Err(anyhow!(
                "unsupported pending install schema {other} (expected at most {PENDING_INSTALL_SCHEMA})"
            )),
        }
    }
}
