use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::SafetyNet;

const CONFIG_VERSION: u32 = 1;
const DEFAULT_LAUNCH_URL: &str = "file:///android_asset/www/index.html";
const DEFAULT_BUNDLED_URL_PREFIX: &str = "file:///android_asset/www/";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyNetMode {
    #[default]
    Flag,
    Timer,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyNetConfig {
    #[serde(default)]
    pub mode: SafetyNetMode,
    #[serde(default)]
    pub rollback_timeout_ms: i64,
}

/// Host-side settings: where state lives, what the bundled content is, and
/// how unconfirmed updates are guarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "config_version")]
    pub version: u32,
    #[serde(default = "default_launch_url")]
    pub launch_url: String,
    #[serde(default = "default_bundled_url_prefix")]
    pub bundled_url_prefix: String,
    pub app_version: Option<String>,
    pub deployment_key: Option<String>,
    pub server_url: Option<String>,
    pub state_dir: Option<PathBuf>,
    pub bundled_content_dir: Option<PathBuf>,
    pub build_stamp_path: Option<PathBuf>,
    #[serde(default)]
    pub safety_net: SafetyNetConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            version: config_version(),
            launch_url: default_launch_url(),
            bundled_url_prefix: default_bundled_url_prefix(),
            app_version: None,
            deployment_key: None,
            server_url: None,
            state_dir: None,
            bundled_content_dir: None,
            build_stamp_path: None,
            safety_net: SafetyNetConfig::default(),
        }
    }
}

impl HostConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("failed to parse hotswap config")?;
        if config.version != CONFIG_VERSION {
            anyhow::bail!(
                "unsupported hotswap config version {} (expected {}): update hotswap.toml to version {}",
                config.version,
                CONFIG_VERSION,
                CONFIG_VERSION
            );
        }
        if config.launch_url.trim().is_empty() {
            anyhow::bail!("launch_url must not be empty");
        }
        Ok(config)
    }

    /// Loads the config at `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no hotswap config found, using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read hotswap config: {}", path.display()));
            }
        };
        Self::from_toml_str(&raw)
            .with_context(|| format!("invalid hotswap config: {}", path.display()))
    }

    /// Start page file name relative to a package's `www` directory.
    pub fn start_page_name(&self) -> &str {
        self.launch_url
            .strip_prefix(&self.bundled_url_prefix)
            .unwrap_or(&self.launch_url)
    }

    pub fn safety_net(&self) -> SafetyNet {
        match self.safety_net.mode {
            SafetyNetMode::Flag => SafetyNet::ConfirmationFlag,
            SafetyNetMode::Timer => {
                if self.safety_net.rollback_timeout_ms <= 0 {
                    tracing::warn!(
                        rollback_timeout_ms = self.safety_net.rollback_timeout_ms,
                        "timer safety net configured without a positive timeout; rollback protection disabled"
                    );
                }
                SafetyNet::Timer {
                    rollback_timeout_ms: self.safety_net.rollback_timeout_ms,
                }
            }
        }
    }

    pub fn state_root(&self) -> Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_state_root(),
        }
    }
}

pub fn default_state_root() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows state root")?;
        return Ok(PathBuf::from(app_data).join("Hotswap"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve state root")?;
    Ok(PathBuf::from(home).join(".hotswap"))
}

fn config_version() -> u32 {
    CONFIG_VERSION
}

fn default_launch_url() -> String {
    DEFAULT_LAUNCH_URL.to_string()
}

fn default_bundled_url_prefix() -> String {
    DEFAULT_BUNDLED_URL_PREFIX.to_string()
}
