use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use hotswap_core::PackageSlot;

use crate::PreferenceGroup;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn deployments_dir(&self) -> PathBuf {
        self.root.join("codepush")
    }

    pub fn sidecar_path(&self, slot: PackageSlot) -> PathBuf {
        self.deployments_dir().join(slot.sidecar_file_name())
    }

    pub fn prefs_dir(&self) -> PathBuf {
        self.root.join("prefs")
    }

    pub fn group_path(&self, group: PreferenceGroup) -> PathBuf {
        self.prefs_dir().join(format!("{}.json", group.as_str()))
    }

    /// Resolves a sidecar `localPath` under the state root.
    ///
    /// Returns `None` for empty paths and for paths that would climb out of
    /// the root.
    pub fn package_dir(&self, local_path: &str) -> Option<PathBuf> {
        let relative = Path::new(local_path.trim_start_matches(['/', '\\']));
        if relative.as_os_str().is_empty() {
            return None;
        }
        if relative.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        }) {
            return None;
        }
        Some(self.root.join(relative))
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [self.root.clone(), self.deployments_dir(), self.prefs_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}
