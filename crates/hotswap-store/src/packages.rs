use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use hotswap_core::{PackageMetadata, PackageSlot};

use crate::{remove_dir_all_if_exists, remove_file_if_exists, write_atomically, StateLayout};

/// Sidecar-backed record of the current and previous content packages.
#[derive(Debug, Clone)]
pub struct PackageRepository {
    layout: StateLayout,
    start_page_name: String,
}

impl PackageRepository {
    pub fn new(layout: StateLayout, start_page_name: impl Into<String>) -> Self {
        Self {
            layout,
            start_page_name: start_page_name.into(),
        }
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    /// Missing, unreadable and malformed sidecars all read as `None` so the
    /// host falls back to its bundled content.
    pub fn read(&self, slot: PackageSlot) -> Option<PackageMetadata> {
        let path = self.layout.sidecar_path(slot);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(
                    slot = slot.as_str(),
                    path = %path.display(),
                    error = %err,
                    "unreadable package sidecar treated as absent"
                );
                return None;
            }
        };

        match PackageMetadata::from_json_str(&raw) {
            Ok(metadata) => Some(metadata),
            Err(err) => {
                tracing::warn!(
                    slot = slot.as_str(),
                    path = %path.display(),
                    error = %err,
                    "malformed package sidecar treated as absent"
                );
                None
            }
        }
    }

    pub fn write(&self, slot: PackageSlot, metadata: &PackageMetadata) -> Result<PathBuf> {
        let path = self.layout.sidecar_path(slot);
        let payload = metadata.to_json_string()?;
        write_atomically(&path, payload.as_bytes()).with_context(|| {
            format!("failed to write {} package sidecar", slot.as_str())
        })?;
        Ok(path)
    }

    /// Makes `package` current, moving the existing current sidecar into the
    /// previous slot. Returns the superseded package, if any.
    pub fn promote(&self, package: &PackageMetadata) -> Result<Option<PackageMetadata>> {
        let current_path = self.layout.sidecar_path(PackageSlot::Current);
        let previous_path = self.layout.sidecar_path(PackageSlot::Previous);
        let superseded = self.read(PackageSlot::Current);

        if current_path.exists() {
            if previous_path.exists() {
                tracing::warn!("replacing stale previous package before promotion");
                self.delete_stale_previous(package);
            }
            fs::rename(&current_path, &previous_path).with_context(|| {
                format!(
                    "failed to move {} to {}",
                    current_path.display(),
                    previous_path.display()
                )
            })?;
        }

        self.write(PackageSlot::Current, package)?;
        Ok(superseded)
    }

    /// Drops the current package and restores the previous one in its place.
    /// Returns the package that was removed.
    pub fn revert(&self) -> Result<Option<PackageMetadata>> {
        let current_path = self.layout.sidecar_path(PackageSlot::Current);
        let previous_path = self.layout.sidecar_path(PackageSlot::Previous);
        let failed = self.read(PackageSlot::Current);
        let previous = self.read(PackageSlot::Previous);

        if let Some(failed_dir) = failed.as_ref().and_then(|meta| self.package_dir(meta)) {
            let shared = previous
                .as_ref()
                .and_then(|meta| self.package_dir(meta))
                .is_some_and(|previous_dir| previous_dir == failed_dir);
            if !shared {
                if let Err(err) = remove_dir_all_if_exists(&failed_dir) {
                    tracing::warn!(
                        path = %failed_dir.display(),
                        error = %err,
                        "failed to remove rolled back package"
                    );
                }
            }
        }

        remove_file_if_exists(&current_path)
            .with_context(|| format!("failed to remove {}", current_path.display()))?;
        if previous_path.exists() {
            fs::rename(&previous_path, &current_path).with_context(|| {
                format!(
                    "failed to restore {} to {}",
                    previous_path.display(),
                    current_path.display()
                )
            })?;
        }
        Ok(failed)
    }

    /// Removes the slot's sidecar and package tree. A missing slot is not an
    /// error, and a tree still referenced by the other slot is left alone.
    pub fn delete_slot(&self, slot: PackageSlot) -> Result<()> {
        let other = match slot {
            PackageSlot::Current => PackageSlot::Previous,
            PackageSlot::Previous => PackageSlot::Current,
        };
        if let Some(dir) = self.read(slot).and_then(|meta| self.package_dir(&meta)) {
            let shared = self
                .read(other)
                .and_then(|meta| self.package_dir(&meta))
                .is_some_and(|other_dir| other_dir == dir);
            if !shared {
                remove_dir_all_if_exists(&dir)
                    .with_context(|| format!("failed to remove package: {}", dir.display()))?;
            }
        }

        let sidecar = self.layout.sidecar_path(slot);
        remove_file_if_exists(&sidecar)
            .with_context(|| format!("failed to remove {}", sidecar.display()))?;
        Ok(())
    }

    /// Removes every deployed package and both sidecars.
    pub fn clean_deployments(&self) -> Result<()> {
        let dir = self.layout.deployments_dir();
        remove_dir_all_if_exists(&dir)
            .with_context(|| format!("failed to clean deployments: {}", dir.display()))
    }

    pub fn package_dir(&self, metadata: &PackageMetadata) -> Option<PathBuf> {
        metadata
            .local_path
            .as_deref()
            .and_then(|local_path| self.layout.package_dir(local_path))
    }

    pub fn start_page(&self, metadata: &PackageMetadata) -> Option<PathBuf> {
        let page = self
            .package_dir(metadata)?
            .join("www")
            .join(&self.start_page_name);
        page.is_file().then_some(page)
    }

    pub fn start_page_url(&self, metadata: &PackageMetadata) -> Option<String> {
        let page = self.start_page(metadata)?;
        let absolute = fs::canonicalize(&page).unwrap_or(page);
        let rendered = absolute.to_string_lossy().replace('\\', "/");
        if rendered.starts_with('/') {
            Some(format!("file://{rendered}"))
        } else {
            Some(format!("file:///{rendered}"))
        }
    }

    fn delete_stale_previous(&self, incoming: &PackageMetadata) {
        let incoming_dir = self.package_dir(incoming);
        let current_dir = self
            .read(PackageSlot::Current)
            .and_then(|meta| self.package_dir(&meta));
        if let Some(stale_dir) = self
            .read(PackageSlot::Previous)
            .and_then(|meta| self.package_dir(&meta))
        {
            if Some(&stale_dir) != incoming_dir.as_ref() && Some(&stale_dir) != current_dir.as_ref()
            {
                if let Err(err) = remove_dir_all_if_exists(&stale_dir) {
                    tracing::warn!(
                        path = %stale_dir.display(),
                        error = %err,
                        "failed to remove stale previous package"
                    );
                }
            }
        }
    }
}
