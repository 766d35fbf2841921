use anyhow::{anyhow, Context, Result};
use hotswap_core::{PackageMetadata, PackageSlot};
use hotswap_store::{PackageRepository, Preferences};

use crate::LaunchConfiguration;

/// Result of a successful apply: `package` is now current and awaits
/// confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub package: PackageMetadata,
    pub superseded: Option<PackageMetadata>,
    pub start_page_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolledBack {
    pub failed: Option<PackageMetadata>,
    pub restored: Option<PackageMetadata>,
    pub navigation_url: String,
}

/// Resolves the start page an install would navigate to, rejecting packages
/// that have none.
pub fn validate(packages: &PackageRepository, package: &PackageMetadata) -> Result<String> {
    packages.start_page_url(package).ok_or_else(|| {
        anyhow!(
            "could not find the package start page for {}",
            describe(package)
        )
    })
}

/// Swaps `staged` in as the current package and raises the confirmation
/// flag. With no staged package the current slot is activated as-is.
pub fn apply(
    packages: &PackageRepository,
    preferences: &Preferences,
    staged: Option<&PackageMetadata>,
) -> Result<Applied> {
    let (package, superseded, start_page_url) = match staged {
        Some(package) => {
            let start_page_url = validate(packages, package)?;
            let superseded = packages
                .promote(package)
                .with_context(|| format!("failed to promote {}", describe(package)))?;
            (package.clone(), superseded, start_page_url)
        }
        None => {
            let current = packages
                .read(PackageSlot::Current)
                .ok_or_else(|| anyhow!("pending install has no package and no current package exists"))?;
            let start_page_url = validate(packages, &current)?;
            let superseded = packages.read(PackageSlot::Previous);
            (current, superseded, start_page_url)
        }
    };

    preferences.clear_pending_install()?;
    preferences.mark_install_needs_confirmation()?;
    tracing::info!(package = %describe(&package), "update applied, awaiting confirmation");

    Ok(Applied {
        package,
        superseded,
        start_page_url,
    })
}

/// Commits an unconfirmed update. Returns `None` when nothing was awaiting
/// confirmation.
pub fn confirm(
    packages: &PackageRepository,
    preferences: &Preferences,
) -> Result<Option<PackageMetadata>> {
    if !preferences.install_needs_confirmation() {
        return Ok(None);
    }

    preferences.clear_install_needs_confirmation()?;
    if let Err(err) = packages.delete_slot(PackageSlot::Previous) {
        tracing::warn!(error = %err, "failed to clean up previous package after confirmation");
    }

    let current = packages.read(PackageSlot::Current);
    if let Some(package) = &current {
        tracing::info!(package = %describe(package), "update confirmed");
    }
    Ok(current)
}

/// Reverts the current package to the previous one and records the failed
/// package hash.
pub fn rollback(
    packages: &PackageRepository,
    preferences: &Preferences,
    launch: &dyn LaunchConfiguration,
) -> Result<RolledBack> {
    let failing = packages.read(PackageSlot::Current);
    if let Some(hash) = failing
        .as_ref()
        .and_then(|package| package.package_hash.as_deref())
    {
        preferences.save_failed_update(hash)?;
    }

    let failed = packages.revert()?.or(failing);
    preferences.clear_install_needs_confirmation()?;

    let restored = packages.read(PackageSlot::Current);
    let navigation_url = restored
        .as_ref()
        .and_then(|package| packages.start_page_url(package))
        .unwrap_or_else(|| launch.launch_url());

    tracing::warn!(
        failed = %failed.as_ref().map(describe).unwrap_or_else(|| "<none>".to_string()),
        restored = %restored.as_ref().map(describe).unwrap_or_else(|| "<bundled>".to_string()),
        "update rolled back"
    );

    Ok(RolledBack {
        failed,
        restored,
        navigation_url,
    })
}

pub(crate) fn describe(package: &PackageMetadata) -> String {
    match (package.label_or_app_version(), package.package_hash.as_deref()) {
        (Some(label), Some(hash)) => format!("{label} ({hash})"),
        (Some(label), None) => label.to_string(),
        (None, Some(hash)) => hash.to_string(),
        (None, None) => "<unlabelled package>".to_string(),
    }
}
