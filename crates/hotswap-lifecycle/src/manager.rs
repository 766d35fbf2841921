use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use hotswap_core::{
    HostConfig, InstallMode, InstallOptions, LastVersion, PackageMetadata, PackageSlot,
    PendingInstallRecord, ReportingStatus, SafetyNet, StatusReport,
};
use hotswap_store::{PackageRepository, Preferences, StateLayout};

use crate::protocol::{self, describe};
use crate::{
    decide, BuildIdentifier, Decision, FileBuildStamp, LaunchConfiguration, PendingNavigation,
    ReportOutcome, ReportingQueue, Session, StaticBuildTime, Trigger, UiHost,
};

/// State change a handler committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Deferred(InstallMode),
    Applied(PackageMetadata),
    Confirmed(PackageMetadata),
    RolledBack {
        failed: Option<PackageMetadata>,
        restored: Option<PackageMetadata>,
    },
    /// Process start resumed the already-installed current package.
    Launched(PackageMetadata),
    /// The native build changed under the deployed packages.
    DeploymentsCleaned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRequest {
    pub generation: u64,
    pub delay: Duration,
}

/// What a handler asks of its caller once its state change has committed.
#[derive(Debug, Default)]
pub struct Outcome {
    pub transition: Option<Transition>,
    pub navigation: Option<PendingNavigation>,
    pub timer: Option<TimerRequest>,
    pub reports: Vec<ReportOutcome>,
}

impl Outcome {
    fn idle() -> Self {
        Self::default()
    }

    fn transition(transition: Transition) -> Self {
        Self {
            transition: Some(transition),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub current: Option<PackageMetadata>,
    pub previous: Option<PackageMetadata>,
    pub pending_install: Option<PendingInstallRecord>,
    pub needs_confirmation: bool,
    pub failed_updates: BTreeSet<String>,
    pub last_version: Option<LastVersion>,
    pub failed_report: Option<StatusReport>,
    pub server_url: Option<String>,
}

/// Synchronous update lifecycle state machine.
///
/// Every handler commits its persistent changes before returning; the
/// navigation it yields must be fired by the caller afterwards.
pub struct UpdateManager {
    packages: PackageRepository,
    preferences: Preferences,
    reporting: ReportingQueue,
    host: Arc<dyn UiHost>,
    build: Arc<dyn BuildIdentifier>,
    launch: Arc<dyn LaunchConfiguration>,
    app_version: Option<String>,
    deployment_key: Option<String>,
    bundled_content_dir: Option<PathBuf>,
    session: Session,
    started: bool,
    backgrounded_at: Option<Instant>,
    timer_generation: u64,
    armed_timer: Option<u64>,
}

impl UpdateManager {
    pub fn new(layout: StateLayout, config: &HostConfig, host: Arc<dyn UiHost>) -> Self {
        let preferences = Preferences::open(layout.clone());
        let build: Arc<dyn BuildIdentifier> = match &config.build_stamp_path {
            Some(path) => Arc::new(FileBuildStamp::new(path.clone())),
            None => Arc::new(StaticBuildTime(None)),
        };
        Self {
            packages: PackageRepository::new(layout, config.start_page_name()),
            reporting: ReportingQueue::new(preferences.clone()),
            preferences,
            host,
            build,
            launch: Arc::new(config.clone()),
            app_version: config.app_version.clone(),
            deployment_key: config.deployment_key.clone(),
            bundled_content_dir: config.bundled_content_dir.clone(),
            session: Session::detached(),
            started: false,
            backgrounded_at: None,
            timer_generation: 0,
            armed_timer: None,
        }
    }

    pub fn with_build_identifier(mut self, build: Arc<dyn BuildIdentifier>) -> Self {
        self.build = build;
        self
    }

    pub fn with_launch_configuration(mut self, launch: Arc<dyn LaunchConfiguration>) -> Self {
        self.launch = launch;
        self
    }

    pub fn packages(&self) -> &PackageRepository {
        &self.packages
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn host(&self) -> Arc<dyn UiHost> {
        Arc::clone(&self.host)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn bundled_content_dir(&self) -> Option<&Path> {
        self.bundled_content_dir.as_deref()
    }

    pub fn attach(&mut self) {
        self.session.teardown();
        self.session = Session::attach();
        tracing::debug!("host attached, new session started");
    }

    pub fn teardown(&mut self) {
        self.session.teardown();
        tracing::debug!("host torn down");
    }

    /// Clears host history once after a core-initiated navigation.
    pub fn page_finished(&mut self) -> bool {
        if !self.session.take_history_clear() {
            return false;
        }
        self.host.clear_history();
        true
    }

    pub fn install(
        &mut self,
        package: PackageMetadata,
        options: InstallOptions,
    ) -> Result<Outcome> {
        if self.preferences.install_needs_confirmation() {
            bail!(
                "cannot install {}: an applied update is still awaiting confirmation",
                describe(&package)
            );
        }
        protocol::validate(&self.packages, &package)?;

        match decide(&options, Trigger::InstallRequest) {
            Decision::ApplyNow => self.apply(Some(&package), options.safety_net),
            Decision::Defer => {
                self.preferences
                    .save_pending_install(&PendingInstallRecord::new(options, package.clone()))?;
                tracing::info!(
                    package = %describe(&package),
                    mode = options.install_mode.as_str(),
                    "install deferred"
                );
                Ok(Outcome::transition(Transition::Deferred(
                    options.install_mode,
                )))
            }
        }
    }

    /// Foreground transition at `now`; the first one is the process start.
    pub fn on_foreground(&mut self, now: Instant) -> Result<Outcome> {
        if !self.started {
            return self.process_start();
        }
        let background = self
            .backgrounded_at
            .take()
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default();
        self.resume(background)
    }

    pub fn on_background(&mut self, now: Instant) {
        self.backgrounded_at = Some(now);
    }

    pub fn process_start(&mut self) -> Result<Outcome> {
        self.started = true;
        if self.preferences.install_needs_confirmation() {
            tracing::warn!("previous update was never confirmed");
            return self.rollback();
        }

        let mut outcome = self.evaluate_pending(Trigger::ProcessStart)?;
        if outcome.transition.is_none() {
            outcome = self.check_installed_package()?;
            if self.packages.read(PackageSlot::Current).is_none() {
                if let Some(report) = self.store_version_report() {
                    let result = self.reporting.enqueue(report, self.host.as_ref())?;
                    outcome.reports.push(result);
                }
            }
        }
        self.retry_failed_report_if_idle(outcome)
    }

    pub fn resume(&mut self, background: Duration) -> Result<Outcome> {
        self.started = true;
        let outcome = self.evaluate_pending(Trigger::Resume { background })?;
        self.retry_failed_report_if_idle(outcome)
    }

    pub fn confirm(&mut self) -> Result<Outcome> {
        let Some(package) = protocol::confirm(&self.packages, &self.preferences)? else {
            tracing::debug!("no update awaiting confirmation");
            return Ok(Outcome::idle());
        };
        self.armed_timer = None;

        let mut outcome = Outcome::transition(Transition::Confirmed(package.clone()));
        let report = StatusReport::for_package(ReportingStatus::UpdateConfirmed, &package);
        outcome
            .reports
            .push(self.reporting.enqueue(report, self.host.as_ref())?);
        Ok(outcome)
    }

    pub fn timer_expired(&mut self, generation: u64) -> Result<Outcome> {
        if self.armed_timer != Some(generation) {
            tracing::debug!(generation, "stale rollback timer ignored");
            return Ok(Outcome::idle());
        }
        self.expire_safety_net()
    }

    /// Treats the safety net as expired: an unconfirmed update rolls back.
    pub fn expire_safety_net(&mut self) -> Result<Outcome> {
        self.armed_timer = None;
        if !self.preferences.install_needs_confirmation() {
            tracing::debug!("safety net expired with nothing awaiting confirmation");
            return Ok(Outcome::idle());
        }
        self.rollback()
    }

    pub fn is_first_run(&self, package_hash: &str) -> bool {
        if package_hash.is_empty() || !self.session.did_update() {
            return false;
        }
        self.packages
            .read(PackageSlot::Current)
            .is_some_and(|current| current.has_hash(package_hash))
    }

    pub fn is_failed_update(&self, package_hash: Option<&str>) -> bool {
        self.preferences.is_failed_update(package_hash)
    }

    pub fn clear_failed_updates(&self) -> Result<()> {
        self.preferences.clear_failed_updates()
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            current: self.packages.read(PackageSlot::Current),
            previous: self.packages.read(PackageSlot::Previous),
            pending_install: self.preferences.pending_install(),
            needs_confirmation: self.preferences.install_needs_confirmation(),
            failed_updates: self.preferences.failed_updates(),
            last_version: self.preferences.last_version(),
            failed_report: self.preferences.failed_report(),
            server_url: self.launch.server_url(),
        }
    }

    fn evaluate_pending(&mut self, trigger: Trigger) -> Result<Outcome> {
        let Some(record) = self.preferences.pending_install() else {
            return Ok(Outcome::idle());
        };
        match decide(&record.options, trigger) {
            Decision::ApplyNow => {
                if let Err(err) = self.check_applicable(record.package.as_ref()) {
                    tracing::warn!(
                        mode = record.options.install_mode.as_str(),
                        error = %err,
                        "discarding pending install that can no longer be applied"
                    );
                    self.preferences.clear_pending_install()?;
                    return Ok(Outcome::idle());
                }
                tracing::info!(
                    mode = record.options.install_mode.as_str(),
                    trigger = ?trigger,
                    "applying pending install"
                );
                self.apply(record.package.as_ref(), record.options.safety_net)
            }
            Decision::Defer => {
                tracing::debug!(
                    mode = record.options.install_mode.as_str(),
                    trigger = ?trigger,
                    "pending install not yet due"
                );
                Ok(Outcome::idle())
            }
        }
    }

    fn check_applicable(&self, staged: Option<&PackageMetadata>) -> Result<()> {
        match staged {
            Some(package) => protocol::validate(&self.packages, package).map(drop),
            None => match self.packages.read(PackageSlot::Current) {
                Some(current) => protocol::validate(&self.packages, &current).map(drop),
                None => bail!("pending install has no package and no current package exists"),
            },
        }
    }

    fn apply(
        &mut self,
        staged: Option<&PackageMetadata>,
        safety_net: SafetyNet,
    ) -> Result<Outcome> {
        let applied = protocol::apply(&self.packages, &self.preferences, staged)?;
        self.session.mark_updated();

        let mut outcome = Outcome::transition(Transition::Applied(applied.package.clone()));
        outcome.navigation = Some(self.session.navigation(applied.start_page_url));

        if safety_net.is_unprotected() {
            tracing::warn!("rollback protection disabled, committing update immediately");
            let confirmed = self.confirm()?;
            outcome.reports.extend(confirmed.reports);
        } else if let Some(delay) = safety_net.timer_delay() {
            self.timer_generation += 1;
            self.armed_timer = Some(self.timer_generation);
            outcome.timer = Some(TimerRequest {
                generation: self.timer_generation,
                delay,
            });
            tracing::debug!(
                generation = self.timer_generation,
                delay_ms = delay.as_millis() as u64,
                "rollback timer armed"
            );
        }
        Ok(outcome)
    }

    fn rollback(&mut self) -> Result<Outcome> {
        self.armed_timer = None;
        let rolled_back =
            protocol::rollback(&self.packages, &self.preferences, self.launch.as_ref())?;

        let mut outcome = Outcome::transition(Transition::RolledBack {
            failed: rolled_back.failed.clone(),
            restored: rolled_back.restored.clone(),
        });
        outcome.navigation = Some(self.session.navigation(rolled_back.navigation_url));
        if let Some(failed) = &rolled_back.failed {
            let report = StatusReport::for_package(ReportingStatus::UpdateRolledBack, failed);
            outcome
                .reports
                .push(self.reporting.enqueue(report, self.host.as_ref())?);
        }
        Ok(outcome)
    }

    fn check_installed_package(&mut self) -> Result<Outcome> {
        let Some(current) = self.packages.read(PackageSlot::Current) else {
            return Ok(Outcome::idle());
        };
        let (Some(deployed), Some(native)) = (
            current.native_build_time.as_deref(),
            self.build.native_build_time(),
        ) else {
            return Ok(Outcome::idle());
        };

        if deployed == native {
            let Some(url) = self.packages.start_page_url(&current) else {
                tracing::warn!(
                    package = %describe(&current),
                    "current package has no start page, launching bundled content"
                );
                return Ok(Outcome::idle());
            };
            let mut outcome = Outcome::transition(Transition::Launched(current));
            outcome.navigation = Some(self.session.navigation(url));
            return Ok(outcome);
        }

        tracing::info!(
            deployed,
            native = %native,
            "native build changed, discarding deployed packages"
        );
        if let Err(err) = self.packages.clean_deployments() {
            tracing::warn!(error = %err, "failed to remove deployed packages");
        }
        self.preferences.clear_failed_updates()?;
        Ok(Outcome::transition(Transition::DeploymentsCleaned))
    }

    fn store_version_report(&self) -> Option<StatusReport> {
        let configured = LastVersion {
            label_or_app_version: self.app_version.clone(),
            deployment_key: self.deployment_key.clone(),
        };
        if self.preferences.last_version().as_ref() == Some(&configured) {
            return None;
        }
        Some(StatusReport::new(
            ReportingStatus::StoreVersion,
            None,
            self.app_version.clone(),
            self.deployment_key.clone(),
        ))
    }

    fn retry_failed_report_if_idle(&mut self, mut outcome: Outcome) -> Result<Outcome> {
        let acted = outcome.navigation.is_some()
            || !outcome.reports.is_empty()
            || matches!(
                outcome.transition,
                Some(Transition::Applied(_)) | Some(Transition::RolledBack { .. })
            );
        if acted {
            return Ok(outcome);
        }
        if let Some(result) = self.reporting.retry_failed(self.host.as_ref())? {
            outcome.reports.push(result);
        }
        Ok(outcome)
    }
}
