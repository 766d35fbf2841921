use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use hotswap_core::{default_state_root, HostConfig, InstallOptions, PackageMetadata};
use hotswap_lifecycle::{LifecycleRuntime, Outcome, UpdateManager};
use hotswap_security::ManifestHasher;
use hotswap_store::StateLayout;

use crate::completion::write_completions_script;
use crate::render::{
    current_output_style, format_report_outcome_line, format_status_lines,
    format_transition_line, render_status_line, OutputStyle, StdoutHost,
};
use crate::{Cli, Commands};

const CONFIG_FILE_NAME: &str = "hotswap.toml";

pub(crate) struct CliContext {
    pub(crate) config: HostConfig,
    pub(crate) manager: UpdateManager,
    host: Arc<StdoutHost>,
    style: OutputStyle,
}

impl CliContext {
    pub(crate) fn open(
        config_path: Option<&Path>,
        state_dir: Option<&Path>,
        style: OutputStyle,
    ) -> Result<Self> {
        let config = load_host_config(config_path, state_dir)?;
        let layout = StateLayout::new(config.state_root()?);
        layout.ensure_base_dirs()?;

        let host = Arc::new(StdoutHost::new(style));
        let mut manager = UpdateManager::new(layout, &config, host.clone());
        manager.attach();
        Ok(Self {
            config,
            manager,
            host,
            style,
        })
    }

    fn finish(&self, outcome: Outcome) {
        println!(
            "{}",
            format_transition_line(self.style, outcome.transition.as_ref())
        );
        for report in outcome.reports {
            println!("{}", format_report_outcome_line(self.style, report));
        }
        if let Some(navigation) = outcome.navigation {
            navigation.fire(self.host.as_ref());
        }
        if let Some(timer) = outcome.timer {
            println!(
                "{}",
                render_status_line(
                    self.style,
                    "step",
                    &format!(
                        "rollback timer armed ({} ms); run `hotswap expire` to simulate expiry",
                        timer.delay.as_millis()
                    )
                )
            );
        }
    }
}

pub(crate) fn resolve_config_path(
    config_path: Option<&Path>,
    state_dir: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(path) = config_path {
        return Ok(path.to_path_buf());
    }
    match state_dir {
        Some(dir) => Ok(dir.join(CONFIG_FILE_NAME)),
        None => Ok(default_state_root()?.join(CONFIG_FILE_NAME)),
    }
}

pub(crate) fn load_host_config(
    config_path: Option<&Path>,
    state_dir: Option<&Path>,
) -> Result<HostConfig> {
    let path = resolve_config_path(config_path, state_dir)?;
    tracing::debug!(path = %path.display(), "loading host configuration");
    let mut config = HostConfig::load_or_default(&path)?;
    if let Some(dir) = state_dir {
        config.state_dir = Some(dir.to_path_buf());
    }
    Ok(config)
}

pub(crate) fn read_package_metadata(path: &Path) -> Result<PackageMetadata> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read package metadata: {}", path.display()))?;
    PackageMetadata::from_json_str(&raw)
        .with_context(|| format!("invalid package metadata: {}", path.display()))
}

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    let output_style = current_output_style();
    let config_path = cli.config.as_deref();
    let state_dir = cli.state_dir.as_deref();

    match cli.command {
        Commands::Status => {
            let context = CliContext::open(config_path, state_dir, output_style)?;
            for line in format_status_lines(&context.manager.status(), output_style) {
                println!("{line}");
            }
        }
        Commands::Install {
            metadata,
            mode,
            min_background,
        } => {
            let mut context = CliContext::open(config_path, state_dir, output_style)?;
            let package = read_package_metadata(&metadata)?;
            let options = InstallOptions::new(mode)
                .with_minimum_background_duration(min_background)
                .with_safety_net(context.config.safety_net());
            let outcome = context.manager.install(package, options)?;
            context.finish(outcome);
        }
        Commands::Start => {
            let mut context = CliContext::open(config_path, state_dir, output_style)?;
            let outcome = context.manager.process_start()?;
            context.finish(outcome);
        }
        Commands::Resume { background } => {
            let mut context = CliContext::open(config_path, state_dir, output_style)?;
            let outcome = context.manager.resume(Duration::from_secs(background))?;
            context.finish(outcome);
        }
        Commands::Confirm => {
            let mut context = CliContext::open(config_path, state_dir, output_style)?;
            let outcome = context.manager.confirm()?;
            context.finish(outcome);
        }
        Commands::Expire => {
            let mut context = CliContext::open(config_path, state_dir, output_style)?;
            let outcome = context.manager.expire_safety_net()?;
            context.finish(outcome);
        }
        Commands::Failed { hash } => {
            let context = CliContext::open(config_path, state_dir, output_style)?;
            let line = if context.manager.is_failed_update(Some(&hash)) {
                render_status_line(output_style, "warn", &format!("{hash}: failed update"))
            } else {
                render_status_line(output_style, "ok", &format!("{hash}: not a failed update"))
            };
            println!("{line}");
        }
        Commands::ClearFailed => {
            let context = CliContext::open(config_path, state_dir, output_style)?;
            context.manager.clear_failed_updates()?;
            println!(
                "{}",
                render_status_line(output_style, "ok", "failed updates cleared")
            );
        }
        Commands::Hash { dir } => {
            let context = CliContext::open(config_path, state_dir, output_style)?;
            let (handle, _task) =
                LifecycleRuntime::spawn(context.manager, Arc::new(ManifestHasher));
            println!("{}", handle.compute_hash(dir).await?);
        }
        Commands::BinaryHash => {
            let context = CliContext::open(config_path, state_dir, output_style)?;
            let (handle, _task) =
                LifecycleRuntime::spawn(context.manager, Arc::new(ManifestHasher));
            println!("{}", handle.binary_hash().await?);
        }
        Commands::Completions { shell } => {
            let mut stdout = std::io::stdout();
            write_completions_script(shell, &mut stdout)?;
        }
    }

    Ok(())
}
