use std::io::IsTerminal;

use anstyle::{AnsiColor, Effects, Style};
use hotswap_core::{PackageMetadata, ReportCall};
use hotswap_lifecycle::{ReportOutcome, StatusSnapshot, Transition, UiHost};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool, _stderr_is_tty: bool) -> OutputStyle {
    if stdout_is_tty {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn current_output_style() -> OutputStyle {
    resolve_output_style(
        std::io::stdout().is_terminal(),
        std::io::stderr().is_terminal(),
    )
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => {
            let badge = match status {
                "ok" => "[OK]",
                "warn" => "[WARN]",
                "err" => "[ERR]",
                _ => "[..]",
            };
            format!("{badge} {message}")
        }
    }
}

pub(crate) fn render_section_header(style: OutputStyle, title: &str) -> Option<String> {
    match style {
        OutputStyle::Plain => None,
        OutputStyle::Rich => Some(colorize(section_style(), &format!("== {title} =="))),
    }
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub(crate) fn describe_package(package: &PackageMetadata) -> String {
    let label = package.label_or_app_version().unwrap_or("<unlabelled>");
    match package.package_hash.as_deref() {
        Some(hash) => format!("{label} (hash={hash})"),
        None => label.to_string(),
    }
}

pub(crate) fn format_transition_line(style: OutputStyle, transition: Option<&Transition>) -> String {
    match transition {
        None => render_status_line(style, "step", "no lifecycle action taken"),
        Some(Transition::Deferred(mode)) => render_status_line(
            style,
            "ok",
            &format!("install deferred (mode={})", mode.as_str()),
        ),
        Some(Transition::Applied(package)) => render_status_line(
            style,
            "ok",
            &format!("applied {} (awaiting confirmation)", describe_package(package)),
        ),
        Some(Transition::Confirmed(package)) => render_status_line(
            style,
            "ok",
            &format!("confirmed {}", describe_package(package)),
        ),
        Some(Transition::RolledBack { failed, restored }) => {
            let failed = failed
                .as_ref()
                .map(describe_package)
                .unwrap_or_else(|| "<none>".to_string());
            let restored = restored
                .as_ref()
                .map(describe_package)
                .unwrap_or_else(|| "bundled content".to_string());
            render_status_line(
                style,
                "warn",
                &format!("rolled back {failed}; now running {restored}"),
            )
        }
        Some(Transition::Launched(package)) => render_status_line(
            style,
            "ok",
            &format!("launching {}", describe_package(package)),
        ),
        Some(Transition::DeploymentsCleaned) => render_status_line(
            style,
            "warn",
            "native build changed; deployed packages removed",
        ),
    }
}

pub(crate) fn format_report_outcome_line(style: OutputStyle, outcome: ReportOutcome) -> String {
    let (status, message) = match outcome {
        ReportOutcome::Dropped => ("warn", "status report dropped (no deployment key)"),
        ReportOutcome::Duplicate => ("step", "status report skipped (already reported)"),
        ReportOutcome::Delivered => ("ok", "status report delivered"),
        ReportOutcome::Persisted => ("warn", "status report kept for retry"),
    };
    render_status_line(style, status, message)
}

pub(crate) fn format_status_lines(snapshot: &StatusSnapshot, style: OutputStyle) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(header) = render_section_header(style, "status") {
        lines.push(header);
    }

    let slot = |name: &str, package: Option<&PackageMetadata>| match package {
        Some(package) => format!("{name}: {}", describe_package(package)),
        None => format!("{name}: none"),
    };
    lines.push(render_status_line(
        style,
        "step",
        &slot("current", snapshot.current.as_ref()),
    ));
    lines.push(render_status_line(
        style,
        "step",
        &slot("previous", snapshot.previous.as_ref()),
    ));

    let pending = match &snapshot.pending_install {
        Some(record) => {
            let package = record
                .package
                .as_ref()
                .map(describe_package)
                .unwrap_or_else(|| "current package".to_string());
            format!(
                "pending install: {package} (mode={} min-background={}s)",
                record.options.install_mode.as_str(),
                record.options.minimum_background_duration
            )
        }
        None => "pending install: none".to_string(),
    };
    lines.push(render_status_line(style, "step", &pending));

    if snapshot.needs_confirmation {
        lines.push(render_status_line(
            style,
            "warn",
            "applied update awaiting confirmation",
        ));
    }

    let failed = if snapshot.failed_updates.is_empty() {
        "failed updates: none".to_string()
    } else {
        format!(
            "failed updates: {}",
            snapshot
                .failed_updates
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        )
    };
    lines.push(render_status_line(style, "step", &failed));

    let last_version = snapshot
        .last_version
        .as_ref()
        .map(|last| {
            format!(
                "last reported version: {} (deployment key={})",
                last.label_or_app_version.as_deref().unwrap_or("<unknown>"),
                last.deployment_key.as_deref().unwrap_or("<none>")
            )
        })
        .unwrap_or_else(|| "last reported version: none".to_string());
    lines.push(render_status_line(style, "step", &last_version));

    if let Some(server_url) = &snapshot.server_url {
        lines.push(render_status_line(
            style,
            "step",
            &format!("update server: {server_url}"),
        ));
    }

    if let Some(report) = &snapshot.failed_report {
        lines.push(render_status_line(
            style,
            "warn",
            &format!("undelivered status report: {}", report.status.as_str()),
        ));
    }
    lines
}

/// UI host for one-shot invocations: navigations and reports go to stdout.
pub(crate) struct StdoutHost {
    style: OutputStyle,
}

impl StdoutHost {
    pub(crate) fn new(style: OutputStyle) -> Self {
        Self { style }
    }
}

impl UiHost for StdoutHost {
    fn navigate_to(&self, url: &str) {
        println!(
            "{}",
            render_status_line(self.style, "step", &format!("navigate: {url}"))
        );
    }

    fn is_attached(&self) -> bool {
        true
    }

    fn deliver_report(&self, call: &ReportCall) {
        println!(
            "{}",
            render_status_line(self.style, "step", &format!("report: {call}"))
        );
    }
}
