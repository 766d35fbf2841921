use std::time::Duration;

use serde_json::json;

use super::*;

fn sample_package() -> PackageMetadata {
    PackageMetadata {
        deployment_key: Some("dk-production".to_string()),
        description: Some("fix login".to_string()),
        label: Some("v7".to_string()),
        app_version: Some("2.1.0".to_string()),
        is_mandatory: false,
        package_hash: Some("aa11".to_string()),
        package_size: Some(4096),
        native_build_time: Some("1700000000000".to_string()),
        local_path: Some("/codepush/deploy/versions/aa11".to_string()),
    }
}

#[test]
fn parse_metadata_with_all_fields() {
    let raw = r#"{
        "deploymentKey": "dk-production",
        "description": "fix login",
        "label": "v7",
        "appVersion": "2.1.0",
        "isMandatory": true,
        "packageHash": "aa11",
        "packageSize": 4096,
        "nativeBuildTime": "1700000000000",
        "localPath": "/codepush/deploy/versions/aa11"
    }"#;
    let parsed = PackageMetadata::from_json_str(raw).expect("metadata should parse");
    assert_eq!(parsed.label.as_deref(), Some("v7"));
    assert!(parsed.is_mandatory);
    assert_eq!(parsed.package_size, Some(4096));
    assert_eq!(
        parsed.local_path.as_deref(),
        Some("/codepush/deploy/versions/aa11")
    );
}

#[test]
fn parse_metadata_keeps_missing_fields_absent() {
    let raw = r#"{"packageHash": "bb22", "somethingNew": [1, 2, 3]}"#;
    let parsed = PackageMetadata::from_json_str(raw).expect("metadata should parse");
    assert_eq!(parsed.package_hash.as_deref(), Some("bb22"));
    assert!(parsed.label.is_none());
    assert!(parsed.deployment_key.is_none());
    assert!(parsed.package_size.is_none());
    assert!(!parsed.is_mandatory);
}

#[test]
fn serialized_metadata_omits_absent_fields() {
    let metadata = PackageMetadata {
        label: Some("v1".to_string()),
        ..PackageMetadata::default()
    };
    let raw = metadata.to_json_string().expect("must serialize");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
    assert_eq!(value, json!({"label": "v1", "isMandatory": false}));
}

#[test]
fn label_takes_precedence_over_app_version() {
    let mut metadata = sample_package();
    assert_eq!(metadata.label_or_app_version(), Some("v7"));
    metadata.label = Some(String::new());
    assert_eq!(metadata.label_or_app_version(), Some("2.1.0"));
    metadata.label = None;
    assert_eq!(metadata.label_or_app_version(), Some("2.1.0"));
}

#[test]
fn has_hash_rejects_empty_hash() {
    let metadata = sample_package();
    assert!(metadata.has_hash("aa11"));
    assert!(!metadata.has_hash(""));
    assert!(!metadata.has_hash("zz"));
}

#[test]
fn install_mode_codes_are_stable() {
    assert_eq!(InstallMode::Immediate.code(), 0);
    assert_eq!(InstallMode::OnNextRestart.code(), 1);
    assert_eq!(InstallMode::OnNextResume.code(), 2);
    assert_eq!(
        InstallMode::from_code(2).expect("known code"),
        InstallMode::OnNextResume
    );
}

#[test]
fn install_mode_rejects_unknown_values() {
    let err = InstallMode::from_code(7).expect_err("unknown code must fail");
    assert!(err.to_string().contains("invalid install mode code 7"));

    let err = InstallMode::parse("someday").expect_err("unknown name must fail");
    assert!(err.to_string().contains("invalid install mode 'someday'"));
}

#[test]
fn install_mode_parse_accepts_aliases() {
    assert_eq!(
        InstallMode::parse("ON_NEXT_RESUME").expect("must parse"),
        InstallMode::OnNextResume
    );
    assert_eq!(
        InstallMode::parse("restart").expect("must parse"),
        InstallMode::OnNextRestart
    );
    assert_eq!(
        InstallMode::parse(" immediate ").expect("must parse"),
        InstallMode::Immediate
    );
}

#[test]
fn timer_safety_net_without_positive_timeout_is_unprotected() {
    let disabled = SafetyNet::Timer {
        rollback_timeout_ms: 0,
    };
    assert!(disabled.is_unprotected());
    assert_eq!(disabled.timer_delay(), None);

    let armed = SafetyNet::Timer {
        rollback_timeout_ms: 1500,
    };
    assert!(!armed.is_unprotected());
    assert_eq!(armed.timer_delay(), Some(Duration::from_millis(1500)));

    assert!(!SafetyNet::ConfirmationFlag.is_unprotected());
    assert_eq!(SafetyNet::ConfirmationFlag.timer_delay(), None);
}

#[test]
fn pending_install_current_schema_round_trip() {
    let record = PendingInstallRecord::new(
        InstallOptions::new(InstallMode::OnNextResume).with_minimum_background_duration(30),
        sample_package(),
    );
    let value = record.to_value().expect("must serialize");
    assert_eq!(value["schema"], json!(PENDING_INSTALL_SCHEMA));
    assert_eq!(value["installMode"], json!(2));
    assert_eq!(value["safetyNet"], json!({"kind": "confirmationFlag"}));

    let migrated = PendingInstallRecord::migrate(&value).expect("must read back");
    assert_eq!(migrated, record);
}

#[test]
fn pending_install_migrates_bare_mode_integer() {
    let migrated = PendingInstallRecord::migrate(&json!(1)).expect("schema 0 must migrate");
    assert_eq!(migrated.options.install_mode, InstallMode::OnNextRestart);
    assert_eq!(migrated.options.minimum_background_duration, 0);
    assert_eq!(migrated.options.safety_net, SafetyNet::ConfirmationFlag);
    assert!(migrated.package.is_none());
}

#[test]
fn pending_install_migrates_unversioned_object() {
    let migrated = PendingInstallRecord::migrate(&json!({
        "installMode": 2,
        "minimumBackgroundDuration": 45
    }))
    .expect("schema 1 must migrate");
    assert_eq!(migrated.options.install_mode, InstallMode::OnNextResume);
    assert_eq!(migrated.options.minimum_background_duration, 45);
    assert_eq!(migrated.options.safety_net, SafetyNet::ConfirmationFlag);
}

#[test]
fn pending_install_migrates_legacy_rollback_timeout() {
    let migrated = PendingInstallRecord::migrate(&json!({
        "installMode": 1,
        "rollbackTimeout": 10000
    }))
    .expect("legacy timer shape must migrate");
    assert_eq!(
        migrated.options.safety_net,
        SafetyNet::Timer {
            rollback_timeout_ms: 10000
        }
    );
}

#[test]
fn pending_install_rejects_unknown_schema_and_mode() {
    let err = PendingInstallRecord::migrate(&json!({"schema": 9, "installMode": 0}))
        .expect_err("future schema must fail");
    assert!(err.to_string().contains("unsupported pending install schema 9"));

    PendingInstallRecord::migrate(&json!(5)).expect_err("unknown mode must fail");
    PendingInstallRecord::migrate(&json!("soon")).expect_err("string must fail");
}

#[test]
fn status_report_serializes_status_code_and_skips_absent_fields() {
    let report = StatusReport::new(
        ReportingStatus::UpdateConfirmed,
        Some("v7".to_string()),
        None,
        Some("dk".to_string()),
    );
    let raw = report.to_json_string().expect("must serialize");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
    assert_eq!(
        value,
        json!({"status": 1, "label": "v7", "deploymentKey": "dk"})
    );
    assert_eq!(
        StatusReport::from_json_str(&raw).expect("must parse"),
        report
    );
}

#[test]
fn status_report_rejects_unknown_status_code() {
    StatusReport::from_json_str(r#"{"status": 4}"#).expect_err("unknown status must fail");
}

#[test]
fn status_report_deployment_key_must_be_non_empty() {
    let mut report = StatusReport::for_package(ReportingStatus::StoreVersion, &sample_package());
    assert!(report.has_deployment_key());
    report.deployment_key = Some(String::new());
    assert!(!report.has_deployment_key());
    report.deployment_key = None;
    assert!(!report.has_deployment_key());
}

#[test]
fn version_pointer_prefers_label() {
    let report = StatusReport::for_package(ReportingStatus::UpdateConfirmed, &sample_package());
    assert_eq!(
        report.version_pointer(),
        LastVersion {
            label_or_app_version: Some("v7".to_string()),
            deployment_key: Some("dk-production".to_string()),
        }
    );

    let store = StatusReport::new(
        ReportingStatus::StoreVersion,
        None,
        Some("2.1.0".to_string()),
        Some("dk".to_string()),
    );
    assert_eq!(
        store.version_pointer().label_or_app_version.as_deref(),
        Some("2.1.0")
    );
}

#[test]
fn report_call_renders_absent_arguments_as_undefined() {
    let report = StatusReport::new(
        ReportingStatus::UpdateRolledBack,
        Some("v8".to_string()),
        Some(String::new()),
        Some("dk".to_string()),
    )
    .with_last_version(None);
    assert_eq!(
        report.to_call().to_string(),
        r#"reportStatus(2, "v8", "", "dk", undefined, undefined)"#
    );
}

#[test]
fn report_call_carries_previous_version() {
    let last = LastVersion {
        label_or_app_version: Some("v6".to_string()),
        deployment_key: Some("dk".to_string()),
    };
    let report = StatusReport::for_package(ReportingStatus::UpdateConfirmed, &sample_package())
        .with_last_version(Some(&last));
    let call = report.to_call();
    assert_eq!(call.previous_label_or_app_version.as_deref(), Some("v6"));
    assert_eq!(call.arguments()[4], r#""v6""#);
}

#[test]
fn report_call_escapes_quotes() {
    let report = StatusReport::new(
        ReportingStatus::StoreVersion,
        Some("it's \"quoted\"".to_string()),
        None,
        Some("dk".to_string()),
    );
    assert_eq!(report.to_call().arguments()[1], r#""it's \"quoted\"""#);
}

#[test]
fn parse_host_config() {
    let content = r#"
version = 1
launch_url = "file:///android_asset/www/main.html"
app_version = "2.1.0"
deployment_key = "dk-production"
state_dir = "/var/lib/app"

[safety_net]
mode = "timer"
rollback_timeout_ms = 5000
"#;
    let config = HostConfig::from_toml_str(content).expect("config should parse");
    assert_eq!(config.start_page_name(), "main.html");
    assert_eq!(config.app_version.as_deref(), Some("2.1.0"));
    assert_eq!(
        config.safety_net(),
        SafetyNet::Timer {
            rollback_timeout_ms: 5000
        }
    );
    assert_eq!(
        config.state_root().expect("state root"),
        std::path::PathBuf::from("/var/lib/app")
    );
}

#[test]
fn host_config_defaults_to_flag_safety_net() {
    let config = HostConfig::from_toml_str("").expect("empty config should parse");
    assert_eq!(config.safety_net(), SafetyNet::ConfirmationFlag);
    assert_eq!(config.start_page_name(), "index.html");
}

#[test]
fn host_config_rejects_unsupported_version() {
    let err = HostConfig::from_toml_str("version = 3").expect_err("must reject version");
    assert!(err
        .to_string()
        .contains("unsupported hotswap config version 3"));
}

#[test]
fn host_config_keeps_foreign_launch_url_as_start_page() {
    let config = HostConfig::from_toml_str(r#"launch_url = "https://app.example.test/""#)
        .expect("config should parse");
    assert_eq!(config.start_page_name(), "https://app.example.test/");
}

#[test]
fn host_config_missing_file_falls_back_to_defaults() {
    let path = std::env::temp_dir().join(format!(
        "hotswap-core-missing-config-{}.toml",
        std::process::id()
    ));
    let config = HostConfig::load_or_default(&path).expect("missing file is not an error");
    assert_eq!(config, HostConfig::default());
}
