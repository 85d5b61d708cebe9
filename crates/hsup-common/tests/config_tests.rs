//! ---
//! hsup_section: "01-core-functionality"
//! hsup_subsection: "tests"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Shared primitives and utilities for the supervisor runtime."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use hsup_common::config::AppConfig;
use hsup_common::LogFormat;
use tempfile::tempdir;

#[test]
fn empty_document_uses_defaults() {
    let config = AppConfig::from_str("").expect("defaults are valid");
    assert_eq!(config.data_dir, PathBuf::from("/data"));
    assert_eq!(config.update.interval, Duration::from_secs(28_800));
    assert_eq!(config.install.retry_delay, Duration::from_secs(60));
    assert_eq!(config.install.max_attempts, None);
    assert_eq!(config.api.listen.port(), 80);
    assert_eq!(config.logging.format, LogFormat::StructuredJson);
    assert_eq!(
        config.system_config_path(),
        PathBuf::from("/data/config.json")
    );
}

#[test]
fn durations_are_read_as_seconds() {
    let config = AppConfig::from_str(
        r#"
data_dir = "/srv/hsup"

[update]
interval = 600

[install]
retry_delay = 5
max_attempts = 3

[logging]
format = "pretty"
"#,
    )
    .expect("valid configuration");
    assert_eq!(config.update.interval, Duration::from_secs(600));
    assert_eq!(config.install.retry_delay, Duration::from_secs(5));
    assert_eq!(config.install.max_attempts, Some(3));
    assert_eq!(config.logging.format, LogFormat::Pretty);
    assert_eq!(
        config.homeassistant_config_dir(),
        PathBuf::from("/srv/hsup/homeassistant")
    );
}

#[test]
fn rejects_zero_retry_delay() {
    let err = AppConfig::from_str("[install]\nretry_delay = 0\n").unwrap_err();
    assert!(err.to_string().contains("retry_delay"));
}

#[test]
fn rejects_invalid_update_url() {
    let err = AppConfig::from_str("[update]\nurl = \"not a url\"\n").unwrap_err();
    assert!(err.to_string().contains("update url"));
}

#[test]
fn rejects_tagged_application_image() {
    let err =
        AppConfig::from_str("[docker]\nhomeassistant_image = \"homeassistant/home-assistant:0.40\"\n")
            .unwrap_err();
    assert!(err.to_string().contains("must not carry a tag"));

    AppConfig::from_str("[docker]\nhomeassistant_image = \"registry.local:5000/home-assistant\"\n")
        .expect("registry ports are not tags");
}

#[test]
fn load_picks_first_existing_candidate() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("missing.toml");
    let present = dir.path().join("hsup.toml");
    std::fs::write(&present, "data_dir = \"/var/lib/hsup\"\n").expect("write config");

    let loaded = AppConfig::load_with_source(&[missing.clone(), present.clone()])
        .expect("config loads");
    assert_eq!(loaded.source, present);
    assert_eq!(loaded.config.data_dir, PathBuf::from("/var/lib/hsup"));

    let err = AppConfig::load(&[missing]).unwrap_err();
    assert!(err.to_string().contains("no configuration files found"));
}

#[test]
fn shipped_reference_config_is_valid() {
    let config = AppConfig::from_str(include_str!("../../../configs/hsup.toml"))
        .expect("reference config parses");
    assert_eq!(config.update.interval, Duration::from_secs(28_800));
    assert_eq!(
        config.host_control.socket,
        PathBuf::from("/var/run/hassio_hc.sock")
    );
}
