//! Integration tests for Settings config loading with layered merge semantics.
//!
//! These tests run without a global config (temp directories only), so the
//! local `.treeplanter.toml` merges onto the compiled defaults.

use std::fs;

use tempfile::TempDir;

use treeplanter::config::Settings;
use treeplanter::domain::{TreeType, IGNORED_ASCENDANCIES};

#[test]
fn given_local_config_with_new_ascendancy_when_load_then_unions_with_defaults() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".treeplanter.toml"),
        r#"
[selection]
excluded_ascendancies = ["Warden"]
"#,
    )
    .unwrap();

    let settings = Settings::load(Some(dir.path())).expect("load settings");

    let names = &settings.selection.excluded_ascendancies;
    assert!(names.contains(&"Warden".to_string()));
    assert!(names.contains(&"Raider".to_string()));
    assert_eq!(names.len(), IGNORED_ASCENDANCIES.len() + 1);
}

#[test]
fn given_local_config_with_negation_when_load_then_removes_inherited_name() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".treeplanter.toml"),
        r#"
[selection]
excluded_ascendancies = ["!Raider", "!Deadeye"]
"#,
    )
    .unwrap();

    let settings = Settings::load(Some(dir.path())).expect("load settings");

    let names = &settings.selection.excluded_ascendancies;
    assert!(!names.contains(&"Raider".to_string()));
    assert!(!names.contains(&"Deadeye".to_string()));
    assert_eq!(names.len(), IGNORED_ASCENDANCIES.len() - 2);
}

#[test]
fn given_local_scalars_and_starters_when_load_then_replace_defaults() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".treeplanter.toml"),
        r#"
base_dir = "/tmp/treeplanter-test"
settle_delay_ms = 40
max_ticks = 10

[auto_advance]
atlas = false

[selection]
starter_nodes = [1, 2]
"#,
    )
    .unwrap();

    let settings = Settings::load(Some(dir.path())).expect("load settings");

    assert_eq!(settings.settle_delay_ms, 40);
    assert_eq!(settings.max_ticks, 10);
    assert_eq!(settings.advance_cooldown_ms, 250);
    assert!(settings.auto_advance.enabled(TreeType::Character));
    assert!(!settings.auto_advance.enabled(TreeType::Atlas));
    assert_eq!(settings.selection.starter_nodes, vec![1, 2]);
    assert_eq!(
        settings.dataset_path(TreeType::Atlas),
        std::path::PathBuf::from("/tmp/treeplanter-test/data/atlas.json")
    );
}

#[test]
fn given_no_local_config_when_load_then_defaults() {
    let dir = TempDir::new().unwrap();

    let settings = Settings::load(Some(dir.path())).expect("load settings");

    assert_eq!(settings.settle_delay_ms, 250);
    assert_eq!(settings.max_ticks, 2000);
    assert!(settings.selection.starter_nodes.contains(&39725));
}

#[test]
fn given_invalid_local_config_when_load_then_config_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".treeplanter.toml"), "settle_delay_ms = \"soon\"").unwrap();

    let err = Settings::load(Some(dir.path())).unwrap_err();

    assert!(err.to_string().contains("config error"));
}

#[test]
fn given_loaded_settings_when_rendering_toml_then_round_trips() {
    let dir = TempDir::new().unwrap();
    let settings = Settings::load(Some(dir.path())).expect("load settings");

    let rendered = settings.to_toml().unwrap();
    let parsed: Settings = toml::from_str(&rendered).unwrap();

    assert_eq!(parsed, settings);
}
