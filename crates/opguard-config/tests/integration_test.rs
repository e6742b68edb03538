//! Integration tests for opguard-config
//!
//! These tests verify the full config loading pipeline with real file system operations.

use opguard_config::testing::TestEnvironment;
use opguard_config::{Config, ConfigError};

#[test]
fn test_load_global_config_from_file() {
    let env = TestEnvironment::new().unwrap();
    env.write_global_config(
        r#"
[log]
level = "debug"
ansi = false

[guard]
min_severity = "WARN"
label_max = 32
"#,
    )
    .unwrap();

    let config = env.load_config().unwrap();
    assert_eq!(config.log.level, "debug");
    assert!(!config.log.ansi);
    assert_eq!(config.guard.min_severity, "WARN");
    assert_eq!(config.guard.label_max, 32);
    // untouched keys keep their defaults
    assert!(config.guard.trace_calls);
}

#[test]
fn test_config_hierarchy_project_overrides_global() {
    let env = TestEnvironment::new().unwrap();
    env.write_global_config("[guard]\nmin_severity = \"WARN\"\nlabel_max = 16\n")
        .unwrap();
    env.write_project_config("[guard]\nmin_severity = \"ERROR\"\ntrace_calls = false\n")
        .unwrap();

    let config = env.load_config().unwrap();
    assert_eq!(config.guard.min_severity, "ERROR");
    assert!(!config.guard.trace_calls);
    assert_eq!(config.guard.label_max, 16);
}

#[test]
fn test_missing_files_yield_defaults() {
    let missing = TestEnvironment::new().unwrap();
    let config = Config::load_from_paths(
        Some(&missing.missing_path("nope/config.toml")),
        Some(&missing.missing_path("also-nope/config.toml")),
    )
    .unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_invalid_toml_is_reported() {
    let env = TestEnvironment::new().unwrap();
    env.write_project_config("[guard\nmin_severity = ").unwrap();

    match env.load_config() {
        Err(ConfigError::Toml(_)) => {}
        other => panic!("expected TOML parse error, got {:?}", other),
    }
}

#[test]
fn test_wrong_type_is_reported() {
    let env = TestEnvironment::new().unwrap();
    env.write_global_config("[guard]\nlabel_max = \"wide\"\n").unwrap();
    assert!(matches!(env.load_config(), Err(ConfigError::Toml(_))));
}

#[test]
fn test_env_overrides_beat_files() {
    let env = TestEnvironment::new().unwrap();
    env.write_project_config("[guard]\nmin_severity = \"ERROR\"\n").unwrap();

    let mut config = env.load_config().unwrap();
    config.apply_env_overrides(|key| match key {
        "OPGUARD_MIN_SEVERITY" => Some("DEBUG".to_string()),
        "OPGUARD_TRACE_CALLS" => Some("off".to_string()),
        _ => None,
    });
    assert_eq!(config.guard.min_severity, "DEBUG");
    assert!(!config.guard.trace_calls);
}

#[test]
fn test_default_toml_parses_back() {
    let text = Config::default_toml().unwrap();
    assert!(text.contains("[log]"));
    assert!(text.contains("[guard]"));
    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed, Config::default());
}
