// crates/piste-core/src/config/tests/config_tests.rs
#![cfg(test)]

use std::fs;
use std::path::Path;

use tempfile::tempdir;

use crate::config::{ConfigError, ConfigFormat, RegistryConfig};

#[test]
fn test_defaults() {
    let config = RegistryConfig::default();
    assert!(!config.debug);
    assert!(config.auto_singletons);
    assert_eq!(config.utilities, None);
}

#[test]
fn test_format_from_path() {
    assert_eq!(ConfigFormat::from_path(Path::new("piste.json")), Some(ConfigFormat::Json));
    assert_eq!(ConfigFormat::from_path(Path::new("PISTE.JSON")), Some(ConfigFormat::Json));
    #[cfg(feature = "yaml-config")]
    {
        assert_eq!(ConfigFormat::from_path(Path::new("piste.yaml")), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_path(Path::new("piste.yml")), Some(ConfigFormat::Yaml));
    }
    #[cfg(feature = "toml-config")]
    assert_eq!(ConfigFormat::from_path(Path::new("piste.toml")), Some(ConfigFormat::Toml));
    assert_eq!(ConfigFormat::from_path(Path::new("piste.ini")), None);
    assert_eq!(ConfigFormat::from_path(Path::new("piste")), None);
    assert_eq!(ConfigFormat::Json.extension(), "json");
}

#[test]
fn test_parse_json_with_partial_fields() {
    let config = RegistryConfig::from_content(r#"{"debug": true}"#, ConfigFormat::Json).unwrap();
    assert!(config.debug);
    assert!(config.auto_singletons, "missing fields keep their defaults");
}

#[cfg(feature = "toml-config")]
#[test]
fn test_parse_toml() {
    let content = r#"
        debug = true
        auto_singletons = false
        utilities = ["slug"]
    "#;
    let config = RegistryConfig::from_content(content, ConfigFormat::Toml).unwrap();
    assert_eq!(
        config,
        RegistryConfig {
            debug: true,
            auto_singletons: false,
            utilities: Some(vec!["slug".to_string()]),
        }
    );
}

#[cfg(feature = "yaml-config")]
#[test]
fn test_parse_yaml() {
    let content = "auto_singletons: false\nutilities:\n  - slug\n  - clock\n";
    let config = RegistryConfig::from_content(content, ConfigFormat::Yaml).unwrap();
    assert!(!config.debug);
    assert!(!config.auto_singletons);
    assert_eq!(config.utilities, Some(vec!["slug".to_string(), "clock".to_string()]));
}

#[test]
fn test_parse_error_names_format() {
    let err = RegistryConfig::from_content("{not json", ConfigFormat::Json).unwrap_err();
    match err {
        ConfigError::Parse { format, .. } => assert_eq!(format, ConfigFormat::Json),
        other => panic!("Expected parse error, got {:?}", other),
    }
}

#[test]
fn test_from_path_reads_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("piste.json");
    fs::write(&path, r#"{"debug": true, "utilities": []}"#).unwrap();

    let config = RegistryConfig::from_path(&path).unwrap();
    assert!(config.debug);
    assert_eq!(config.utilities, Some(Vec::new()));
}

#[test]
fn test_from_path_missing_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let err = RegistryConfig::from_path(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_from_path_unsupported_extension() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("piste.ini");
    fs::write(&path, "debug=true").unwrap();

    let err = RegistryConfig::from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    assert!(err.to_string().contains("piste.ini"));
}
