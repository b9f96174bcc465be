//! Tests for configuration loading and root folder resolution
//!
//! Tests that manipulate STAGEHAND_* environment variables are marked with
//! #[serial] so they run sequentially.

use serial_test::serial;
use stagehand_common::config::{
    default_root_folder, locate_config_file, RootFolderInitializer, RootFolderResolver,
    TomlConfig, ENV_CONFIG, ENV_JWT_SECRET, ENV_ROOT, ENV_ROOT_FOLDER,
};
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_env() {
    env::remove_var(ENV_ROOT_FOLDER);
    env::remove_var(ENV_ROOT);
    env::remove_var(ENV_CONFIG);
    env::remove_var(ENV_JWT_SECRET);
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    clear_env();

    let root_folder = RootFolderResolver::new().resolve();

    assert!(!root_folder.as_os_str().is_empty());
    assert_eq!(root_folder, default_root_folder());
}

#[test]
#[serial]
fn test_resolver_env_var_root_folder() {
    clear_env();
    env::set_var(ENV_ROOT_FOLDER, "/tmp/stagehand-test-env-folder");

    let root_folder = RootFolderResolver::new().resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/stagehand-test-env-folder"));

    clear_env();
}

#[test]
#[serial]
fn test_resolver_root_folder_takes_precedence_over_root() {
    clear_env();
    env::set_var(ENV_ROOT_FOLDER, "/tmp/stagehand-priority-1");
    env::set_var(ENV_ROOT, "/tmp/stagehand-priority-2");

    let root_folder = RootFolderResolver::new().resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/stagehand-priority-1"));

    clear_env();
}

#[test]
#[serial]
fn test_resolver_env_beats_toml_and_cli_beats_env() {
    clear_env();
    let config = TomlConfig::parse("root_folder = \"/from/toml\"").unwrap();

    let resolver = RootFolderResolver::new().with_toml(&config);
    assert_eq!(resolver.resolve(), PathBuf::from("/from/toml"));

    env::set_var(ENV_ROOT, "/from/env");
    assert_eq!(resolver.resolve(), PathBuf::from("/from/env"));

    let resolver = resolver.with_cli_arg(Some(PathBuf::from("/from/cli")));
    assert_eq!(resolver.resolve(), PathBuf::from("/from/cli"));

    clear_env();
}

#[test]
#[serial]
fn test_config_env_var_points_at_file() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stagehand.toml");
    std::fs::write(&path, "[server]\nport = 6001\n").unwrap();
    env::set_var(ENV_CONFIG, &path);

    assert_eq!(locate_config_file(None), Some(path.clone()));
    let config = TomlConfig::load_or_default(None).unwrap();
    assert_eq!(config.server.port, 6001);

    clear_env();
}

#[test]
#[serial]
fn test_explicit_missing_config_is_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    assert!(TomlConfig::load_or_default(Some(&missing)).is_err());
}

#[test]
#[serial]
fn test_jwt_secret_env_override() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stagehand.toml");
    std::fs::write(&path, "[auth]\nissuer = \"box-office\"\n").unwrap();
    env::set_var(ENV_JWT_SECRET, "an-env-provided-secret-value");

    let config = TomlConfig::load_or_default(Some(&path)).unwrap();
    assert_eq!(config.auth.issuer, "box-office");
    assert_eq!(
        config.auth.jwt_secret.as_deref(),
        Some("an-env-provided-secret-value")
    );

    clear_env();
}

#[test]
fn test_initializer_creates_directory_idempotently() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("root");

    let initializer = RootFolderInitializer::new(root.clone());
    assert!(!initializer.database_exists());

    initializer.ensure_directory_exists().unwrap();
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
}
