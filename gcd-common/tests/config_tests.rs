//! Tests for configuration loading and resolution priority
//!
//! Tests that touch GCD_HISTORY_CONFIG are marked #[serial] so they never
//! race on the process environment.

use gcd_common::config::{resolve_config_path, MergeRule, MigrationConfig, CONFIG_ENV_VAR};
use gcd_common::db::EntityKind;
use gcd_common::Error;
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_argument() {
    let file = write_config("[coalesce]\nepsilon_days = 9\n");
    env::set_var(CONFIG_ENV_VAR, file.path());

    let resolved = resolve_config_path(None);
    let config = MigrationConfig::load(None).unwrap();

    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved.as_deref(), Some(file.path()));
    assert_eq!(config.coalesce.epsilon_days, 9);
}

#[test]
#[serial]
fn test_cli_argument_beats_env_var() {
    let from_env = write_config("[coalesce]\nepsilon_days = 9\n");
    let from_cli = write_config("[coalesce]\nepsilon_days = 2\n");
    env::set_var(CONFIG_ENV_VAR, from_env.path());

    let config = MigrationConfig::load(Some(from_cli.path())).unwrap();

    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.coalesce.epsilon_days, 2);
}

#[test]
#[serial]
fn test_blank_env_var_is_ignored() {
    env::set_var(CONFIG_ENV_VAR, "  ");
    let resolved = resolve_config_path(None);
    env::remove_var(CONFIG_ENV_VAR);

    // Falls through to the per-user file, which only exists on a configured machine
    if let Some(path) = resolved {
        assert!(path.ends_with("gcd-history/config.toml"));
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let err = MigrationConfig::load(Some(&missing)).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_oversized_epsilon_is_config_error() {
    let file = write_config("[coalesce]\nepsilon_days = 100000000\n");
    let err = MigrationConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_malformed_toml_is_config_error() {
    let file = write_config("[coalesce\nepsilon_days = ");
    let err = MigrationConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_full_document_round_trip_of_sections() {
    let file = write_config(
        r#"
[database]
target = "/data/gcd.db"
legacy_snapshot = "/data/old.db"

[accounts]
anon_username = "migration"

[[accounts.aliases]]
from = "Second"
to = "first"

[timeline]
dawn_of_time = "2001-06-01T00:00:00"
default_date = "2008-01-01"
old_site_creation_date = "2001-07-01"
earliest_data_date = "2003-01-01T00:00:00"

[coalesce]
epsilon_days = 7
merge_rule = "carry_forward"

[[overrides]]
kind = "story"
row_ids = [10, 11]
time = "12:00:00"
"#,
    );

    let config = MigrationConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.database.target.to_str(), Some("/data/gcd.db"));
    assert!(config.database.earliest_snapshot.is_none());
    assert_eq!(config.accounts.anon_username, "migration");
    assert_eq!(config.accounts.aliases.len(), 1);
    assert_eq!(config.accounts.aliases[0].from, "Second");
    assert_eq!(config.timeline.dawn_of_time.date().to_string(), "2001-06-01");
    assert_eq!(config.coalesce.merge_rule, MergeRule::CarryForward);
    assert_eq!(config.overrides_for(EntityKind::Story)[0].row_ids, vec![10, 11]);
    assert!(config.overrides_for(EntityKind::Publisher).is_empty());
}

#[test]
fn test_unknown_override_kind_rejected() {
    let file = write_config("[[overrides]]\nkind = \"imprint\"\nrow_ids = [1]\ntime = \"00:00:01\"\n");
    assert!(MigrationConfig::load(Some(file.path())).is_err());
}
