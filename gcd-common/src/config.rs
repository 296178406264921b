//! Migration configuration loading and resolution
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `GCD_HISTORY_CONFIG` environment variable
//! 3. `<config dir>/gcd-history/config.toml`
//! 4. Built-in default document (fallback)

use crate::db::models::EntityKind;
use crate::{Error, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "GCD_HISTORY_CONFIG";

const BUILTIN_CONFIG: &str = include_str!("../config/default.toml");

/// Complete migration configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub database: DatabaseConfig,
    pub accounts: AccountsConfig,
    pub timeline: TimelineConfig,
    pub coalesce: CoalesceConfig,
    /// Known timestamp anomalies, applied by the time normalizer
    pub overrides: Vec<TimeOverride>,
}

/// Database file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Target database receiving changesets and revisions
    pub target: PathBuf,
    /// Legacy snapshot the log tables are read from
    pub legacy_snapshot: PathBuf,
    /// Earliest legacy snapshot, used to tell established issues apart
    pub earliest_snapshot: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            target: PathBuf::from("gcd.db"),
            legacy_snapshot: PathBuf::from("legacy_latest.db"),
            earliest_snapshot: None,
        }
    }
}

/// Accounts the migration attributes work to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// Username of the synthetic account that approves every migrated changeset
    pub anon_username: String,
    /// Legacy logins folded into another login before alignment
    pub aliases: Vec<AccountAlias>,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            anon_username: "anon".to_string(),
            aliases: Vec::new(),
        }
    }
}

/// Legacy username `from` is merged into legacy username `to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAlias {
    pub from: String,
    pub to: String,
}

/// Fixed points of the legacy timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Timestamp given to additions; earlier than anything in the legacy data
    pub dawn_of_time: NaiveDateTime,
    /// Date given to undated, non-addition rows (the bulk import)
    pub default_date: NaiveDate,
    /// Quoted in the comment of addition changesets
    pub old_site_creation_date: NaiveDate,
    /// First date covered by the latest snapshot's own data
    pub earliest_data_date: NaiveDateTime,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            dawn_of_time: ymd_hms(2002, 1, 1),
            default_date: ymd(2009, 11, 1),
            old_site_creation_date: ymd(2002, 11, 13),
            earliest_data_date: ymd_hms(2004, 9, 1),
        }
    }
}

/// How rows are folded together once inside one group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeRule {
    /// Keep the latest row per sub-entity; a later group of the entity
    /// repeats only its latest primary state
    #[default]
    LatestPerSubEntity,
    /// Like `LatestPerSubEntity`, but the entity's latest states are carried
    /// into its next group, so every changeset holds the whole issue
    CarryForward,
}

/// Largest accepted `coalesce.epsilon_days` (a century)
pub const MAX_EPSILON_DAYS: i64 = 36_500;

/// Change coalescer tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoalesceConfig {
    /// Largest gap between same-user rows that still counts as one change
    pub epsilon_days: i64,
    pub merge_rule: MergeRule,
}

impl Default for CoalesceConfig {
    fn default() -> Self {
        Self {
            epsilon_days: 5,
            merge_rule: MergeRule::LatestPerSubEntity,
        }
    }
}

impl CoalesceConfig {
    pub fn epsilon(&self) -> Duration {
        Duration::days(self.epsilon_days)
    }
}

/// Replacement date and/or time for specific legacy rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOverride {
    pub kind: EntityKind,
    pub row_ids: Vec<i64>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub time: Option<NaiveTime>,
    /// Marks the overridden rows as having an inferred timestamp
    #[serde(default)]
    pub inferred: bool,
}

impl MigrationConfig {
    /// Parse the built-in default document
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_CONFIG)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MigrationConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load configuration following the resolution priority
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::load_file(&path)
            }
            None => {
                info!("No configuration file found, using built-in defaults");
                Self::builtin()
            }
        }
    }

    /// Reject settings the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.coalesce.epsilon_days <= 0 || self.coalesce.epsilon_days > MAX_EPSILON_DAYS {
            return Err(Error::Config(format!(
                "coalesce.epsilon_days must be between 1 and {}, got {}",
                MAX_EPSILON_DAYS, self.coalesce.epsilon_days
            )));
        }
        if self.accounts.anon_username.trim().is_empty() {
            return Err(Error::Config("accounts.anon_username is empty".to_string()));
        }
        for entry in &self.overrides {
            if entry.date.is_none() && entry.time.is_none() {
                return Err(Error::Config(format!(
                    "override for {} rows {:?} sets neither date nor time",
                    entry.kind, entry.row_ids
                )));
            }
        }
        Ok(())
    }

    /// Overrides that apply to one entity kind
    pub fn overrides_for(&self, kind: EntityKind) -> Vec<TimeOverride> {
        self.overrides
            .iter()
            .filter(|o| o.kind == kind)
            .cloned()
            .collect()
    }
}

/// Find the config file to load, if any
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: per-user config file
    let user_config = user_config_path()?;
    if user_config.exists() {
        return Some(user_config);
    }
    debug!("No user config at {}", user_config.display());

    None
}

/// `<config dir>/gcd-history/config.toml` for the current platform
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gcd-history").join("config.toml"))
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

fn ymd_hms(year: i32, month: u32, day: u32) -> NaiveDateTime {
    ymd(year, month, day).and_time(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_config_parses() {
        let config = MigrationConfig::builtin().unwrap();
        assert_eq!(config.accounts.anon_username, "anon");
        assert_eq!(config.coalesce.epsilon_days, 5);
        assert_eq!(config.timeline.dawn_of_time, ymd_hms(2002, 1, 1));
        assert_eq!(config.overrides_for(EntityKind::Publisher).len(), 3);
        assert_eq!(config.overrides_for(EntityKind::Issue).len(), 1);
        assert!(config.overrides_for(EntityKind::Story).is_empty());
    }

    #[test]
    fn test_builtin_issue_override_is_inferred() {
        let config = MigrationConfig::builtin().unwrap();
        let issue = &config.overrides_for(EntityKind::Issue)[0];
        assert_eq!(issue.row_ids, vec![289288]);
        assert_eq!(issue.date, Some(ymd(2004, 7, 6)));
        assert_eq!(issue.time, NaiveTime::from_hms_opt(0, 0, 3));
        assert!(issue.inferred);
    }

    #[test]
    fn test_missing_sections_fall_back_to_defaults() {
        let config = MigrationConfig::from_toml_str("[coalesce]\nepsilon_days = 3\n").unwrap();
        assert_eq!(config.coalesce.epsilon(), Duration::days(3));
        assert_eq!(config.coalesce.merge_rule, MergeRule::LatestPerSubEntity);
        assert_eq!(config.timeline.default_date, ymd(2009, 11, 1));
        assert!(config.overrides.is_empty());
    }

    #[test]
    fn test_non_positive_epsilon_rejected() {
        let err = MigrationConfig::from_toml_str("[coalesce]\nepsilon_days = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_epsilon_beyond_a_century_rejected() {
        assert!(MigrationConfig::from_toml_str("[coalesce]\nepsilon_days = 36500\n").is_ok());
        let err = MigrationConfig::from_toml_str("[coalesce]\nepsilon_days = 100000000\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_empty_override_rejected() {
        let doc = "[[overrides]]\nkind = \"series\"\nrow_ids = [1]\n";
        let err = MigrationConfig::from_toml_str(doc).unwrap_err();
        assert!(err.to_string().contains("neither date nor time"));
    }

    #[test]
    fn test_merge_rule_parses_snake_case() {
        let config =
            MigrationConfig::from_toml_str("[coalesce]\nmerge_rule = \"carry_forward\"\n").unwrap();
        assert_eq!(config.coalesce.merge_rule, MergeRule::CarryForward);
    }

    #[test]
    fn test_cli_argument_wins() {
        let path = Path::new("/tmp/explicit.toml");
        assert_eq!(resolve_config_path(Some(path)), Some(path.to_path_buf()));
    }
}
