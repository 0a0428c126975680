//! Database settings from the application's `database.yml`.
//!
//! The file is read locally (from the checkout the deploy is run from) and
//! the section named by the environment label is used. Hosting conventions
//! are checked but never enforced: violations are logged as warnings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Database hosts are expected to use the read/write endpoint name.
pub const DB_HOST_PREFIX: &str = "sqlreadwrite";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub adapter: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DbWarning {
    /// Host is not the read/write endpoint.
    HostNaming { host: String },
    /// Database name lacks the `<username>_` prefix.
    DatabaseNaming { database: String, username: String },
}

impl fmt::Display for DbWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbWarning::HostNaming { host } => write!(
                f,
                "Database host '{}' does not start with '{}'",
                host, DB_HOST_PREFIX
            ),
            DbWarning::DatabaseNaming { database, username } => write!(
                f,
                "Database name '{}' is not prefixed with the MySQL username '{}_'",
                database, username
            ),
        }
    }
}

impl DatabaseConfig {
    pub fn load(path: &Path, env: &str) -> Result<Self> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::internal_io(e.to_string(), Some(format!("read {}", display))))?;
        Self::from_yaml(&raw, env, &display)
    }

    /// Sections may share settings through anchors and `<<` merge keys.
    pub fn from_yaml(raw: &str, env: &str, source: &str) -> Result<Self> {
        let mut document: serde_yml::Value =
            serde_yml::from_str(raw).map_err(|e| Error::config_invalid_yaml(source, e))?;
        document
            .apply_merge()
            .map_err(|e| Error::config_invalid_yaml(source, e))?;

        let section = document
            .get(env)
            .cloned()
            .ok_or_else(|| Error::config_missing_key(env, Some(source.to_string())))?;

        serde_yml::from_value(section).map_err(|e| Error::config_invalid_yaml(source, e))
    }

    pub fn is_mysql(&self) -> bool {
        self.adapter == "mysql"
    }
}

/// Check hosting conventions. Each warning is also logged.
pub fn validate_db_config(config: &DatabaseConfig) -> Vec<DbWarning> {
    let mut warnings = Vec::new();

    if !config.host.starts_with(DB_HOST_PREFIX) {
        warnings.push(DbWarning::HostNaming {
            host: config.host.clone(),
        });
    }

    let prefix = format!("{}_", config.username);
    if !config.database.starts_with(&prefix) {
        warnings.push(DbWarning::DatabaseNaming {
            database: config.database.clone(),
            username: config.username.clone(),
        });
    }

    for warning in &warnings {
        tracing::warn!("{}", warning);
        log_status!("mysql", "WARNING: {}", warning);
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(host: &str, username: &str, database: &str) -> DatabaseConfig {
        DatabaseConfig {
            adapter: "mysql".to_string(),
            host: host.to_string(),
            username: username.to_string(),
            password: "pw".to_string(),
            database: database.to_string(),
        }
    }

    #[test]
    fn non_readwrite_host_warns() {
        let warnings = validate_db_config(&db("db1.internal", "alice", "alice_shop"));
        assert_eq!(
            warnings,
            vec![DbWarning::HostNaming {
                host: "db1.internal".to_string()
            }]
        );
    }

    #[test]
    fn readwrite_host_does_not_warn() {
        assert!(validate_db_config(&db("sqlreadwrite-1", "alice", "alice_shop")).is_empty());
    }

    #[test]
    fn unprefixed_database_warns() {
        let warnings = validate_db_config(&db("sqlreadwrite-1", "alice", "shop"));
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], DbWarning::DatabaseNaming { .. }));
    }

    #[test]
    fn bare_username_is_not_a_prefix() {
        let warnings = validate_db_config(&db("sqlreadwrite-1", "alice", "alice"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn both_rules_can_fire() {
        assert_eq!(validate_db_config(&db("localhost", "alice", "shop")).len(), 2);
    }

    const YAML: &str = "\
development:
  adapter: sqlite3
  database: db/development.sqlite3
production:
  adapter: mysql
  host: sqlreadwrite-1
  username: alice
  password: s3cret
  database: alice_shop
";

    #[test]
    fn selects_environment_section() {
        let config = DatabaseConfig::from_yaml(YAML, "production", "config/database.yml").unwrap();
        assert!(config.is_mysql());
        assert_eq!(config.database, "alice_shop");
        assert_eq!(config.password, "s3cret");

        let dev = DatabaseConfig::from_yaml(YAML, "development", "config/database.yml").unwrap();
        assert!(!dev.is_mysql());
        assert!(dev.host.is_empty());
    }

    #[test]
    fn merge_keys_pull_in_shared_defaults() {
        let yaml = "\
defaults: &defaults
  adapter: mysql
  host: sqlreadwrite-1
  username: alice
  password: s3cret
production:
  <<: *defaults
  database: alice_shop
staging:
  <<: *defaults
  host: sqlreadwrite-2
  database: alice_staging
";
        let config = DatabaseConfig::from_yaml(yaml, "production", "config/database.yml").unwrap();
        assert!(config.is_mysql());
        assert_eq!(config.host, "sqlreadwrite-1");
        assert_eq!(config.username, "alice");
        assert_eq!(config.database, "alice_shop");

        let staging = DatabaseConfig::from_yaml(yaml, "staging", "config/database.yml").unwrap();
        assert_eq!(staging.host, "sqlreadwrite-2");
        assert_eq!(staging.password, "s3cret");
    }

    #[test]
    fn missing_environment_is_config_missing() {
        let err = DatabaseConfig::from_yaml(YAML, "staging", "config/database.yml").unwrap_err();
        assert_eq!(err.code.as_str(), "config.missing_key");
        assert_eq!(err.details["key"], "staging");
    }

    #[test]
    fn malformed_yaml_is_reported() {
        let err = DatabaseConfig::from_yaml("production: [unclosed", "production", "db.yml")
            .unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_yaml");
    }
}
