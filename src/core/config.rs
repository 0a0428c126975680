//! Application deployment configuration.
//!
//! Loaded once per invocation from a JSON file (camelCase keys) and never
//! mutated afterwards; every task receives it by reference.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::role::{HostSpec, Topology};

pub const DEFAULT_CONFIG_FILE: &str = "capstan.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub application: String,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub deploy_to: Option<String>,

    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub domain_aliases: Vec<String>,

    /// Environment label; selects the `database.yml` section.
    #[serde(default = "default_rails_env")]
    pub rails_env: String,
    #[serde(default = "default_rake")]
    pub rake: String,
    #[serde(default = "default_database_config")]
    pub database_config: String,

    #[serde(default = "default_mongrel_host")]
    pub mongrel_host: String,
    #[serde(default = "default_mongrel_port")]
    pub mongrel_port: u16,
    #[serde(default = "default_mongrel_servers")]
    pub mongrel_servers: u32,
    #[serde(default)]
    pub pid_file: Option<String>,
    #[serde(default)]
    pub mongrel_config: Option<String>,

    #[serde(default = "default_log_max_size")]
    pub log_max_size: String,
    #[serde(default = "default_log_keep")]
    pub log_keep: u32,

    #[serde(default = "default_monit_settle_secs")]
    pub monit_settle_secs: u64,
    #[serde(default = "default_use_sudo")]
    pub use_sudo: bool,

    #[serde(default)]
    pub helpers: HelperCommands,

    #[serde(default)]
    pub servers: Vec<HostSpec>,

    /// File the config was read from, for error details.
    #[serde(skip)]
    pub source: Option<String>,
}

/// Pre-built helper executables installed on the target hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelperCommands {
    #[serde(default = "default_monit_command")]
    pub monit: String,
    #[serde(default = "default_apache_command")]
    pub apache: String,
    #[serde(default = "default_nginx_command")]
    pub nginx: String,
    #[serde(default = "default_mongrel_command")]
    pub mongrel: String,
    #[serde(default = "default_logrotate_command")]
    pub logrotate: String,
    #[serde(default = "default_maintenance_command")]
    pub maintenance: String,
    /// When set, helpers are invoked with a leading `_<version>_` argument.
    #[serde(default)]
    pub version: Option<String>,
}

impl Default for HelperCommands {
    fn default() -> Self {
        Self {
            monit: default_monit_command(),
            apache: default_apache_command(),
            nginx: default_nginx_command(),
            mongrel: default_mongrel_command(),
            logrotate: default_logrotate_command(),
            maintenance: default_maintenance_command(),
            version: None,
        }
    }
}

impl HelperCommands {
    pub fn all(&self) -> [&str; 6] {
        [
            &self.monit,
            &self.apache,
            &self.nginx,
            &self.mongrel,
            &self.logrotate,
            &self.maintenance,
        ]
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_branch() -> String {
    "master".to_string()
}

fn default_user() -> String {
    "rails".to_string()
}

fn default_rails_env() -> String {
    "production".to_string()
}

fn default_rake() -> String {
    "rake".to_string()
}

fn default_database_config() -> String {
    "config/database.yml".to_string()
}

fn default_mongrel_host() -> String {
    "127.0.0.1".to_string()
}

fn default_mongrel_port() -> u16 {
    9200
}

fn default_mongrel_servers() -> u32 {
    2
}

fn default_log_max_size() -> String {
    "100M".to_string()
}

fn default_log_keep() -> u32 {
    14
}

fn default_monit_settle_secs() -> u64 {
    5
}

fn default_use_sudo() -> bool {
    true
}

fn default_monit_command() -> String {
    "railsapp-monit".to_string()
}

fn default_apache_command() -> String {
    "railsapp-apache".to_string()
}

fn default_mongrel_command() -> String {
    "railsapp-mongrel".to_string()
}

fn default_logrotate_command() -> String {
    "railsapp-logrotate".to_string()
}

fn default_nginx_command() -> String {
    "railsapp-nginx".to_string()
}

fn default_maintenance_command() -> String {
    "railsapp-maintenance".to_string()
}

impl AppConfig {
    /// Config with every default applied, for the named application.
    pub fn new(application: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            repository: None,
            branch: default_branch(),
            user: default_user(),
            deploy_to: None,
            domain: None,
            domain_aliases: Vec::new(),
            rails_env: default_rails_env(),
            rake: default_rake(),
            database_config: default_database_config(),
            mongrel_host: default_mongrel_host(),
            mongrel_port: default_mongrel_port(),
            mongrel_servers: default_mongrel_servers(),
            pid_file: None,
            mongrel_config: None,
            log_max_size: default_log_max_size(),
            log_keep: default_log_keep(),
            monit_settle_secs: default_monit_settle_secs(),
            use_sudo: default_use_sudo(),
            helpers: HelperCommands::default(),
            servers: Vec::new(),
            source: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read {}", display))).with_hint(
                format!(
                    "Create {} or pass --config <path> to point at your deploy config",
                    DEFAULT_CONFIG_FILE
                ),
            )
        })?;
        Self::from_json(&raw, Some(display))
    }

    pub fn from_json(raw: &str, source: Option<String>) -> Result<Self> {
        let mut config: AppConfig = serde_json::from_str(raw).map_err(|e| {
            Error::config_invalid_json(source.clone().unwrap_or_else(|| "<inline>".to_string()), e)
        })?;
        config.source = source;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.application.trim().is_empty() {
            return Err(Error::config_missing_key("application", self.source.clone()));
        }
        if self.servers.is_empty() {
            return Err(Error::config_missing_key("servers", self.source.clone()));
        }
        if self.mongrel_servers == 0 {
            return Err(Error::config_invalid_value(
                "mongrelServers",
                Some("0".to_string()),
                "mongrelServers must be at least 1",
            ));
        }
        if let Some(host) = self.servers.iter().find(|s| s.roles.is_empty()) {
            return Err(Error::config_invalid_value(
                "servers",
                Some(host.host.clone()),
                format!("Server '{}' has no roles", host.host),
            ));
        }
        Ok(())
    }

    pub fn with_rails_env(mut self, env: impl Into<String>) -> Self {
        self.rails_env = env.into();
        self
    }

    pub fn topology(&self) -> Topology {
        Topology::new(self.servers.clone())
    }

    pub fn monit_settle_delay(&self) -> Duration {
        Duration::from_secs(self.monit_settle_secs)
    }

    // ------------------------------------------------------------------------
    // Required settings
    // ------------------------------------------------------------------------

    pub fn repository(&self) -> Result<&str> {
        self.require("repository", self.repository.as_deref())
    }

    pub fn domain(&self) -> Result<&str> {
        self.require("domain", self.domain.as_deref())
    }

    fn require<'a>(&self, key: &str, value: Option<&'a str>) -> Result<&'a str> {
        match value {
            Some(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(Error::config_missing_key(key, self.source.clone())),
        }
    }

    // ------------------------------------------------------------------------
    // Derived remote paths
    // ------------------------------------------------------------------------

    pub fn deploy_to(&self) -> String {
        self.deploy_to
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| format!("/home/{}/{}", self.user, self.application))
    }

    pub fn releases_path(&self) -> String {
        format!("{}/releases", self.deploy_to())
    }

    pub fn shared_path(&self) -> String {
        format!("{}/shared", self.deploy_to())
    }

    pub fn current_path(&self) -> String {
        format!("{}/current", self.deploy_to())
    }

    pub fn release_path(&self, release: &str) -> String {
        format!("{}/{}", self.releases_path(), release)
    }

    pub fn log_dir(&self) -> String {
        format!("{}/log", self.shared_path())
    }

    pub fn system_dir(&self) -> String {
        format!("{}/system", self.shared_path())
    }

    pub fn pid_file(&self) -> String {
        self.pid_file
            .clone()
            .unwrap_or_else(|| format!("{}/pids/mongrel.pid", self.shared_path()))
    }

    pub fn mongrel_config(&self) -> String {
        self.mongrel_config
            .clone()
            .unwrap_or_else(|| format!("{}/config/mongrel_cluster.yml", self.shared_path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;

    const MINIMAL: &str = r#"{
        "application": "shop",
        "servers": [{ "host": "app1.example", "roles": ["web", "app", "db"] }]
    }"#;

    #[test]
    fn defaults_are_applied() {
        let config = AppConfig::from_json(MINIMAL, None).unwrap();
        assert_eq!(config.user, "rails");
        assert_eq!(config.rails_env, "production");
        assert_eq!(config.mongrel_port, 9200);
        assert_eq!(config.mongrel_servers, 2);
        assert_eq!(config.monit_settle_secs, 5);
        assert!(config.use_sudo);
        assert_eq!(config.helpers.monit, "railsapp-monit");
        assert_eq!(config.servers[0].roles, vec![Role::Web, Role::App, Role::Db]);
    }

    #[test]
    fn derived_paths_follow_deploy_to() {
        let config = AppConfig::from_json(MINIMAL, None).unwrap();
        assert_eq!(config.deploy_to(), "/home/rails/shop");
        assert_eq!(config.current_path(), "/home/rails/shop/current");
        assert_eq!(config.release_path("20260101000000"), "/home/rails/shop/releases/20260101000000");
        assert_eq!(config.log_dir(), "/home/rails/shop/shared/log");
        assert_eq!(config.pid_file(), "/home/rails/shop/shared/pids/mongrel.pid");
    }

    #[test]
    fn explicit_deploy_to_wins() {
        let mut config = AppConfig::new("shop");
        config.deploy_to = Some("/srv/shop".to_string());
        assert_eq!(config.shared_path(), "/srv/shop/shared");
    }

    #[test]
    fn missing_application_is_config_missing() {
        let err = AppConfig::from_json(
            r#"{"servers":[{"host":"a","roles":["app"]}]}"#,
            Some("capstan.json".to_string()),
        )
        .unwrap_err();
        assert_eq!(err.code.as_str(), "config.missing_key");
        assert_eq!(err.details["key"], "application");
        assert_eq!(err.details["path"], "capstan.json");
    }

    #[test]
    fn missing_servers_is_config_missing() {
        let err = AppConfig::from_json(r#"{"application":"shop"}"#, None).unwrap_err();
        assert_eq!(err.details["key"], "servers");
    }

    #[test]
    fn invalid_json_is_reported() {
        let err = AppConfig::from_json("{ not json", None).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_json");
    }

    #[test]
    fn required_settings_error_when_absent() {
        let config = AppConfig::new("shop");
        assert_eq!(config.domain().unwrap_err().details["key"], "domain");
        assert_eq!(config.repository().unwrap_err().details["key"], "repository");
    }

    #[test]
    fn rails_env_override() {
        let config = AppConfig::new("shop").with_rails_env("staging");
        assert_eq!(config.rails_env, "staging");
    }
}
