#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

use capstan::config::AppConfig;
use capstan::role::HostSpec;
use capstan::runner::RemoteRunner;
use capstan::ssh::{CommandOutput, PromptResponder};
use tempfile::TempDir;

pub const CONFIG: &str = r#"{
    "application": "shop",
    "repository": "git@example.com:shop.git",
    "domain": "shop.example",
    "domainAliases": ["www.shop.example"],
    "monitSettleSecs": 0,
    "servers": [
        { "host": "app1", "roles": ["web", "app"] },
        { "host": "app2", "roles": ["web", "app"] },
        { "host": "sqlreadwrite-1", "roles": ["db"], "primary": true, "noRelease": true }
    ]
}"#;

pub const DATABASE_YML: &str = "\
production:
  adapter: mysql
  host: sqlreadwrite-1
  username: alice
  password: s3cret
  database: alice_shop
";

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.root.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Standard fleet config with `databaseConfig` pointing into the project.
    pub fn config(&self) -> AppConfig {
        let db = self.write("config/database.yml", DATABASE_YML);
        let path = self.write("capstan.json", CONFIG);
        let mut config = AppConfig::load(&path).unwrap();
        config.database_config = db.display().to_string();
        config
    }
}

/// Records every command instead of running it.
#[derive(Default)]
pub struct RecordingRunner {
    pub calls: RefCell<Vec<(String, String)>>,
    failures: Vec<(String, String)>,
    outputs: Vec<(String, String)>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, needle: &str, stderr: &str) -> Self {
        self.failures.push((needle.to_string(), stderr.to_string()));
        self
    }

    pub fn printing(mut self, needle: &str, stdout: &str) -> Self {
        self.outputs.push((needle.to_string(), stdout.to_string()));
        self
    }

    pub fn position(&self, needle: &str) -> Option<usize> {
        self.calls.borrow().iter().position(|(_, c)| c.contains(needle))
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.position(needle).is_some()
    }
}

impl RemoteRunner for RecordingRunner {
    fn execute(&self, host: &HostSpec, command: &str) -> capstan::Result<CommandOutput> {
        self.calls
            .borrow_mut()
            .push((host.host.clone(), command.to_string()));

        if let Some((_, stderr)) = self.failures.iter().find(|(n, _)| command.contains(n.as_str())) {
            return Ok(CommandOutput::failed(1, stderr.as_str()));
        }
        let stdout = self
            .outputs
            .iter()
            .find(|(n, _)| command.contains(n.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default();
        Ok(CommandOutput::ok(stdout))
    }

    fn execute_with_responder(
        &self,
        host: &HostSpec,
        command: &str,
        responder: &mut PromptResponder,
    ) -> capstan::Result<CommandOutput> {
        let output = self.execute(host, command)?;
        responder.feed(&output.stdout);
        responder.finish();
        Ok(output)
    }
}
