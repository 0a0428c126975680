//! Execution context shared by every task in one invocation.

use std::cell::RefCell;
use std::time::Duration;

use crate::command::RemoteCommand;
use crate::config::AppConfig;
use crate::error::{Error, RemoteCommandFailedDetails, Result, TargetDetails};
use crate::releases::{self, ReleaseHistory};
use crate::role::{HostSpec, Role, Target, Topology};
use crate::runner::RemoteRunner;
use crate::ssh::{CommandOutput, PromptResponder};

/// Release directory names are UTC timestamps.
pub const RELEASE_NAME_FORMAT: &str = "%Y%m%d%H%M%S";

pub struct TaskContext<'a> {
    config: &'a AppConfig,
    topology: Topology,
    runner: &'a dyn RemoteRunner,
    release_name: String,
    settle_delay: Duration,
    releases: ReleaseHistory,
    /// Hosts touched since the last `take_touched_hosts`.
    touched: RefCell<Vec<String>>,
}

impl<'a> TaskContext<'a> {
    pub fn new(config: &'a AppConfig, runner: &'a dyn RemoteRunner) -> Self {
        Self {
            config,
            topology: config.topology(),
            runner,
            release_name: chrono::Utc::now().format(RELEASE_NAME_FORMAT).to_string(),
            settle_delay: config.monit_settle_delay(),
            releases: ReleaseHistory::new(),
            touched: RefCell::new(Vec::new()),
        }
    }

    pub fn with_release_name(mut self, name: impl Into<String>) -> Self {
        self.release_name = name.into();
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn config(&self) -> &AppConfig {
        self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn release_name(&self) -> &str {
        &self.release_name
    }

    pub fn release_path(&self) -> String {
        self.config.release_path(&self.release_name)
    }

    /// Start a command for a helper binary, applying the configured version pin.
    pub fn helper(&self, program: &str) -> RemoteCommand {
        RemoteCommand::helper(program, self.config.helpers.version.as_deref())
            .sudo(self.config.use_sudo)
    }

    /// A plain command with the configured sudo setting.
    pub fn privileged(&self, program: &str) -> RemoteCommand {
        RemoteCommand::new(program).sudo(self.config.use_sudo)
    }

    /// Run `command` on every host matching `target`, one host at a time.
    ///
    /// Returns once every host has completed; the first non-zero exit stops
    /// the loop and becomes a `remote.command_failed` error.
    pub fn run(&self, task: &str, target: Target, command: &RemoteCommand) -> Result<()> {
        self.capture(task, target, command).map(|_| ())
    }

    /// Like [`TaskContext::run`] but returns each host's output.
    pub fn capture(
        &self,
        task: &str,
        target: Target,
        command: &RemoteCommand,
    ) -> Result<Vec<(String, CommandOutput)>> {
        let line = command.render();
        let hosts = self.topology.require_hosts(target, task)?;
        let mut outputs = Vec::with_capacity(hosts.len());

        for host in hosts {
            let output = self.execute_raw(host, &line)?;
            ensure_success(task, host, &line, &output)?;
            outputs.push((host.host.clone(), output));
        }

        Ok(outputs)
    }

    /// Execute on one host without interpreting the exit status.
    pub fn execute_raw(&self, host: &HostSpec, line: &str) -> Result<CommandOutput> {
        tracing::debug!(host = %host.host, command = %line, "remote command");
        self.note_host(&host.host);
        self.runner.execute(host, line)
    }

    /// Execute a prompting command on one host without interpreting the exit status.
    pub fn execute_raw_with_responder(
        &self,
        host: &HostSpec,
        line: &str,
        responder: &mut PromptResponder,
    ) -> Result<CommandOutput> {
        tracing::debug!(host = %host.host, command = %line, "remote command (interactive)");
        self.note_host(&host.host);
        self.runner.execute_with_responder(host, line, responder)
    }

    /// Release history, read from the first release host on first use.
    pub fn releases(&self) -> Result<Vec<String>> {
        self.releases.get_or_fetch(|| {
            let command = RemoteCommand::new("ls")
                .arg("-x")
                .arg(self.config.releases_path());
            let hosts = self
                .topology
                .require_hosts(Target::ReleaseRole(Role::App), "releases")?;
            let line = command.render();
            let host = hosts[0];
            let output = self.execute_raw(host, &line)?;
            ensure_success("releases", host, &line, &output)?;
            Ok(releases::parse_listing(&output.stdout))
        })
    }

    pub fn reset_releases(&self) {
        self.releases.reset();
    }

    pub fn releases_cached(&self) -> bool {
        self.releases.is_cached()
    }

    /// Wait for the supervisor to pick up reloaded configuration.
    pub fn settle(&self) {
        if self.settle_delay.is_zero() {
            return;
        }
        log_status!(
            "monit",
            "Waiting {}s for monit to settle",
            self.settle_delay.as_secs()
        );
        std::thread::sleep(self.settle_delay);
    }

    fn note_host(&self, host: &str) {
        let mut touched = self.touched.borrow_mut();
        if !touched.iter().any(|h| h == host) {
            touched.push(host.to_string());
        }
    }

    /// Hosts contacted since the previous call, in first-contact order.
    pub fn take_touched_hosts(&self) -> Vec<String> {
        std::mem::take(&mut *self.touched.borrow_mut())
    }
}

pub fn ensure_success(
    task: &str,
    host: &HostSpec,
    line: &str,
    output: &CommandOutput,
) -> Result<()> {
    if output.success {
        return Ok(());
    }

    Err(Error::remote_command_failed(RemoteCommandFailedDetails {
        command: line.to_string(),
        exit_code: output.exit_code,
        stdout: output.stdout.clone(),
        stderr: output.stderr.clone(),
        target: TargetDetails {
            task: Some(task.to_string()),
            host: Some(host.host.clone()),
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::FakeRunner;

    fn config() -> AppConfig {
        let mut config = AppConfig::new("shop");
        config.servers = vec![
            HostSpec::new("web1", &[Role::Web, Role::App]),
            HostSpec::new("web2", &[Role::Web, Role::App]),
            HostSpec::new("db1", &[Role::Db]).no_release(),
        ];
        config
    }

    #[test]
    fn run_visits_every_matching_host_in_order() {
        let config = config();
        let runner = FakeRunner::new();
        let ctx = TaskContext::new(&config, &runner);

        ctx.run("t", Target::Role(Role::Web), &RemoteCommand::new("true"))
            .unwrap();

        let calls = runner.calls.borrow();
        let hosts: Vec<&str> = calls.iter().map(|(h, _)| h.as_str()).collect();
        assert_eq!(hosts, vec!["web1", "web2"]);
        drop(calls);
        assert_eq!(ctx.take_touched_hosts(), vec!["web1", "web2"]);
        assert!(ctx.take_touched_hosts().is_empty());
    }

    #[test]
    fn run_stops_at_first_failing_host() {
        let config = config();
        let runner = FakeRunner::new().fail_on("false", "nope");
        let ctx = TaskContext::new(&config, &runner);

        let err = ctx
            .run("t", Target::Role(Role::App), &RemoteCommand::new("false"))
            .unwrap_err();

        assert_eq!(err.code.as_str(), "remote.command_failed");
        assert_eq!(err.details["target"]["host"], "web1");
        assert_eq!(err.details["target"]["task"], "t");
        assert_eq!(runner.calls.borrow().len(), 1);
    }

    #[test]
    fn release_name_is_a_utc_timestamp() {
        let config = config();
        let runner = FakeRunner::new();
        let ctx = TaskContext::new(&config, &runner);
        assert_eq!(ctx.release_name().len(), 14);
        assert!(ctx.release_name().chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn releases_are_listed_once_and_cached() {
        let config = config();
        let runner = FakeRunner::new().on(
            "ls -x",
            CommandOutput::ok("20260102000000 20260101000000\n"),
        );
        let ctx = TaskContext::new(&config, &runner);

        assert_eq!(
            ctx.releases().unwrap(),
            vec!["20260101000000", "20260102000000"]
        );
        ctx.releases().unwrap();
        assert_eq!(runner.calls.borrow().len(), 1);

        ctx.reset_releases();
        assert!(!ctx.releases_cached());
    }

    #[test]
    fn releases_skip_app_hosts_without_code() {
        let mut config = config();
        config.servers = vec![
            HostSpec::new("worker1", &[Role::App]).primary().no_release(),
            HostSpec::new("web1", &[Role::Web, Role::App]),
        ];
        let runner = FakeRunner::new().on("ls -x", CommandOutput::ok("20260101000000\n"));
        let ctx = TaskContext::new(&config, &runner);

        ctx.releases().unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "web1");
    }

    #[test]
    fn helper_commands_follow_sudo_and_version() {
        let mut config = config();
        config.helpers.version = Some("2".to_string());
        config.use_sudo = false;
        let runner = FakeRunner::new();
        let ctx = TaskContext::new(&config, &runner);

        assert_eq!(ctx.helper("railsapp-monit").render(), "railsapp-monit _2_");
    }
}
