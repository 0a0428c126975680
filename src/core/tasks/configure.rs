//! Host configuration through the pre-built helper binaries, plus the
//! first-deploy preflight check and local known_hosts seeding.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use crate::command::RemoteCommand;
use crate::context::TaskContext;
use crate::error::{Error, RemoteCommandFailedDetails, Result, TargetDetails};
use crate::ssh::{execute_local_command, is_local_host, CommandOutput};

use super::{run_on_target, Task};

pub const KNOWN_HOSTS_FILE: &str = "~/.ssh/known_hosts";

pub fn apache(ctx: &TaskContext) -> Result<()> {
    let config = ctx.config();
    let mut command = ctx
        .helper(&config.helpers.apache)
        .flag("-n", &config.application)
        .flag("-d", config.domain()?);

    if !config.domain_aliases.is_empty() {
        command = command.flag("-a", config.domain_aliases.join(" "));
    }

    let command = command
        .flag("-w", format!("{}/public", config.current_path()))
        .flag("-h", &config.mongrel_host)
        .flag("-p", config.mongrel_port)
        .flag("-s", config.mongrel_servers);

    run_on_target(ctx, Task::ConfigureApache, &command)
}

pub fn mongrel(ctx: &TaskContext) -> Result<()> {
    let config = ctx.config();
    let command = ctx
        .helper(&config.helpers.mongrel)
        .flag("-n", &config.application)
        .flag("-r", config.current_path())
        .flag("-p", config.mongrel_port)
        .flag("-s", config.mongrel_servers)
        .flag("-h", &config.mongrel_host)
        .flag("-e", &config.rails_env)
        .flag("-P", config.pid_file())
        .flag("-C", config.mongrel_config());

    run_on_target(ctx, Task::ConfigureMongrel, &command)
}

pub fn monit(ctx: &TaskContext) -> Result<()> {
    let config = ctx.config();
    let command = ctx
        .helper(&config.helpers.monit)
        .flag("-n", &config.application)
        .flag("-r", config.current_path())
        .flag("-p", config.mongrel_port)
        .flag("-s", config.mongrel_servers)
        .flag("-h", &config.mongrel_host);

    run_on_target(ctx, Task::ConfigureMonit, &command)
}

pub fn logrotation(ctx: &TaskContext) -> Result<()> {
    let config = ctx.config();
    let command = ctx
        .helper(&config.helpers.logrotate)
        .flag("-n", &config.application)
        .flag("-l", config.log_dir())
        .flag("-s", &config.log_max_size)
        .flag("-k", config.log_keep);

    run_on_target(ctx, Task::ConfigureLogrotation, &command)
}

/// Install the default maintenance site into the shared system directory.
pub fn maintenance(ctx: &TaskContext) -> Result<()> {
    let config = ctx.config();
    let command = RemoteCommand::helper(
        &config.helpers.maintenance,
        config.helpers.version.as_deref(),
    )
    .arg(config.system_dir());

    run_on_target(ctx, Task::ConfigureMaintenance, &command)
}

/// Validate remote prerequisites when nothing has been deployed yet.
///
/// The release cache is dropped afterwards whatever the outcome, so the
/// next read sees the release created by this deploy.
pub fn check(ctx: &TaskContext) -> Result<()> {
    let outcome = ctx.releases().and_then(|releases| {
        if releases.is_empty() {
            Task::Check.execute(ctx)
        } else {
            tracing::info!(releases = releases.len(), "releases present, skipping deploy:check");
            Ok(())
        }
    });

    ctx.reset_releases();

    outcome.map_err(|err| {
        tracing::error!(code = err.code.as_str(), "preflight check failed: {}", err.message);
        log_status!("deploy", "Error detected. Have you run 'capstan deploy setup'?");
        Error::preflight_failed(err)
    })
}

/// Seed the local known_hosts file with every configured host's key.
pub fn known_hosts(ctx: &TaskContext) -> Result<Vec<String>> {
    let path = shellexpand::tilde(KNOWN_HOSTS_FILE).to_string();
    known_hosts_with(ctx, Path::new(&path), &execute_local_command)
}

/// Returns the `host[:port]` entries that were added.
pub fn known_hosts_with(
    ctx: &TaskContext,
    file: &Path,
    exec: &dyn Fn(&str) -> CommandOutput,
) -> Result<Vec<String>> {
    let task = Task::ConfigureKnownHosts.name();
    let mut seen = HashSet::new();
    let mut added = Vec::new();

    for host in ctx.topology().all() {
        if is_local_host(&host.host) || !seen.insert((host.host.as_str(), host.port)) {
            continue;
        }

        let entry = if host.port == 22 {
            host.host.clone()
        } else {
            format!("[{}]:{}", host.host, host.port)
        };

        let lookup = RemoteCommand::new("ssh-keygen")
            .flag("-F", &entry)
            .flag("-f", file.display())
            .render();
        if exec(&lookup).success {
            tracing::debug!(host = %entry, "already in known_hosts");
            continue;
        }

        let scan = RemoteCommand::new("ssh-keyscan")
            .flag("-p", host.port)
            .arg(&host.host)
            .render();
        let output = exec(&scan);
        if !output.success || output.stdout.trim().is_empty() {
            return Err(Error::remote_command_failed(RemoteCommandFailedDetails {
                command: scan,
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
                target: TargetDetails {
                    task: Some(task.to_string()),
                    host: Some(host.host.clone()),
                },
            }));
        }

        append_keys(file, &output.stdout)?;
        log_status!("ssh", "Added {} to {}", entry, file.display());
        added.push(entry);
    }

    Ok(added)
}

fn append_keys(file: &Path, keys: &str) -> Result<()> {
    let context = Some(format!("append {}", file.display()));

    if let Some(parent) = file.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::internal_io(e.to_string(), context.clone()))?;
    }

    let mut handle = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(file)
        .map_err(|e| Error::internal_io(e.to_string(), context.clone()))?;

    let mut text = keys.to_string();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    handle
        .write_all(text.as_bytes())
        .map_err(|e| Error::internal_io(e.to_string(), context))
}
