use clap::{Args, Subcommand};
use serde::Serialize;

use capstan::context::TaskContext;
use capstan::runner::SshRunner;
use capstan::tasks::{configure, Task};

use super::{run_tasks, CmdResult, TaskRunOutput};

#[derive(Args)]
pub struct ConfigureArgs {
    #[command(subcommand)]
    command: ConfigureCommand,
}

#[derive(Subcommand)]
enum ConfigureCommand {
    /// Write the Apache vhost for this app
    Apache,
    /// Write the mongrel cluster config
    Mongrel,
    /// Write monit process definitions
    Monit,
    /// Install logrotate config for the shared log directory
    Logrotation,
    /// Install the default maintenance site
    Maintenance,
    /// Run deploy check unless a release already exists
    Check,
    /// Add every configured host's key to ~/.ssh/known_hosts
    KnownHosts,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum ConfigureOutput {
    KnownHosts {
        command: String,
        added: Vec<String>,
    },
    Tasks(TaskRunOutput),
}

pub fn run(
    args: ConfigureArgs,
    global: &crate::commands::GlobalArgs,
) -> CmdResult<ConfigureOutput> {
    let (name, task) = match args.command {
        ConfigureCommand::Apache => ("configure.apache", Task::ConfigureApache),
        ConfigureCommand::Mongrel => ("configure.mongrel", Task::ConfigureMongrel),
        ConfigureCommand::Monit => ("configure.monit", Task::ConfigureMonit),
        ConfigureCommand::Logrotation => ("configure.logrotation", Task::ConfigureLogrotation),
        ConfigureCommand::Maintenance => ("configure.maintenance", Task::ConfigureMaintenance),
        ConfigureCommand::Check => ("configure.check", Task::ConfigureCheck),
        ConfigureCommand::KnownHosts => return known_hosts(global),
    };

    let (output, code) = run_tasks(name, &[task], global)?;
    Ok((ConfigureOutput::Tasks(output), code))
}

fn known_hosts(global: &crate::commands::GlobalArgs) -> CmdResult<ConfigureOutput> {
    let config = global.load_config()?;
    let runner = SshRunner::new(&config.user);
    let ctx = TaskContext::new(&config, &runner);

    let added = configure::known_hosts(&ctx)?;

    Ok((
        ConfigureOutput::KnownHosts {
            command: "configure.known-hosts".to_string(),
            added,
        },
        0,
    ))
}
