use clap::{Args, Subcommand};
use serde::Serialize;

use capstan::context::TaskContext;
use capstan::runner::SshRunner;
use capstan::ssh::CommandOutput;
use capstan::tasks::{monit, Task};

use super::{run_tasks, CmdResult, TaskRunOutput};

#[derive(Args)]
pub struct MonitArgs {
    #[command(subcommand)]
    command: MonitCommand,
}

#[derive(Subcommand)]
enum MonitCommand {
    /// Write monit process definitions for the mongrel cluster
    Configure,
    /// Show the monit status summary on each app host
    Status,
    /// Reload monit and wait for it to settle
    Reload,
    /// Restart the monit daemon
    Restart,
    /// Control the mongrel cluster through monit
    Mongrel {
        #[command(subcommand)]
        command: MongrelCommand,
    },
}

#[derive(Subcommand)]
enum MongrelCommand {
    StartCluster,
    StopCluster,
    RestartCluster,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostStatus {
    pub host: String,
    pub output: CommandOutput,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum MonitOutput {
    Status {
        command: String,
        hosts: Vec<HostStatus>,
    },
    Tasks(TaskRunOutput),
}

pub fn run(args: MonitArgs, global: &crate::commands::GlobalArgs) -> CmdResult<MonitOutput> {
    let tasks = |name: &str, task: Task| -> CmdResult<MonitOutput> {
        let (output, code) = run_tasks(name, &[task], global)?;
        Ok((MonitOutput::Tasks(output), code))
    };

    match args.command {
        MonitCommand::Configure => tasks("monit.configure", Task::MonitConfigure),
        MonitCommand::Status => status(global),
        MonitCommand::Reload => tasks("monit.reload", Task::MonitReload),
        MonitCommand::Restart => tasks("monit.restart", Task::MonitRestart),
        MonitCommand::Mongrel { command } => match command {
            MongrelCommand::StartCluster => tasks("monit.mongrel.start-cluster", Task::StartCluster),
            MongrelCommand::StopCluster => tasks("monit.mongrel.stop-cluster", Task::StopCluster),
            MongrelCommand::RestartCluster => {
                tasks("monit.mongrel.restart-cluster", Task::RestartCluster)
            }
        },
    }
}

fn status(global: &crate::commands::GlobalArgs) -> CmdResult<MonitOutput> {
    let config = global.load_config()?;
    let runner = SshRunner::new(&config.user);
    let ctx = TaskContext::new(&config, &runner);

    let hosts = monit::status(&ctx)?
        .into_iter()
        .map(|(host, output)| HostStatus { host, output })
        .collect();

    Ok((
        MonitOutput::Status {
            command: "monit.status".to_string(),
            hosts,
        },
        0,
    ))
}
