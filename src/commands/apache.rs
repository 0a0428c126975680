use clap::{Args, Subcommand};

use capstan::tasks::Task;

use super::{run_tasks, CmdResult, TaskRunOutput};

#[derive(Args)]
pub struct ApacheArgs {
    #[command(subcommand)]
    command: ApacheCommand,
}

#[derive(Subcommand)]
enum ApacheCommand {
    /// Gracefully reload Apache after a config check
    Reload,
    /// Write this app's vhost and check the config
    Setup,
    /// Restart Apache after a config check
    Restart,
}

pub fn run(args: ApacheArgs, global: &crate::commands::GlobalArgs) -> CmdResult<TaskRunOutput> {
    match args.command {
        ApacheCommand::Reload => run_tasks("apache.reload", &[Task::ApacheReload], global),
        ApacheCommand::Setup => run_tasks("apache.setup", &[Task::ApacheSetup], global),
        ApacheCommand::Restart => run_tasks("apache.restart", &[Task::ApacheRestart], global),
    }
}
