use clap::{Args, Subcommand};

use capstan::tasks::Task;

use super::{run_tasks, CmdResult, TaskRunOutput};

#[derive(Args)]
pub struct WebArgs {
    #[command(subcommand)]
    command: WebCommand,
}

#[derive(Subcommand)]
enum WebCommand {
    /// Put up the maintenance page
    Disable,
    /// Take down the maintenance page
    Enable,
}

pub fn run(args: WebArgs, global: &crate::commands::GlobalArgs) -> CmdResult<TaskRunOutput> {
    match args.command {
        WebCommand::Disable => run_tasks("web.disable", &[Task::WebDisable], global),
        WebCommand::Enable => run_tasks("web.enable", &[Task::WebEnable], global),
    }
}
