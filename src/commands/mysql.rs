use clap::{Args, Subcommand};

use capstan::tasks::Task;

use super::{run_tasks, CmdResult, TaskRunOutput};

#[derive(Args)]
pub struct MysqlArgs {
    #[command(subcommand)]
    command: MysqlCommand,
}

#[derive(Subcommand)]
enum MysqlCommand {
    /// Create the database named in database.yml on the primary db host
    CreateDatabase,
}

pub fn run(args: MysqlArgs, global: &crate::commands::GlobalArgs) -> CmdResult<TaskRunOutput> {
    match args.command {
        MysqlCommand::CreateDatabase => {
            run_tasks("mysql.create-database", &[Task::CreateDatabase], global)
        }
    }
}
