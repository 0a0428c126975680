use clap::Args;

use capstan::tasks::Task;

use super::{run_tasks, CmdResult, TaskRunOutput};

/// Load the schema on the primary db host. Existing tables are dropped.
#[derive(Args)]
pub struct LoadSchemaArgs {}

pub fn run(
    _args: LoadSchemaArgs,
    global: &crate::commands::GlobalArgs,
) -> CmdResult<TaskRunOutput> {
    run_tasks("load-schema", &[Task::LoadSchema], global)
}
