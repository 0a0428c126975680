use serde::Serialize;
use std::path::PathBuf;

use capstan::config::AppConfig;
use capstan::context::TaskContext;
use capstan::plan::{self, TaskReport};
use capstan::runner::SshRunner;
use capstan::tasks::Task;

pub type CmdResult<T> = capstan::Result<(T, i32)>;

/// Options shared by every subcommand.
pub(crate) struct GlobalArgs {
    pub config: PathBuf,
    pub env: Option<String>,
}

impl GlobalArgs {
    /// Load the deploy config, applying the `--env` override.
    pub fn load_config(&self) -> capstan::Result<AppConfig> {
        let config = AppConfig::load(&self.config)?;
        match self.env.as_deref() {
            Some(env) if env.trim().is_empty() => Err(capstan::Error::validation_invalid_argument(
                "env",
                "Environment label cannot be empty",
                None,
            )),
            Some(env) => Ok(config.with_rails_env(env)),
            None => Ok(config),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunOutput {
    pub command: String,
    pub tasks: Vec<TaskReport>,
}

/// Run standalone tasks in order against the configured fleet.
pub(crate) fn run_tasks(
    command: &str,
    tasks: &[Task],
    global: &GlobalArgs,
) -> CmdResult<TaskRunOutput> {
    let config = global.load_config()?;
    let runner = SshRunner::new(&config.user);
    let ctx = TaskContext::new(&config, &runner);

    let mut reports = Vec::with_capacity(tasks.len());
    for task in tasks {
        reports.push(plan::run_task(*task, &ctx)?);
    }

    Ok((
        TaskRunOutput {
            command: command.to_string(),
            tasks: reports,
        },
        0,
    ))
}

pub mod apache;
pub mod configure;
pub mod deploy;
pub mod load_schema;
pub mod monit;
pub mod mysql;
pub mod web;

/// Dispatch a command to its handler and wrap the result for printing.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::Outcome::from_cmd($module::run($args, $global))
    };
}

pub(crate) fn run(command: crate::Commands, global: &GlobalArgs) -> crate::output::Outcome {
    match command {
        crate::Commands::Deploy(args) => dispatch!(args, global, deploy),
        crate::Commands::Web(args) => dispatch!(args, global, web),
        crate::Commands::Apache(args) => dispatch!(args, global, apache),
        crate::Commands::Monit(args) => dispatch!(args, global, monit),
        crate::Commands::Mysql(args) => dispatch!(args, global, mysql),
        crate::Commands::LoadSchema(args) => dispatch!(args, global, load_schema),
        crate::Commands::Configure(args) => dispatch!(args, global, configure),
    }
}
