use clap::{Args, Subcommand};
use serde::Serialize;

use capstan::context::TaskContext;
use capstan::plan::{self, DeploymentMode, DeploymentPlan, PlanReport};
use capstan::runner::SshRunner;
use capstan::tasks::Task;

use super::{run_tasks, CmdResult, TaskRunOutput};

#[derive(Args)]
pub struct DeployArgs {
    #[command(subcommand)]
    command: DeployCommand,
}

#[derive(Args, Clone, Copy)]
pub struct RolloutArgs {
    /// Validate remote prerequisites first when nothing has been deployed
    #[arg(long)]
    pub check: bool,

    /// Print the plan without executing it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
enum DeployCommand {
    /// First deploy: code, database, process supervision and web server
    Cold(RolloutArgs),
    /// Roll out a new release behind the maintenance page
    Default(RolloutArgs),
    /// Roll out a new release and run pending migrations
    Migrations(RolloutArgs),
    /// Create the directory layout on every release host
    Setup,
    /// Verify remote prerequisites for a first deploy
    Check,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedTask {
    pub task: &'static str,
    pub target: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum DeployOutput {
    Report(PlanReport),
    DryRun {
        mode: DeploymentMode,
        #[serde(rename = "dryRun")]
        dry_run: bool,
        tasks: Vec<PlannedTask>,
    },
    Tasks(TaskRunOutput),
}

pub fn run(args: DeployArgs, global: &crate::commands::GlobalArgs) -> CmdResult<DeployOutput> {
    match args.command {
        DeployCommand::Cold(rollout) => rollout_mode(DeploymentMode::Cold, rollout, global),
        DeployCommand::Default(rollout) => rollout_mode(DeploymentMode::Standard, rollout, global),
        DeployCommand::Migrations(rollout) => {
            rollout_mode(DeploymentMode::WithMigrations, rollout, global)
        }
        DeployCommand::Setup => {
            let (output, code) = run_tasks("deploy.setup", &[Task::Setup], global)?;
            Ok((DeployOutput::Tasks(output), code))
        }
        DeployCommand::Check => {
            let (output, code) = run_tasks("deploy.check", &[Task::Check], global)?;
            Ok((DeployOutput::Tasks(output), code))
        }
    }
}

fn rollout_mode(
    mode: DeploymentMode,
    args: RolloutArgs,
    global: &crate::commands::GlobalArgs,
) -> CmdResult<DeployOutput> {
    let config = global.load_config()?;
    let deployment = DeploymentPlan::for_mode(mode, args.check);

    if args.dry_run {
        let tasks = deployment
            .tasks()
            .into_iter()
            .map(|task| PlannedTask {
                task: task.name(),
                target: task.target().map(|t| t.to_string()),
            })
            .collect();
        return Ok((
            DeployOutput::DryRun {
                mode,
                dry_run: true,
                tasks,
            },
            0,
        ));
    }

    let runner = SshRunner::new(&config.user);
    let ctx = TaskContext::new(&config, &runner);
    let report = plan::run_plan(&deployment, &ctx)?;

    Ok((DeployOutput::Report(report), 0))
}
