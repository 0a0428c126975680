//! Deployment orchestration.
//!
//! A [`DeploymentPlan`] is the ordered list of steps for one
//! [`DeploymentMode`]. Steps run strictly in order and the first failure
//! aborts the plan. A [`Step::Transaction`] groups steps that must all
//! succeed for the release to go live; completed steps are not undone.

use std::time::Instant;

use serde::Serialize;

use crate::context::TaskContext;
use crate::error::Result;
use crate::tasks::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeploymentMode {
    /// First deploy: database, process supervision and vhost are created.
    #[serde(rename = "cold")]
    Cold,
    /// Roll out a new release behind the maintenance page.
    #[serde(rename = "default")]
    Standard,
    /// Standard, with pending migrations applied before the restart.
    #[serde(rename = "migrations")]
    WithMigrations,
}

impl DeploymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMode::Cold => "cold",
            DeploymentMode::Standard => "default",
            DeploymentMode::WithMigrations => "migrations",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Task(Task),
    Transaction(Vec<Step>),
}

impl Step {
    /// Tasks in execution order, transactions flattened.
    pub fn tasks(&self) -> Vec<Task> {
        match self {
            Step::Task(task) => vec![*task],
            Step::Transaction(steps) => steps.iter().flat_map(Step::tasks).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    pub mode: DeploymentMode,
    pub steps: Vec<Step>,
}

impl DeploymentPlan {
    pub fn for_mode(mode: DeploymentMode, preflight: bool) -> Self {
        let mut steps = Vec::new();
        if preflight {
            steps.push(Step::Task(Task::ConfigureCheck));
        }

        match mode {
            DeploymentMode::Cold => {
                steps.push(Step::Transaction(vec![
                    Step::Task(Task::UpdateCode),
                    Step::Task(Task::Symlink),
                ]));
                steps.extend(
                    [
                        Task::CreateDatabase,
                        Task::LoadSchema,
                        Task::Migrate,
                        Task::ConfigureMongrel,
                        Task::MonitConfigure,
                        Task::MonitReload,
                        Task::StartCluster,
                        Task::ApacheSetup,
                        Task::ApacheReload,
                    ]
                    .into_iter()
                    .map(Step::Task),
                );
            }
            DeploymentMode::Standard | DeploymentMode::WithMigrations => {
                let mut rollout = vec![
                    Step::Task(Task::UpdateCode),
                    Step::Task(Task::WebDisable),
                    Step::Task(Task::Symlink),
                ];
                if mode == DeploymentMode::WithMigrations {
                    rollout.push(Step::Task(Task::Migrate));
                }
                rollout.push(Step::Task(Task::RestartCluster));

                steps.push(Step::Transaction(rollout));
                steps.push(Step::Task(Task::WebEnable));
            }
        }

        Self { mode, steps }
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.steps.iter().flat_map(Step::tasks).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReport {
    pub task: String,
    pub hosts: Vec<String>,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReport {
    pub mode: DeploymentMode,
    pub release: String,
    pub tasks: Vec<TaskReport>,
}

pub fn run_deployment(mode: DeploymentMode, ctx: &TaskContext) -> Result<PlanReport> {
    run_plan(&DeploymentPlan::for_mode(mode, false), ctx)
}

pub fn run_plan(plan: &DeploymentPlan, ctx: &TaskContext) -> Result<PlanReport> {
    tracing::info!(
        mode = plan.mode.as_str(),
        release = ctx.release_name(),
        "starting deployment"
    );
    log_status!(
        "deploy",
        "Deploying {} ({}) as release {}",
        ctx.config().application,
        plan.mode.as_str(),
        ctx.release_name()
    );

    let mut report = PlanReport {
        mode: plan.mode,
        release: ctx.release_name().to_string(),
        tasks: Vec::new(),
    };

    for step in &plan.steps {
        run_step(step, ctx, &mut report)?;
    }

    Ok(report)
}

/// A task is a barrier: it returns only after every target host finished.
pub fn run_task(task: Task, ctx: &TaskContext) -> Result<TaskReport> {
    let started = Instant::now();
    ctx.take_touched_hosts();
    task.execute(ctx)?;
    Ok(TaskReport {
        task: task.name().to_string(),
        hosts: ctx.take_touched_hosts(),
        elapsed_ms: started.elapsed().as_millis(),
    })
}

fn run_step(step: &Step, ctx: &TaskContext, report: &mut PlanReport) -> Result<()> {
    match step {
        Step::Task(task) => {
            let task_report = run_task(*task, ctx)?;
            report.tasks.push(task_report);
            Ok(())
        }
        Step::Transaction(steps) => {
            for inner in steps {
                if let Err(err) = run_step(inner, ctx, report) {
                    tracing::error!(
                        code = err.code.as_str(),
                        completed = report.tasks.len(),
                        "transaction aborted, completed steps are left in place"
                    );
                    log_status!("deploy", "Transaction aborted: {}", err.message);
                    return Err(err);
                }
            }
            Ok(())
        }
    }
}
