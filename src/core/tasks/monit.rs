//! The monit supervisor and the mongrel cluster it supervises.

use crate::context::TaskContext;
use crate::error::Result;
use crate::role::{Role, Target};
use crate::ssh::CommandOutput;

use super::{configure, run_on_target, Task, MONIT_BIN};

pub fn configure(ctx: &TaskContext) -> Result<()> {
    configure::monit(ctx)
}

/// Status summary from every app host, keyed by host.
pub fn status(ctx: &TaskContext) -> Result<Vec<(String, CommandOutput)>> {
    let command = ctx.privileged(MONIT_BIN).arg("status");
    ctx.capture(Task::MonitStatus.name(), Target::Role(Role::App), &command)
}

/// Reload monit's configuration and give it time to re-read process groups.
pub fn reload(ctx: &TaskContext) -> Result<()> {
    run_on_target(ctx, Task::MonitReload, &ctx.privileged(MONIT_BIN).arg("reload"))?;
    ctx.settle();
    Ok(())
}

pub fn restart(ctx: &TaskContext) -> Result<()> {
    run_on_target(
        ctx,
        Task::MonitRestart,
        &ctx.privileged("/etc/init.d/monit").arg("restart"),
    )
}

pub fn start_cluster(ctx: &TaskContext) -> Result<()> {
    cluster(ctx, Task::StartCluster, "start")
}

pub fn stop_cluster(ctx: &TaskContext) -> Result<()> {
    cluster(ctx, Task::StopCluster, "stop")
}

pub fn restart_cluster(ctx: &TaskContext) -> Result<()> {
    cluster(ctx, Task::RestartCluster, "restart")
}

/// Act on every process in the application's monit group.
fn cluster(ctx: &TaskContext, task: Task, action: &str) -> Result<()> {
    let command = ctx
        .privileged(MONIT_BIN)
        .flag("-g", &ctx.config().application)
        .args([action, "all"]);
    run_on_target(ctx, task, &command)
}
