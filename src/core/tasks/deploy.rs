//! Release lifecycle: directory layout, code checkout, the `current` symlink,
//! schema changes and the maintenance page.

use crate::command::RemoteCommand;
use crate::context::TaskContext;
use crate::error::Result;

use super::{run_on_target, Task};

/// Directories under the shared path that every release links to.
const SHARED_CHILDREN: [&str; 3] = ["log", "pids", "system"];

pub fn setup(ctx: &TaskContext) -> Result<()> {
    let config = ctx.config();
    let shared = config.shared_path();
    let dirs = [
        config.deploy_to(),
        config.releases_path(),
        shared.clone(),
        format!("{}/log", shared),
        format!("{}/system", shared),
        format!("{}/pids", shared),
        format!("{}/config", shared),
    ];

    let command = RemoteCommand::new("mkdir").arg("-p").args(dirs);
    run_on_target(ctx, Task::Setup, &command)
}

/// Remote prerequisites for a first deploy.
pub fn check(ctx: &TaskContext) -> Result<()> {
    let config = ctx.config();

    run_on_target(
        ctx,
        Task::Check,
        &RemoteCommand::new("test").arg("-d").arg(config.releases_path()),
    )?;
    run_on_target(
        ctx,
        Task::Check,
        &RemoteCommand::new("test").arg("-w").arg(config.deploy_to()),
    )?;

    for helper in config.helpers.all() {
        run_on_target(
            ctx,
            Task::Check,
            &RemoteCommand::new("command").arg("-v").arg(helper),
        )?;
    }

    Ok(())
}

pub fn update_code(ctx: &TaskContext) -> Result<()> {
    let config = ctx.config();
    let repository = config.repository()?;
    let release_path = ctx.release_path();

    let clone = RemoteCommand::new("git")
        .args(["clone", "-q", "--branch"])
        .arg(&config.branch)
        .arg(repository)
        .arg(&release_path);
    run_on_target(ctx, Task::UpdateCode, &clone)?;

    // Checked-in log, pid and upload directories are replaced by shared ones.
    let release_children = [
        format!("{}/log", release_path),
        format!("{}/tmp/pids", release_path),
        format!("{}/public/system", release_path),
    ];
    run_on_target(
        ctx,
        Task::UpdateCode,
        &RemoteCommand::new("rm").arg("-rf").args(release_children.clone()),
    )?;
    run_on_target(
        ctx,
        Task::UpdateCode,
        &RemoteCommand::new("mkdir").arg("-p").args([
            format!("{}/tmp", release_path),
            format!("{}/public", release_path),
        ]),
    )?;

    let shared = config.shared_path();
    for (child, link) in SHARED_CHILDREN.iter().zip(release_children) {
        let command = RemoteCommand::new("ln")
            .arg("-s")
            .arg(format!("{}/{}", shared, child))
            .arg(link);
        run_on_target(ctx, Task::UpdateCode, &command)?;
    }

    Ok(())
}

pub fn symlink(ctx: &TaskContext) -> Result<()> {
    let command = RemoteCommand::new("ln")
        .arg("-sfn")
        .arg(ctx.release_path())
        .arg(ctx.config().current_path());
    run_on_target(ctx, Task::Symlink, &command)
}

pub fn migrate(ctx: &TaskContext) -> Result<()> {
    run_on_target(ctx, Task::Migrate, &rake(ctx, "db:migrate"))
}

/// Destructive: replaces every table with the checked-in schema.
pub fn load_schema(ctx: &TaskContext) -> Result<()> {
    run_on_target(ctx, Task::LoadSchema, &rake(ctx, "db:schema:load"))
}

fn rake(ctx: &TaskContext, task: &str) -> RemoteCommand {
    let config = ctx.config();
    RemoteCommand::new(&config.rake)
        .arg(format!("RAILS_ENV={}", config.rails_env))
        .arg(task)
        .in_dir(config.current_path())
}

fn maintenance_page(ctx: &TaskContext) -> String {
    format!("{}/maintenance.html", ctx.config().system_dir())
}

pub fn web_disable(ctx: &TaskContext) -> Result<()> {
    let template = format!("{}/maintenance/index.html", ctx.config().system_dir());
    let command = RemoteCommand::new("cp")
        .arg("-f")
        .arg(template)
        .arg(maintenance_page(ctx));
    run_on_target(ctx, Task::WebDisable, &command)
}

pub fn web_enable(ctx: &TaskContext) -> Result<()> {
    let command = RemoteCommand::new("rm").arg("-f").arg(maintenance_page(ctx));
    run_on_target(ctx, Task::WebEnable, &command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::FakeRunner;
    use crate::tasks::test_support;

    const RELEASE: &str = "20260101120000";

    #[test]
    fn setup_creates_layout_on_release_hosts() {
        let config = test_support::config();
        let runner = FakeRunner::new();
        let ctx = TaskContext::new(&config, &runner);

        setup(&ctx).unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(host, _)| host != "sqlreadwrite-1"));
        assert!(calls[0].1.starts_with("mkdir -p /home/rails/shop /home/rails/shop/releases"));
        assert!(calls[0].1.contains("/home/rails/shop/shared/pids"));
    }

    #[test]
    fn update_code_clones_into_release_and_links_shared_dirs() {
        let config = test_support::config();
        let runner = FakeRunner::new();
        let ctx = TaskContext::new(&config, &runner).with_release_name(RELEASE);

        update_code(&ctx).unwrap();

        let commands = runner.commands();
        assert_eq!(
            commands[0],
            "git clone -q --branch master git@example.com:shop.git /home/rails/shop/releases/20260101120000"
        );
        assert!(runner.ran(
            "ln -s /home/rails/shop/shared/pids /home/rails/shop/releases/20260101120000/tmp/pids"
        ));
        assert!(runner.ran(
            "ln -s /home/rails/shop/shared/system /home/rails/shop/releases/20260101120000/public/system"
        ));
    }

    #[test]
    fn update_code_requires_repository() {
        let mut config = test_support::config();
        config.repository = None;
        let runner = FakeRunner::new();
        let ctx = TaskContext::new(&config, &runner);

        let err = update_code(&ctx).unwrap_err();
        assert_eq!(err.code.as_str(), "config.missing_key");
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn symlink_points_current_at_release() {
        let config = test_support::config();
        let runner = FakeRunner::new();
        let ctx = TaskContext::new(&config, &runner).with_release_name(RELEASE);

        symlink(&ctx).unwrap();

        assert_eq!(
            runner.commands()[0],
            "ln -sfn /home/rails/shop/releases/20260101120000 /home/rails/shop/current"
        );
    }

    #[test]
    fn migrate_runs_once_on_primary_db_host() {
        let config = test_support::config().with_rails_env("staging");
        let runner = FakeRunner::new();
        let ctx = TaskContext::new(&config, &runner);

        migrate(&ctx).unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "sqlreadwrite-1");
        assert_eq!(
            calls[0].1,
            "cd '/home/rails/shop/current' && rake RAILS_ENV=staging db:migrate"
        );
    }

    #[test]
    fn web_disable_and_enable_manage_maintenance_page() {
        let config = test_support::config();
        let runner = FakeRunner::new();
        let ctx = TaskContext::new(&config, &runner);

        web_disable(&ctx).unwrap();
        web_enable(&ctx).unwrap();

        let commands = runner.commands();
        assert_eq!(
            commands[0],
            "cp -f /home/rails/shop/shared/system/maintenance/index.html /home/rails/shop/shared/system/maintenance.html"
        );
        assert_eq!(
            commands[2],
            "rm -f /home/rails/shop/shared/system/maintenance.html"
        );
    }

    #[test]
    fn check_looks_for_every_helper_command() {
        let config = test_support::config();
        let runner = FakeRunner::new();
        let ctx = TaskContext::new(&config, &runner);

        check(&ctx).unwrap();

        for helper in [
            "railsapp-monit",
            "railsapp-apache",
            "railsapp-nginx",
            "railsapp-mongrel",
            "railsapp-logrotate",
            "railsapp-maintenance",
        ] {
            assert!(runner.ran(&format!("command -v {}", helper)), "{}", helper);
        }
    }

    #[test]
    fn check_stops_at_first_failure() {
        let config = test_support::config();
        let runner = FakeRunner::new().fail_on("test -d", "");
        let ctx = TaskContext::new(&config, &runner);

        let err = check(&ctx).unwrap_err();
        assert_eq!(err.details["target"]["task"], "deploy:check");
        assert!(!runner.ran("command -v"));
    }
}
