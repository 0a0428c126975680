//! Apache on the web hosts.

use crate::context::TaskContext;
use crate::error::Result;

use super::{configure, run_on_target, Task, APACHECTL_BIN};

/// Write the vhost for this app, then syntax-check the whole config.
pub fn setup(ctx: &TaskContext) -> Result<()> {
    configure::apache(ctx)?;
    config_test(ctx, Task::ApacheSetup)
}

pub fn reload(ctx: &TaskContext) -> Result<()> {
    config_test(ctx, Task::ApacheReload)?;
    run_on_target(
        ctx,
        Task::ApacheReload,
        &ctx.privileged(APACHECTL_BIN).arg("graceful"),
    )
}

pub fn restart(ctx: &TaskContext) -> Result<()> {
    config_test(ctx, Task::ApacheRestart)?;
    run_on_target(
        ctx,
        Task::ApacheRestart,
        &ctx.privileged("/etc/init.d/apache2").arg("restart"),
    )
}

/// A broken config stops the task before Apache is touched.
fn config_test(ctx: &TaskContext, task: Task) -> Result<()> {
    run_on_target(ctx, task, &ctx.privileged(APACHECTL_BIN).arg("-t"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::FakeRunner;
    use crate::tasks::test_support;

    #[test]
    fn reload_checks_config_before_graceful() {
        let config = test_support::config();
        let runner = FakeRunner::new();
        let ctx = TaskContext::new(&config, &runner);

        reload(&ctx).unwrap();

        assert_eq!(
            runner.commands(),
            vec![
                "sudo /usr/sbin/apache2ctl -t",
                "sudo /usr/sbin/apache2ctl -t",
                "sudo /usr/sbin/apache2ctl graceful",
                "sudo /usr/sbin/apache2ctl graceful",
            ]
        );
    }

    #[test]
    fn broken_config_prevents_restart() {
        let config = test_support::config();
        let runner = FakeRunner::new().fail_on("apache2ctl -t", "Syntax error on line 3");
        let ctx = TaskContext::new(&config, &runner);

        let err = restart(&ctx).unwrap_err();

        assert!(err.message.contains("Syntax error"));
        assert!(!runner.ran("/etc/init.d/apache2"));
    }

    #[test]
    fn setup_writes_vhost_then_tests_config() {
        let config = test_support::config();
        let runner = FakeRunner::new();
        let ctx = TaskContext::new(&config, &runner);

        setup(&ctx).unwrap();

        let vhost = runner.position("railsapp-apache").unwrap();
        let test = runner.position("apache2ctl -t").unwrap();
        assert!(vhost < test);
    }
}
