//! Named tasks.
//!
//! Each [`Task`] is a short list of remote commands run against the hosts its
//! [`Target`] resolves to. Names follow the `namespace:task` convention used
//! on the command line and in plan reports.

pub mod apache;
pub mod configure;
pub mod deploy;
pub mod monit;
pub mod mysql;

use std::fmt;

use crate::context::TaskContext;
use crate::error::Result;
use crate::role::{Role, Target};

/// Full path of the monit binary on the target hosts.
pub const MONIT_BIN: &str = "/usr/sbin/monit";
/// Full path of the Apache control binary on the target hosts.
pub const APACHECTL_BIN: &str = "/usr/sbin/apache2ctl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Setup,
    Check,
    UpdateCode,
    Symlink,
    Migrate,
    LoadSchema,
    WebDisable,
    WebEnable,

    CreateDatabase,

    ApacheSetup,
    ApacheReload,
    ApacheRestart,

    MonitConfigure,
    MonitStatus,
    MonitReload,
    MonitRestart,
    StartCluster,
    StopCluster,
    RestartCluster,

    ConfigureApache,
    ConfigureMongrel,
    ConfigureMonit,
    ConfigureLogrotation,
    ConfigureMaintenance,
    ConfigureCheck,
    ConfigureKnownHosts,
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::Setup => "deploy:setup",
            Task::Check => "deploy:check",
            Task::UpdateCode => "deploy:update_code",
            Task::Symlink => "deploy:symlink",
            Task::Migrate => "deploy:migrate",
            Task::LoadSchema => "load_schema",
            Task::WebDisable => "deploy:web:disable",
            Task::WebEnable => "deploy:web:enable",

            Task::CreateDatabase => "mysql:create_database",

            Task::ApacheSetup => "apache:setup",
            Task::ApacheReload => "apache:reload",
            Task::ApacheRestart => "apache:restart",

            Task::MonitConfigure => "monit:configure",
            Task::MonitStatus => "monit:status",
            Task::MonitReload => "monit:reload",
            Task::MonitRestart => "monit:restart",
            Task::StartCluster => "monit:mongrel:start_cluster",
            Task::StopCluster => "monit:mongrel:stop_cluster",
            Task::RestartCluster => "monit:mongrel:restart_cluster",

            Task::ConfigureApache => "configure:apache",
            Task::ConfigureMongrel => "configure:mongrel",
            Task::ConfigureMonit => "configure:monit",
            Task::ConfigureLogrotation => "configure:logrotation",
            Task::ConfigureMaintenance => "configure:maintenance",
            Task::ConfigureCheck => "configure:check",
            Task::ConfigureKnownHosts => "configure:known_hosts",
        }
    }

    /// Hosts the task's commands run on. `None` for tasks that only
    /// coordinate other tasks or run on the local machine.
    pub fn target(&self) -> Option<Target> {
        match self {
            Task::Setup | Task::Check | Task::UpdateCode | Task::Symlink => {
                Some(Target::AllReleaseHosts)
            }
            Task::Migrate | Task::LoadSchema | Task::CreateDatabase => {
                Some(Target::Primary(Role::Db))
            }
            Task::WebDisable | Task::WebEnable | Task::ConfigureMaintenance => {
                Some(Target::ReleaseRole(Role::Web))
            }
            Task::ApacheSetup | Task::ApacheReload | Task::ApacheRestart | Task::ConfigureApache => {
                Some(Target::Role(Role::Web))
            }
            Task::MonitConfigure
            | Task::MonitStatus
            | Task::MonitReload
            | Task::MonitRestart
            | Task::StartCluster
            | Task::StopCluster
            | Task::RestartCluster
            | Task::ConfigureMongrel
            | Task::ConfigureMonit => Some(Target::Role(Role::App)),
            Task::ConfigureLogrotation => Some(Target::ReleaseRole(Role::App)),
            Task::ConfigureCheck | Task::ConfigureKnownHosts => None,
        }
    }

    pub fn execute(&self, ctx: &TaskContext) -> Result<()> {
        tracing::info!(task = self.name(), "running task");
        log_status!("deploy", "Running {}", self.name());

        match self {
            Task::Setup => deploy::setup(ctx),
            Task::Check => deploy::check(ctx),
            Task::UpdateCode => deploy::update_code(ctx),
            Task::Symlink => deploy::symlink(ctx),
            Task::Migrate => deploy::migrate(ctx),
            Task::LoadSchema => deploy::load_schema(ctx),
            Task::WebDisable => deploy::web_disable(ctx),
            Task::WebEnable => deploy::web_enable(ctx),

            Task::CreateDatabase => mysql::create_database(ctx),

            Task::ApacheSetup => apache::setup(ctx),
            Task::ApacheReload => apache::reload(ctx),
            Task::ApacheRestart => apache::restart(ctx),

            Task::MonitConfigure => monit::configure(ctx),
            Task::MonitStatus => monit::status(ctx).map(|_| ()),
            Task::MonitReload => monit::reload(ctx),
            Task::MonitRestart => monit::restart(ctx),
            Task::StartCluster => monit::start_cluster(ctx),
            Task::StopCluster => monit::stop_cluster(ctx),
            Task::RestartCluster => monit::restart_cluster(ctx),

            Task::ConfigureApache => configure::apache(ctx),
            Task::ConfigureMongrel => configure::mongrel(ctx),
            Task::ConfigureMonit => configure::monit(ctx),
            Task::ConfigureLogrotation => configure::logrotation(ctx),
            Task::ConfigureMaintenance => configure::maintenance(ctx),
            Task::ConfigureCheck => configure::check(ctx),
            Task::ConfigureKnownHosts => configure::known_hosts(ctx).map(|_| ()),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run one task's command against the task's own target.
pub(crate) fn run_on_target(
    ctx: &TaskContext,
    task: Task,
    command: &crate::command::RemoteCommand,
) -> Result<()> {
    match task.target() {
        Some(target) => ctx.run(task.name(), target, command),
        None => Err(crate::error::Error::internal_unexpected(format!(
            "Task '{}' has no remote target",
            task.name()
        ))),
    }
}
