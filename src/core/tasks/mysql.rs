//! MySQL schema creation for first deploys.

use std::path::Path;

use crate::command::RemoteCommand;
use crate::context::{ensure_success, TaskContext};
use crate::database::{validate_db_config, DatabaseConfig};
use crate::error::{Error, Result};
use crate::ssh::{CommandOutput, PromptResponder};

use super::Task;

/// Text in MySQL's ER_DB_CREATE_EXISTS (1007) message.
const DATABASE_EXISTS: &str = "database exists";

/// Create the database named in `database.yml` on the primary db host.
pub fn create_database(ctx: &TaskContext) -> Result<()> {
    let config = ctx.config();
    let db = DatabaseConfig::load(Path::new(&config.database_config), &config.rails_env)?;
    create_database_with(ctx, &db)
}

pub fn create_database_with(ctx: &TaskContext, db: &DatabaseConfig) -> Result<()> {
    validate_db_config(db);

    if !db.is_mysql() {
        tracing::info!(adapter = %db.adapter, "skipping database creation for non-mysql adapter");
        log_status!("mysql", "Adapter '{}' is not mysql, skipping", db.adapter);
        return Ok(());
    }

    let task = Task::CreateDatabase;
    let target = task
        .target()
        .ok_or_else(|| Error::internal_unexpected("mysql:create_database has no target"))?;
    let line = RemoteCommand::new("mysql")
        .flag("-h", &db.host)
        .arg(format!("--user={}", db.username))
        .arg("-p")
        .arg(format!("--execute=CREATE DATABASE {}", db.database))
        .render();

    for host in ctx.topology().require_hosts(target, task.name())? {
        let mut responder = PromptResponder::mysql_password(db.password.as_str())?;
        let output = ctx.execute_raw_with_responder(host, &line, &mut responder)?;

        if already_exists(&output) {
            return Err(Error::database_already_exists(
                &db.database,
                &host.host,
                output.stderr,
            ));
        }
        ensure_success(task.name(), host, &line, &output)?;

        log_status!("mysql", "Created database {} on {}", db.database, host.host);
    }

    Ok(())
}

/// With a tty allocated the remote error can arrive on either stream.
fn already_exists(output: &CommandOutput) -> bool {
    !output.success
        && (output.stderr.contains(DATABASE_EXISTS) || output.stdout.contains(DATABASE_EXISTS))
}
