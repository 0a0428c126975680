use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::GlobalArgs;

mod commands;
mod output;

use capstan::config::DEFAULT_CONFIG_FILE;
use commands::{apache, configure, deploy, load_schema, monit, mysql, web};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the tracing filter directive.
const LOG_ENV: &str = "CAPSTAN_LOG";

#[derive(Parser)]
#[command(name = "capstan")]
#[command(version = VERSION)]
#[command(about = "Deploy and manage a mongrel/monit/Apache application fleet over SSH")]
struct Cli {
    /// Deploy config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Environment label; overrides railsEnv from the config
    #[arg(long, global = true)]
    env: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy releases and prepare hosts
    Deploy(deploy::DeployArgs),
    /// Maintenance page control
    Web(web::WebArgs),
    /// Apache on the web hosts
    Apache(apache::ApacheArgs),
    /// monit and the mongrel cluster on the app hosts
    Monit(monit::MonitArgs),
    /// MySQL database bootstrap
    Mysql(mysql::MysqlArgs),
    /// Load the schema on the primary db host (drops existing tables)
    LoadSchema(load_schema::LoadSchemaArgs),
    /// Run the host configuration helpers
    Configure(configure::ConfigureArgs),
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let global = GlobalArgs {
        config: cli.config,
        env: cli.env,
    };

    let outcome = commands::run(cli.command, &global);
    if let Err(err) = outcome.print() {
        tracing::error!(code = err.code.as_str(), "{}", err.message);
    }

    std::process::ExitCode::from(exit_code_to_u8(outcome.exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
