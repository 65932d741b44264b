pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use zenbot_core::config::{AppConfig, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "zenbot",
    about = "ZenBot order support pipeline CLI",
    long_about = "Run single-turn order support requests through the ZenBot decision pipeline, inspect configuration, and check collaborator readiness.",
    after_help = "Examples:\n  zenbot run --text 'track my order' --order '{\"order_id\": \"123\", \"order_date\": \"2025-04-20\", \"user_id\": \"user_1\"}'\n  zenbot config\n  zenbot doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run one request through the decision pipeline and print the reply")]
    Run(commands::run::RunArgs),
    #[command(about = "Inspect effective configuration values with secrets redacted")]
    Config(commands::config::ConfigArgs),
    #[command(about = "Validate config and probe the configured collaborators")]
    Doctor(commands::doctor::DoctorArgs),
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run(args) => block_on(commands::run::execute(args)),
        Command::Config(args) => commands::config::execute(args),
        Command::Doctor(args) => block_on(commands::doctor::execute(args)),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn block_on(
    future: impl std::future::Future<Output = commands::CommandResult>,
) -> commands::CommandResult {
    match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime.block_on(future),
        Err(error) => commands::CommandResult {
            exit_code: 1,
            output: format!("failed to start async runtime: {error}"),
        },
    }
}

pub fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        LogFormat::Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}
