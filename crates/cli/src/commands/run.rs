use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Args;
use serde_json::json;
use zenbot_agent::pipeline::Pipeline;
use zenbot_core::config::{AppConfig, ConfigOverrides, EngineKind, LoadOptions};

use super::CommandResult;

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long, help = "The user's message")]
    pub text: String,
    #[arg(
        long,
        help = "Order info JSON with order_id, order_date (YYYY-MM-DD), and user_id"
    )]
    pub order: String,
    #[arg(long, help = "Evaluate policy as of this date instead of today (YYYY-MM-DD)")]
    pub as_of: Option<NaiveDate>,
    #[arg(long, help = "Decision engine to use (generative|baseline)")]
    pub engine: Option<EngineKindArg>,
    #[arg(long, help = "Path to a zenbot.toml config file")]
    pub config: Option<PathBuf>,
    #[arg(long, help = "Emit the full reply and decision trace as JSON")]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum EngineKindArg {
    Generative,
    Baseline,
}

impl From<EngineKindArg> for EngineKind {
    fn from(value: EngineKindArg) -> Self {
        match value {
            EngineKindArg::Generative => EngineKind::Generative,
            EngineKindArg::Baseline => EngineKind::Baseline,
        }
    }
}

pub async fn execute(args: RunArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions {
        config_path: args.config,
        require_file: false,
        overrides: ConfigOverrides {
            engine: args.engine.map(EngineKind::from),
            ..ConfigOverrides::default()
        },
    }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult { exit_code: 1, output: format!("configuration error: {error}") }
        }
    };

    crate::init_logging(&config);

    let pipeline = Pipeline::from_config(&config);
    let result = match args.as_of {
        Some(as_of) => pipeline.run_as_of(&args.text, &args.order, as_of).await,
        None => pipeline.run(&args.text, &args.order).await,
    };

    match result {
        Ok(reply) => {
            let output = if args.json {
                serde_json::to_string_pretty(&reply)
                    .unwrap_or_else(|error| format!("{{\"error\": \"{error}\"}}"))
            } else {
                reply.text.clone()
            };
            CommandResult { exit_code: 0, output }
        }
        Err(error) => {
            let output = if args.json {
                serde_json::to_string_pretty(&json!({
                    "error": "validation_failed",
                    "detail": error.to_string(),
                    "message": error.user_message(),
                }))
                .unwrap_or_else(|serialize_error| format!("{{\"error\": \"{serialize_error}\"}}"))
            } else {
                format!("{}\n({error})", error.user_message())
            };
            CommandResult { exit_code: 2, output }
        }
    }
}
