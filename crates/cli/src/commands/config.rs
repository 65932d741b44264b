use std::path::PathBuf;

use clap::Args;
use serde_json::json;
use zenbot_core::config::{AppConfig, EngineKind, LoadOptions, LogFormat, OrdersMode};

use super::CommandResult;

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long, help = "Path to a zenbot.toml config file")]
    pub config: Option<PathBuf>,
}

pub fn execute(args: ConfigArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions {
        config_path: args.config,
        require_file: false,
        overrides: Default::default(),
    }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult { exit_code: 1, output: format!("configuration error: {error}") }
        }
    };

    let rendered = json!({
        "engine": match config.engine {
            EngineKind::Generative => "generative",
            EngineKind::Baseline => "baseline",
        },
        "llm": {
            "base_url": config.llm.base_url,
            "model": config.llm.model,
            "api_key": config.llm.api_key.as_ref().map(|_| "***"),
            "routing_temperature": config.llm.routing_temperature,
            "synthesis_temperature": config.llm.synthesis_temperature,
            "timeout_secs": config.llm.timeout_secs,
        },
        "sentiment": {
            "base_url": config.sentiment.base_url,
            "threshold": config.sentiment.threshold,
        },
        "orders": {
            "mode": match config.orders.mode {
                OrdersMode::Simulated => "simulated",
                OrdersMode::Real => "real",
            },
            "tracking_url": config.orders.tracking_url,
            "cancellation_url": config.orders.cancellation_url,
            "timeout_secs": config.orders.timeout_secs,
            "simulated_failure_rate": config.orders.simulated_failure_rate,
        },
        "policy": {
            "cancellation_window_days": config.policy.cancellation_window_days,
            "max_cancellations_per_month": config.policy.max_cancellations_per_month,
            "blackouts": config.policy.blackouts,
            "precedence": config.policy.precedence,
        },
        "logging": {
            "level": config.logging.level,
            "format": match config.logging.format {
                LogFormat::Compact => "compact",
                LogFormat::Pretty => "pretty",
                LogFormat::Json => "json",
            },
        },
    });

    let output = serde_json::to_string_pretty(&rendered)
        .unwrap_or_else(|error| format!("{{\"error\": \"{error}\"}}"));
    CommandResult { exit_code: 0, output }
}
