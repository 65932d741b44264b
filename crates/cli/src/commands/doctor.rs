use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use serde::Serialize;
use zenbot_core::config::{AppConfig, LoadOptions, OrdersMode};

use super::CommandResult;

#[derive(Debug, Args)]
pub struct DoctorArgs {
    #[arg(long, help = "Path to a zenbot.toml config file")]
    pub config: Option<PathBuf>,
    #[arg(long, help = "Emit machine-readable JSON output")]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub async fn execute(args: DoctorArgs) -> CommandResult {
    let report = build_report(args.config).await;
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if args.json {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!("{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed: {error}\"}}")
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

async fn build_report(config_path: Option<PathBuf>) -> DoctorReport {
    let mut checks = Vec::new();

    let config = match AppConfig::load(LoadOptions {
        config_path,
        require_file: false,
        overrides: Default::default(),
    }) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            Some(config)
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            None
        }
    };

    if let Some(config) = config {
        checks.push(probe("llm_backend", Some(&config.llm.base_url)).await);
        checks.push(probe("sentiment_classifier", config.sentiment.base_url.as_deref()).await);

        match config.orders.mode {
            OrdersMode::Simulated => checks.push(DoctorCheck {
                name: "order_api",
                status: CheckStatus::Skipped,
                details: "orders.mode is simulated; no endpoint to probe".to_string(),
            }),
            OrdersMode::Real => {
                checks.push(probe("order_api", config.orders.tracking_url.as_deref()).await);
            }
        }
    }

    let overall_status = if checks.iter().any(|check| check.status == CheckStatus::Fail) {
        CheckStatus::Fail
    } else {
        CheckStatus::Pass
    };
    let summary = match overall_status {
        CheckStatus::Fail => "one or more checks failed".to_string(),
        _ => "all checks passed".to_string(),
    };

    DoctorReport { overall_status, summary, checks }
}

/// Reachability probe: any HTTP response counts as reachable, only
/// transport failures count against the check.
async fn probe(name: &'static str, base_url: Option<&str>) -> DoctorCheck {
    let Some(base_url) = base_url else {
        return DoctorCheck {
            name,
            status: CheckStatus::Skipped,
            details: "no endpoint configured".to_string(),
        };
    };

    let client = match reqwest::Client::builder().timeout(Duration::from_secs(5)).build() {
        Ok(client) => client,
        Err(error) => {
            return DoctorCheck { name, status: CheckStatus::Fail, details: error.to_string() }
        }
    };

    match client.get(base_url).send().await {
        Ok(response) => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("endpoint reachable ({})", response.status()),
        },
        Err(error) => DoctorCheck { name, status: CheckStatus::Fail, details: error.to_string() },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(format!("doctor: {}", report.summary));
    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("  [{marker}] {} - {}", check.name, check.details));
    }
    lines.join("\n")
}
