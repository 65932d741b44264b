use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use crate::policy::{BlackoutInterval, PolicyConfig, PolicyRule};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub engine: EngineKind,
    pub llm: LlmConfig,
    pub sentiment: SentimentConfig,
    pub orders: OrdersConfig,
    pub policy: PolicyConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Generative,
    Baseline,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub routing_temperature: f32,
    pub synthesis_temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SentimentConfig {
    pub base_url: Option<String>,
    /// Negative-confidence threshold at or above which the gate
    /// escalates. Kept above 1.0 by default so the placeholder
    /// classifier never fires unless explicitly lowered.
    pub threshold: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrdersMode {
    Simulated,
    Real,
}

#[derive(Clone, Debug)]
pub struct OrdersConfig {
    pub mode: OrdersMode,
    pub tracking_url: Option<String>,
    pub cancellation_url: Option<String>,
    pub timeout_secs: u64,
    pub simulated_failure_rate: f64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub engine: Option<EngineKind>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub orders_mode: Option<OrdersMode>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Generative,
            llm: LlmConfig {
                base_url: "http://localhost:8080".to_string(),
                model: "local".to_string(),
                api_key: None,
                routing_temperature: 0.15,
                synthesis_temperature: 0.5,
                timeout_secs: 30,
            },
            sentiment: SentimentConfig { base_url: None, threshold: 10.0 },
            orders: OrdersConfig {
                mode: OrdersMode::Simulated,
                tracking_url: None,
                cancellation_url: None,
                timeout_secs: 5,
                simulated_failure_rate: 0.1,
            },
            policy: PolicyConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for EngineKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "generative" => Ok(Self::Generative),
            "baseline" => Ok(Self::Baseline),
            other => Err(ConfigError::Validation(format!(
                "unsupported engine `{other}` (expected generative|baseline)"
            ))),
        }
    }
}

impl std::str::FromStr for OrdersMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "simulated" => Ok(Self::Simulated),
            "real" => Ok(Self::Real),
            other => Err(ConfigError::Validation(format!(
                "unsupported orders mode `{other}` (expected simulated|real)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    engine: Option<EnginePatch>,
    llm: Option<LlmPatch>,
    sentiment: Option<SentimentPatch>,
    orders: Option<OrdersPatch>,
    policy: Option<PolicyPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Deserialize)]
struct EnginePatch {
    kind: Option<EngineKind>,
}

#[derive(Debug, Deserialize)]
struct LlmPatch {
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    routing_temperature: Option<f32>,
    synthesis_temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SentimentPatch {
    base_url: Option<String>,
    threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OrdersPatch {
    mode: Option<OrdersMode>,
    tracking_url: Option<String>,
    cancellation_url: Option<String>,
    timeout_secs: Option<u64>,
    simulated_failure_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PolicyPatch {
    cancellation_window_days: Option<u32>,
    max_cancellations_per_month: Option<u32>,
    blackouts: Option<Vec<BlackoutPatch>>,
    precedence: Option<Vec<PolicyRule>>,
}

#[derive(Debug, Deserialize)]
struct BlackoutPatch {
    start: NaiveDate,
    end: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("zenbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(engine) = patch.engine {
            if let Some(kind) = engine.kind {
                self.engine = kind;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(api_key.into());
            }
            if let Some(routing_temperature) = llm.routing_temperature {
                self.llm.routing_temperature = routing_temperature;
            }
            if let Some(synthesis_temperature) = llm.synthesis_temperature {
                self.llm.synthesis_temperature = synthesis_temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(sentiment) = patch.sentiment {
            if let Some(base_url) = sentiment.base_url {
                self.sentiment.base_url = Some(base_url);
            }
            if let Some(threshold) = sentiment.threshold {
                self.sentiment.threshold = threshold;
            }
        }

        if let Some(orders) = patch.orders {
            if let Some(mode) = orders.mode {
                self.orders.mode = mode;
            }
            if let Some(tracking_url) = orders.tracking_url {
                self.orders.tracking_url = Some(tracking_url);
            }
            if let Some(cancellation_url) = orders.cancellation_url {
                self.orders.cancellation_url = Some(cancellation_url);
            }
            if let Some(timeout_secs) = orders.timeout_secs {
                self.orders.timeout_secs = timeout_secs;
            }
            if let Some(simulated_failure_rate) = orders.simulated_failure_rate {
                self.orders.simulated_failure_rate = simulated_failure_rate;
            }
        }

        if let Some(policy) = patch.policy {
            if let Some(window) = policy.cancellation_window_days {
                self.policy.cancellation_window_days = window;
            }
            if let Some(max) = policy.max_cancellations_per_month {
                self.policy.max_cancellations_per_month = max;
            }
            if let Some(blackouts) = policy.blackouts {
                self.policy.blackouts = blackouts
                    .into_iter()
                    .map(|entry| BlackoutInterval {
                        start: entry.start,
                        end: entry.end.unwrap_or(entry.start),
                    })
                    .collect();
            }
            if let Some(precedence) = policy.precedence {
                self.policy.precedence = precedence;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ZENBOT_ENGINE") {
            self.engine = value.parse()?;
        }

        if let Some(value) = read_env("ZENBOT_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("ZENBOT_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("ZENBOT_LLM_API_KEY") {
            self.llm.api_key = Some(value.into());
        }
        if let Some(value) = read_env("ZENBOT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("ZENBOT_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ZENBOT_SENTIMENT_URL") {
            self.sentiment.base_url = Some(value);
        }
        if let Some(value) = read_env("ZENBOT_SENTIMENT_THRESHOLD") {
            self.sentiment.threshold = parse_f64("ZENBOT_SENTIMENT_THRESHOLD", &value)?;
        }

        if let Some(value) = read_env("ZENBOT_ORDERS_MODE") {
            self.orders.mode = value.parse()?;
        } else if let Some(value) = read_env("ZENBOT_SIMULATE_API") {
            // Legacy switch: truthy means simulated, anything else real.
            let simulate = matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
            self.orders.mode = if simulate { OrdersMode::Simulated } else { OrdersMode::Real };
        }
        if let Some(value) = read_env("ZENBOT_TRACKING_URL") {
            self.orders.tracking_url = Some(value);
        }
        if let Some(value) = read_env("ZENBOT_CANCELLATION_URL") {
            self.orders.cancellation_url = Some(value);
        }
        if let Some(value) = read_env("ZENBOT_ORDERS_TIMEOUT_SECS") {
            self.orders.timeout_secs = parse_u64("ZENBOT_ORDERS_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ZENBOT_POLICY_WINDOW_DAYS") {
            self.policy.cancellation_window_days = parse_u32("ZENBOT_POLICY_WINDOW_DAYS", &value)?;
        }
        if let Some(value) = read_env("ZENBOT_POLICY_MAX_CANCELLATIONS") {
            self.policy.max_cancellations_per_month =
                parse_u32("ZENBOT_POLICY_MAX_CANCELLATIONS", &value)?;
        }

        if let Some(value) = read_env("ZENBOT_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("ZENBOT_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(engine) = overrides.engine {
            self.engine = engine;
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = base_url;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(mode) = overrides.orders_mode {
            self.orders.mode = mode;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("llm.base_url must not be empty".to_string()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
        }
        if self.llm.timeout_secs == 0 || self.llm.timeout_secs > 300 {
            return Err(ConfigError::Validation(
                "llm.timeout_secs must be in range 1..=300".to_string(),
            ));
        }

        if self.sentiment.threshold < 0.0 {
            return Err(ConfigError::Validation(
                "sentiment.threshold must not be negative".to_string(),
            ));
        }

        if self.orders.mode == OrdersMode::Real
            && (self.orders.tracking_url.is_none() || self.orders.cancellation_url.is_none())
        {
            return Err(ConfigError::Validation(
                "orders.tracking_url and orders.cancellation_url are required when orders.mode is `real`"
                    .to_string(),
            ));
        }
        if self.orders.timeout_secs == 0 || self.orders.timeout_secs > 300 {
            return Err(ConfigError::Validation(
                "orders.timeout_secs must be in range 1..=300".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.orders.simulated_failure_rate) {
            return Err(ConfigError::Validation(
                "orders.simulated_failure_rate must be in range 0.0..=1.0".to_string(),
            ));
        }

        if self.policy.cancellation_window_days == 0 {
            return Err(ConfigError::Validation(
                "policy.cancellation_window_days must be greater than zero".to_string(),
            ));
        }
        if self.policy.precedence.is_empty() {
            return Err(ConfigError::Validation(
                "policy.precedence must name at least one rule".to_string(),
            ));
        }
        for blackout in &self.policy.blackouts {
            if blackout.start > blackout.end {
                return Err(ConfigError::Validation(format!(
                    "policy blackout interval starts after it ends ({} > {})",
                    blackout.start, blackout.end
                )));
            }
        }

        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("zenbot.toml"), PathBuf::from("config/zenbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str::<ConfigPatch>(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .parse::<f64>()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::{AppConfig, ConfigError, ConfigOverrides, EngineKind, LoadOptions, OrdersMode};
    use crate::policy::PolicyRule;

    fn load_from_toml(contents: &str) -> Result<AppConfig, ConfigError> {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        })
    }

    #[test]
    fn defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine, EngineKind::Generative);
        assert_eq!(config.orders.mode, OrdersMode::Simulated);
        assert_eq!(config.policy.cancellation_window_days, 10);
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/zenbot.toml")),
            require_file: true,
            overrides: ConfigOverrides::default(),
        });
        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn toml_patch_overrides_defaults() {
        let config = load_from_toml(
            r#"
[engine]
kind = "baseline"

[llm]
model = "qwen2.5-7b-instruct"
timeout_secs = 10

[policy]
cancellation_window_days = 30
precedence = ["monthly_quota", "return_window", "blackout"]

[[policy.blackouts]]
start = "2025-11-27"
end = "2025-11-29"
"#,
        )
        .expect("config should load");

        assert_eq!(config.engine, EngineKind::Baseline);
        assert_eq!(config.llm.model, "qwen2.5-7b-instruct");
        assert_eq!(config.policy.cancellation_window_days, 30);
        assert_eq!(config.policy.precedence[0], PolicyRule::MonthlyQuota);
        assert_eq!(config.policy.blackouts.len(), 1);
        assert_eq!(config.policy.blackouts[0].end.to_string(), "2025-11-29");
    }

    #[test]
    fn real_orders_mode_requires_endpoints() {
        let result = load_from_toml(
            r#"
[orders]
mode = "real"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));

        let config = load_from_toml(
            r#"
[orders]
mode = "real"
tracking_url = "https://api.example.com/OrderTracking"
cancellation_url = "https://api.example.com/OrderCancellation"
"#,
        )
        .expect("config should load");
        assert_eq!(config.orders.mode, OrdersMode::Real);
    }

    #[test]
    fn inverted_blackout_interval_is_rejected() {
        let result = load_from_toml(
            r#"
[[policy.blackouts]]
start = "2025-12-26"
end = "2025-12-24"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn programmatic_overrides_win() {
        let config = AppConfig::load(LoadOptions {
            config_path: None,
            require_file: false,
            overrides: ConfigOverrides {
                engine: Some(EngineKind::Baseline),
                llm_model: Some("tiny".to_string()),
                ..ConfigOverrides::default()
            },
        })
        .expect("config should load");

        assert_eq!(config.engine, EngineKind::Baseline);
        assert_eq!(config.llm.model, "tiny");
    }
}
