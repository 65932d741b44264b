use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ValidationError;
use crate::trace::DecisionTrace;

/// Immutable structured input for one request. Built once from the raw
/// order JSON before any stage runs; never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderContext {
    pub order_id: String,
    pub user_id: String,
    pub order_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct RawOrderInfo {
    order_id: Option<String>,
    order_date: Option<String>,
    user_id: Option<String>,
}

impl OrderContext {
    pub fn from_json(raw: &str) -> Result<Self, ValidationError> {
        let parsed: RawOrderInfo = serde_json::from_str(raw)
            .map_err(|error| ValidationError::MalformedJson(error.to_string()))?;

        let order_id = require_field("order_id", parsed.order_id)?;
        let user_id = require_field("user_id", parsed.user_id)?;
        let order_date_raw = require_field("order_date", parsed.order_date)?;
        let order_date = NaiveDate::parse_from_str(&order_date_raw, "%Y-%m-%d")
            .map_err(|_| ValidationError::InvalidOrderDate { value: order_date_raw })?;

        Ok(Self { order_id, user_id, order_date })
    }
}

fn require_field(name: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ValidationError::MissingField(name)),
    }
}

/// The user's desired action, normalized. Set exactly once per request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Track,
    Cancel,
    None,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Cancel => "cancel",
            Self::None => "none",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyReason {
    WithinWindow,
    WindowExpired,
    QuotaExceeded,
    BlackoutDate,
    NotApplicable,
}

impl PolicyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WithinWindow => "within_window",
            Self::WindowExpired => "window_expired",
            Self::QuotaExceeded => "quota_exceeded",
            Self::BlackoutDate => "blackout_date",
            Self::NotApplicable => "not_applicable",
        }
    }
}

/// Outcome of cancellation-policy evaluation. For `track`/`none`
/// intents the policy is vacuously satisfied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub reason: PolicyReason,
}

impl PolicyDecision {
    pub fn allow() -> Self {
        Self { allowed: true, reason: PolicyReason::WithinWindow }
    }

    pub fn deny(reason: PolicyReason) -> Self {
        Self { allowed: false, reason }
    }

    pub fn not_applicable() -> Self {
        Self { allowed: true, reason: PolicyReason::NotApplicable }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Ok,
    Error,
    Skipped,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }
}

/// Result of the backend action. `skipped` when no intent was detected,
/// policy denied the action, or the request escalated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,
    pub payload: Value,
}

impl ToolResult {
    pub fn ok(payload: Value) -> Self {
        Self { status: ToolStatus::Ok, payload }
    }

    pub fn error(payload: Value) -> Self {
        Self { status: ToolStatus::Error, payload }
    }

    pub fn skipped() -> Self {
        Self { status: ToolStatus::Skipped, payload: Value::Null }
    }
}

/// The externally observable result of one pipeline run. Present for
/// every terminated request, including escalations and tool failures.
#[derive(Clone, Debug, Serialize)]
pub struct Reply {
    pub text: String,
    pub intent: Intent,
    pub policy: PolicyDecision,
    pub tool: ToolResult,
    pub escalated: bool,
    pub trace: DecisionTrace,
}
