use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    SentimentCheck,
    IntentResolution,
    PolicyCheck,
    ToolInvocation,
    ResponseSynthesis,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SentimentCheck => "sentiment_check",
            Self::IntentResolution => "intent_resolution",
            Self::PolicyCheck => "policy_check",
            Self::ToolInvocation => "tool_invocation",
            Self::ResponseSynthesis => "response_synthesis",
        }
    }
}

/// One executed (or explicitly skipped) pipeline stage. Skipped stages
/// are recorded with `output_summary = "skipped"`, never omitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageName,
    pub input_summary: String,
    pub output_summary: String,
    pub latency_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Ordered, append-only audit log of one request. The unit handed to
/// the trace sink when the pipeline terminates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionTrace {
    pub correlation_id: String,
    pub records: Vec<StageRecord>,
}

impl DecisionTrace {
    pub fn new() -> Self {
        Self { correlation_id: Uuid::new_v4().to_string(), records: Vec::new() }
    }

    pub fn record(
        &mut self,
        stage: StageName,
        input_summary: impl Into<String>,
        output_summary: impl Into<String>,
        latency: Duration,
    ) {
        self.records.push(StageRecord {
            stage,
            input_summary: input_summary.into(),
            output_summary: output_summary.into(),
            latency_ms: latency.as_millis() as u64,
            recorded_at: Utc::now(),
        });
    }

    pub fn record_skipped(&mut self, stage: StageName, input_summary: impl Into<String>) {
        self.record(stage, input_summary, "skipped", Duration::ZERO);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for DecisionTrace {
    fn default() -> Self {
        Self::new()
    }
}

pub trait TraceSink: Send + Sync {
    fn emit(&self, trace: &DecisionTrace);
}

#[derive(Clone, Default)]
pub struct InMemoryTraceSink {
    traces: Arc<Mutex<Vec<DecisionTrace>>>,
}

impl InMemoryTraceSink {
    pub fn traces(&self) -> Vec<DecisionTrace> {
        match self.traces.lock() {
            Ok(traces) => traces.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl TraceSink for InMemoryTraceSink {
    fn emit(&self, trace: &DecisionTrace) {
        match self.traces.lock() {
            Ok(mut traces) => traces.push(trace.clone()),
            Err(poisoned) => poisoned.into_inner().push(trace.clone()),
        }
    }
}

/// Sink that writes each stage record as a structured tracing event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingTraceSink;

impl TraceSink for TracingTraceSink {
    fn emit(&self, trace: &DecisionTrace) {
        for record in &trace.records {
            tracing::info!(
                event_name = "pipeline.stage",
                correlation_id = %trace.correlation_id,
                stage = record.stage.as_str(),
                input = %record.input_summary,
                output = %record.output_summary,
                latency_ms = record.latency_ms,
                "pipeline stage recorded"
            );
        }
    }
}
