//! End-to-end pipeline scenarios with deterministic fake collaborators.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use zenbot_agent::pipeline::Pipeline;
use zenbot_agent::router::KeywordRouter;
use zenbot_agent::sentiment::{SentimentClassifier, SentimentGate, SentimentScore};
use zenbot_agent::synthesizer::TemplateSynthesizer;
use zenbot_agent::tools::{ApiResponse, OrderApi, ToolInvoker};
use zenbot_core::domain::{Intent, PolicyReason, ToolStatus};
use zenbot_core::policy::{CancellationPolicy, InMemoryQuotaStore, PolicyConfig, QuotaStore};
use zenbot_core::trace::{InMemoryTraceSink, StageName};

const ORDER_INFO: &str = r#"{"order_id": "123", "order_date": "2025-04-20", "user_id": "user_1"}"#;

struct AngryClassifier;

#[async_trait]
impl SentimentClassifier for AngryClassifier {
    async fn classify(&self, _text: &str) -> anyhow::Result<SentimentScore> {
        Ok(SentimentScore { label: "NEGATIVE".to_owned(), score: 0.99 })
    }
}

/// Always succeeds; counts outbound calls so tests can assert that
/// skipped stages never touch the backend.
#[derive(Default)]
struct RecordingApi {
    track_calls: AtomicU32,
    cancel_calls: AtomicU32,
}

#[async_trait]
impl OrderApi for RecordingApi {
    async fn track(&self, order_id: &str) -> ApiResponse {
        self.track_calls.fetch_add(1, Ordering::SeqCst);
        ApiResponse {
            status: "shipped".to_owned(),
            order_id: order_id.to_owned(),
            message: "on the way".to_owned(),
        }
    }

    async fn cancel(&self, order_id: &str) -> ApiResponse {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        ApiResponse {
            status: "ok".to_owned(),
            order_id: order_id.to_owned(),
            message: "done".to_owned(),
        }
    }
}

struct Harness {
    pipeline: Pipeline,
    api: Arc<RecordingApi>,
    quota: Arc<InMemoryQuotaStore>,
    sink: Arc<InMemoryTraceSink>,
}

fn harness(gate: SentimentGate, policy: PolicyConfig) -> Harness {
    let api = Arc::new(RecordingApi::default());
    let quota = Arc::new(InMemoryQuotaStore::default());
    let sink = Arc::new(InMemoryTraceSink::default());

    let pipeline = Pipeline::new(
        gate,
        Arc::new(KeywordRouter),
        Arc::new(TemplateSynthesizer),
        ToolInvoker::new(api.clone()),
        CancellationPolicy::new(policy),
    )
    .with_quota_store(quota.clone())
    .with_trace_sink(sink.clone());

    Harness { pipeline, api, quota, sink }
}

fn calm_harness() -> Harness {
    harness(SentimentGate::disabled(), PolicyConfig::default())
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn tracking_request_flows_to_an_ok_reply() {
    let harness = calm_harness();
    let reply = harness
        .pipeline
        .run_as_of("track my order", ORDER_INFO, date(2025, 4, 25))
        .await
        .expect("reply");

    assert_eq!(reply.intent, Intent::Track);
    assert_eq!(reply.policy.reason, PolicyReason::NotApplicable);
    assert!(reply.policy.allowed);
    assert_eq!(reply.tool.status, ToolStatus::Ok);
    assert!(reply.text.contains("status of order 123"));
    assert_eq!(harness.api.track_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn expired_window_denies_cancellation_without_touching_the_backend() {
    // 95-day-old order against a 30-day window.
    let harness = harness(
        SentimentGate::disabled(),
        PolicyConfig { cancellation_window_days: 30, ..PolicyConfig::default() },
    );
    let reply = harness
        .pipeline
        .run_as_of("cancel my order", ORDER_INFO, date(2025, 7, 24))
        .await
        .expect("reply");

    assert_eq!(reply.intent, Intent::Cancel);
    assert_eq!(reply.policy.reason, PolicyReason::WindowExpired);
    assert!(!reply.policy.allowed);
    assert_eq!(reply.tool.status, ToolStatus::Skipped);
    assert!(reply.text.contains("cannot be canceled"));
    assert!(reply.text.contains("window"));
    assert_eq!(harness.api.cancel_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn frustrated_user_escalates_before_any_tool_runs() {
    let harness = harness(
        SentimentGate::new(Arc::new(AngryClassifier), 0.5),
        PolicyConfig::default(),
    );
    let reply = harness
        .pipeline
        .run_as_of("I am furious, where is my stuff", ORDER_INFO, date(2025, 4, 25))
        .await
        .expect("reply");

    assert!(reply.escalated);
    assert_eq!(reply.tool.status, ToolStatus::Skipped);
    assert!(reply.text.contains("frustrated"));
    assert!(reply.text.contains("live agent"));
    assert_eq!(harness.api.track_calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.api.cancel_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unrecognized_text_skips_policy_and_tools() {
    let harness = calm_harness();
    let reply = harness
        .pipeline
        .run_as_of("banana", ORDER_INFO, date(2025, 4, 25))
        .await
        .expect("reply");

    assert_eq!(reply.intent, Intent::None);
    assert_eq!(reply.policy.reason, PolicyReason::NotApplicable);
    assert_eq!(reply.tool.status, ToolStatus::Skipped);
    assert_eq!(harness.api.track_calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.api.cancel_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_order_json_aborts_before_any_stage() {
    let harness = calm_harness();
    let result = harness.pipeline.run_as_of("track my order", "{oops", date(2025, 4, 25)).await;

    assert!(result.is_err());
    assert!(harness.sink.traces().is_empty());
    assert_eq!(harness.api.track_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn every_run_records_all_five_stages() {
    let harness = calm_harness();

    for text in ["track my order", "cancel my order", "banana"] {
        harness.pipeline.run_as_of(text, ORDER_INFO, date(2025, 4, 25)).await.expect("reply");
    }

    let traces = harness.sink.traces();
    assert_eq!(traces.len(), 3);
    for trace in &traces {
        assert_eq!(trace.records.len(), 5);
        assert_eq!(trace.records[0].stage, StageName::SentimentCheck);
        assert_eq!(trace.records[4].stage, StageName::ResponseSynthesis);
    }

    // Skipped stages are recorded, not omitted.
    let banana_trace = &traces[2];
    assert_eq!(banana_trace.records[2].output_summary, "not_applicable");
    assert_eq!(banana_trace.records[3].output_summary, "skipped");
}

#[tokio::test]
async fn escalated_run_still_records_all_five_stages() {
    let harness = harness(
        SentimentGate::new(Arc::new(AngryClassifier), 0.5),
        PolicyConfig::default(),
    );
    harness
        .pipeline
        .run_as_of("this is outrageous", ORDER_INFO, date(2025, 4, 25))
        .await
        .expect("reply");

    let traces = harness.sink.traces();
    assert_eq!(traces[0].records.len(), 5);
    assert_eq!(traces[0].records[1].output_summary, "skipped");
    assert_eq!(traces[0].records[3].output_summary, "skipped");
}

#[tokio::test]
async fn successful_cancellations_consume_the_monthly_quota() {
    let harness = calm_harness();

    for _ in 0..3 {
        let reply = harness
            .pipeline
            .run_as_of("cancel my order", ORDER_INFO, date(2025, 4, 25))
            .await
            .expect("reply");
        assert!(reply.policy.allowed);
        assert_eq!(reply.tool.status, ToolStatus::Ok);
    }
    assert_eq!(harness.quota.cancellations_in_month("user_1", 2025, 4), 3);

    // Fourth attempt in the same month hits the quota.
    let reply = harness
        .pipeline
        .run_as_of("cancel my order", ORDER_INFO, date(2025, 4, 25))
        .await
        .expect("reply");
    assert_eq!(reply.policy.reason, PolicyReason::QuotaExceeded);
    assert_eq!(reply.tool.status, ToolStatus::Skipped);
    assert_eq!(harness.api.cancel_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn identical_inputs_yield_identical_decisions() {
    let first = calm_harness();
    let second = calm_harness();

    let reply_a = first
        .pipeline
        .run_as_of("cancel my order", ORDER_INFO, date(2025, 4, 25))
        .await
        .expect("reply");
    let reply_b = second
        .pipeline
        .run_as_of("cancel my order", ORDER_INFO, date(2025, 4, 25))
        .await
        .expect("reply");

    assert_eq!(reply_a.intent, reply_b.intent);
    assert_eq!(reply_a.policy, reply_b.policy);
    assert_eq!(reply_a.tool.status, reply_b.tool.status);
    assert_eq!(reply_a.text, reply_b.text);
}
