use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use zenbot_core::config::{AppConfig, EngineKind};
use zenbot_core::domain::{Intent, OrderContext, PolicyDecision, Reply, ToolResult, ToolStatus};
use zenbot_core::errors::ValidationError;
use zenbot_core::policy::{month_of, CancellationPolicy, InMemoryQuotaStore, QuotaStore};
use zenbot_core::trace::{DecisionTrace, StageName, TraceSink, TracingTraceSink};

use crate::llm::{HttpLlmClient, LlmClient};
use crate::router::{FallbackRouter, GenerativeRouter, IntentRouter, KeywordRouter};
use crate::sentiment::SentimentGate;
use crate::synthesizer::{
    FallbackSynthesizer, GenerativeSynthesizer, ResponseSynthesizer, SynthesisRequest,
    TemplateSynthesizer,
};
use crate::tools::ToolInvoker;

/// Router/synthesizer pair assembled for one engine selection.
pub struct EngineComponents {
    pub router: Arc<dyn IntentRouter>,
    pub synthesizer: Arc<dyn ResponseSynthesizer>,
}

/// Assemble the configured engine. The generative components are
/// always wrapped in fallback decorators around their deterministic
/// counterparts; the baseline uses the deterministic pair directly.
pub fn build_engine(config: &AppConfig, client: Arc<dyn LlmClient>) -> EngineComponents {
    match config.engine {
        EngineKind::Baseline => EngineComponents {
            router: Arc::new(KeywordRouter),
            synthesizer: Arc::new(TemplateSynthesizer),
        },
        EngineKind::Generative => EngineComponents {
            router: Arc::new(FallbackRouter::new(
                Arc::new(GenerativeRouter::new(client.clone(), config.llm.routing_temperature)),
                Arc::new(KeywordRouter),
            )),
            synthesizer: Arc::new(FallbackSynthesizer::new(
                Arc::new(GenerativeSynthesizer::new(client, config.llm.synthesis_temperature)),
                Arc::new(TemplateSynthesizer),
            )),
        },
    }
}

/// Single-request state machine:
/// Start → SentimentChecked → IntentResolved → PolicyChecked →
/// ToolInvoked → ResponseReady → Done, with Escalated absorbing from
/// SentimentChecked. One request, one thread, no retries; every stage
/// (including skipped ones) lands in the decision trace.
pub struct Pipeline {
    gate: SentimentGate,
    router: Arc<dyn IntentRouter>,
    synthesizer: Arc<dyn ResponseSynthesizer>,
    invoker: ToolInvoker,
    policy: CancellationPolicy,
    quota: Arc<dyn QuotaStore>,
    sink: Arc<dyn TraceSink>,
}

impl Pipeline {
    pub fn new(
        gate: SentimentGate,
        router: Arc<dyn IntentRouter>,
        synthesizer: Arc<dyn ResponseSynthesizer>,
        invoker: ToolInvoker,
        policy: CancellationPolicy,
    ) -> Self {
        Self {
            gate,
            router,
            synthesizer,
            invoker,
            policy,
            quota: Arc::new(InMemoryQuotaStore::default()),
            sink: Arc::new(TracingTraceSink),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let client: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::from_config(&config.llm));
        let engine = build_engine(config, client);
        Self::new(
            SentimentGate::from_config(&config.sentiment),
            engine.router,
            engine.synthesizer,
            ToolInvoker::from_config(&config.orders),
            CancellationPolicy::new(config.policy.clone()),
        )
    }

    pub fn with_quota_store(mut self, quota: Arc<dyn QuotaStore>) -> Self {
        self.quota = quota;
        self
    }

    pub fn with_trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Entry point: one synchronous request/response cycle, evaluated
    /// as of today.
    pub async fn run(&self, user_text: &str, order_info_json: &str) -> Result<Reply, ValidationError> {
        self.run_as_of(user_text, order_info_json, Utc::now().date_naive()).await
    }

    pub async fn run_as_of(
        &self,
        user_text: &str,
        order_info_json: &str,
        as_of: NaiveDate,
    ) -> Result<Reply, ValidationError> {
        // Validation happens before Start; its failure is the only
        // error this method surfaces.
        let order = OrderContext::from_json(order_info_json)?;
        let mut trace = DecisionTrace::new();

        tracing::info!(
            event_name = "pipeline.started",
            correlation_id = %trace.correlation_id,
            order_id = %order.order_id,
            user_id = %order.user_id,
            "pipeline started"
        );

        // Start → SentimentChecked.
        let started = Instant::now();
        let escalated = self.gate.is_frustrated(user_text).await;
        trace.record(
            StageName::SentimentCheck,
            summarize(user_text),
            if escalated { "frustrated" } else { "calm" },
            started.elapsed(),
        );

        let (intent, policy, tool) = if escalated {
            // SentimentChecked → Escalated: no routing, no policy, no
            // tool. Synthesis still runs below.
            trace.record_skipped(StageName::IntentResolution, summarize(user_text));
            trace.record_skipped(StageName::PolicyCheck, "escalated");
            trace.record_skipped(StageName::ToolInvocation, "escalated");
            (Intent::None, PolicyDecision::not_applicable(), ToolResult::skipped())
        } else {
            // SentimentChecked → IntentResolved.
            let started = Instant::now();
            let intent = match self.router.detect_intent(user_text, &order).await {
                Ok(intent) => intent,
                Err(error) => {
                    // Only reachable with an unwrapped generative
                    // router; degrade to no intent rather than fail.
                    tracing::warn!(
                        event_name = "pipeline.router_failed",
                        correlation_id = %trace.correlation_id,
                        error = %error,
                        "intent router failed without a fallback; treating as no intent"
                    );
                    Intent::None
                }
            };
            trace.record(
                StageName::IntentResolution,
                summarize(user_text),
                intent.as_str(),
                started.elapsed(),
            );

            // IntentResolved → PolicyChecked (cancel only; vacuous
            // otherwise).
            let policy = if intent == Intent::Cancel {
                let started = Instant::now();
                let (year, month) = month_of(as_of);
                let prior = self.quota.cancellations_in_month(&order.user_id, year, month);
                let decision = self.policy.evaluate(&order, as_of, prior);
                trace.record(
                    StageName::PolicyCheck,
                    format!("order_date={} as_of={as_of} prior_cancellations={prior}", order.order_date),
                    format!(
                        "{} ({})",
                        if decision.allowed { "allowed" } else { "denied" },
                        decision.reason.as_str()
                    ),
                    started.elapsed(),
                );
                decision
            } else {
                trace.record(
                    StageName::PolicyCheck,
                    format!("intent={}", intent.as_str()),
                    "not_applicable",
                    std::time::Duration::ZERO,
                );
                PolicyDecision::not_applicable()
            };

            // PolicyChecked → ToolInvoked: tracking always proceeds,
            // cancellation only when policy allows.
            let tool = if intent != Intent::None && (intent == Intent::Track || policy.allowed) {
                let started = Instant::now();
                let result = self.invoker.invoke(intent, &order).await;
                trace.record(
                    StageName::ToolInvocation,
                    format!("intent={} order_id={}", intent.as_str(), order.order_id),
                    result.status.as_str(),
                    started.elapsed(),
                );

                if intent == Intent::Cancel && result.status == ToolStatus::Ok {
                    let (year, month) = month_of(as_of);
                    self.quota.record_cancellation(&order.user_id, year, month);
                }
                result
            } else {
                trace.record_skipped(
                    StageName::ToolInvocation,
                    format!("intent={}", intent.as_str()),
                );
                ToolResult::skipped()
            };

            (intent, policy, tool)
        };

        // ToolInvoked → ResponseReady: a reply is synthesized
        // regardless of tool outcome, including errors and skips.
        let request =
            SynthesisRequest { user_text, order: &order, intent, policy, tool: &tool, escalated };
        let started = Instant::now();
        let text = match self.synthesizer.synthesize(&request).await {
            Ok(text) => text,
            Err(error) => {
                // Last resort below the fallback decorator: the user
                // always gets a reply.
                tracing::warn!(
                    event_name = "pipeline.synthesis_failed",
                    correlation_id = %trace.correlation_id,
                    error = %error,
                    "synthesis failed without a fallback; using template reply"
                );
                TemplateSynthesizer::render(&request)
            }
        };
        trace.record(
            StageName::ResponseSynthesis,
            format!(
                "intent={} policy={} tool={}",
                intent.as_str(),
                policy.reason.as_str(),
                tool.status.as_str()
            ),
            summarize(&text),
            started.elapsed(),
        );

        // ResponseReady → Done.
        self.sink.emit(&trace);
        tracing::info!(
            event_name = "pipeline.finished",
            correlation_id = %trace.correlation_id,
            intent = intent.as_str(),
            policy_reason = policy.reason.as_str(),
            tool_status = tool.status.as_str(),
            escalated,
            "pipeline finished"
        );

        Ok(Reply { text, intent, policy, tool, escalated, trace })
    }
}

const SUMMARY_LIMIT: usize = 80;

fn summarize(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= SUMMARY_LIMIT {
        return trimmed.to_owned();
    }
    let truncated: String = trimmed.chars().take(SUMMARY_LIMIT).collect();
    format!("{truncated}…")
}

#[cfg(test)]
mod tests {
    use super::summarize;

    #[test]
    fn short_text_passes_through() {
        assert_eq!(summarize("  track my order  "), "track my order");
    }

    #[test]
    fn long_text_is_truncated_with_ellipsis() {
        let text = "a".repeat(200);
        let summary = summarize(&text);
        assert_eq!(summary.chars().count(), 81);
        assert!(summary.ends_with('…'));
    }
}
