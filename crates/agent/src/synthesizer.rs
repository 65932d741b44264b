use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use zenbot_core::domain::{Intent, OrderContext, PolicyDecision, PolicyReason, ToolResult, ToolStatus};

use crate::llm::{ChatMessage, ChatRequest, LlmClient, LlmError};

/// Everything the reply must be grounded in. Synthesis is pure with
/// respect to this input; the generative variant's only side effect is
/// the outbound LLM call.
#[derive(Clone, Debug)]
pub struct SynthesisRequest<'a> {
    pub user_text: &'a str,
    pub order: &'a OrderContext,
    pub intent: Intent,
    pub policy: PolicyDecision,
    pub tool: &'a ToolResult,
    pub escalated: bool,
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("response synthesis failed: {0}")]
    LlmUnavailable(#[from] LlmError),
}

#[async_trait]
pub trait ResponseSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<String, SynthesisError>;
}

pub const ESCALATION_REPLY: &str =
    "I'm sorry, you seem frustrated. I'm transferring you to a live agent now.";

/// Baseline synthesizer: a small fixed set of templates keyed by
/// (escalated, intent, policy reason, tool status), filled with order
/// details. Never fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateSynthesizer;

impl TemplateSynthesizer {
    pub fn render(request: &SynthesisRequest<'_>) -> String {
        if request.escalated {
            return ESCALATION_REPLY.to_owned();
        }

        let order_id = &request.order.order_id;
        match request.intent {
            Intent::None => {
                "I can track or cancel your order. Please tell me which one you need.".to_owned()
            }
            Intent::Cancel if !request.policy.allowed => match request.policy.reason {
                PolicyReason::WindowExpired => format!(
                    "Order {order_id} cannot be canceled: the cancellation window has closed."
                ),
                PolicyReason::BlackoutDate => format!(
                    "Order {order_id} cannot be canceled right now: cancellations are paused during the current blackout period."
                ),
                PolicyReason::QuotaExceeded => format!(
                    "Order {order_id} cannot be canceled: the monthly cancellation limit has been reached."
                ),
                _ => format!("Order {order_id} cannot be canceled due to policy."),
            },
            _ if request.tool.status == ToolStatus::Error => format!(
                "Sorry, something went wrong while handling order {order_id}. Please try again later."
            ),
            Intent::Cancel => format!("Your order {order_id} has been canceled successfully."),
            Intent::Track => {
                let status = request.tool.payload["status"].as_str().unwrap_or("unknown");
                format!("The current status of order {order_id} is: {status}.")
            }
        }
    }
}

#[async_trait]
impl ResponseSynthesizer for TemplateSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<String, SynthesisError> {
        Ok(Self::render(request))
    }
}

const STYLE_INSTRUCTIONS: &str = "\
Use the information above and translate it into a natural language response. \
Don't repeat the tool name or any technical details. \
Don't include any code or JSON. \
Don't mention the function call or the tool. \
Don't mention the order ID or any other sensitive information. \
Don't use any technical jargon. \
Don't use any abbreviations. \
Don't use any slang. \
Make your reply coherent and polite.";

/// Generative synthesizer: asks the LLM to phrase a reply grounded in
/// the pipeline outcome. Policy denials and tool errors are stated
/// explicitly in the prompt so the model cannot contradict them.
pub struct GenerativeSynthesizer {
    client: Arc<dyn LlmClient>,
    temperature: f32,
}

impl GenerativeSynthesizer {
    pub fn new(client: Arc<dyn LlmClient>, temperature: f32) -> Self {
        Self { client, temperature }
    }

    fn grounding(request: &SynthesisRequest<'_>) -> String {
        if request.escalated {
            return "The user sounds frustrated. Apologize, acknowledge their frustration, and \
                    tell them they are being transferred to a live human agent now. Do not \
                    attempt to track or cancel anything."
                .to_owned();
        }

        let mut grounding = format!(
            "The user asked: \"{}\". Detected intent: {}.",
            request.user_text,
            request.intent.as_str()
        );

        match request.intent {
            Intent::None => {
                grounding.push_str(
                    " No supported action was requested. Explain that you can track or cancel \
                     an order and ask which one they need.",
                );
            }
            Intent::Cancel if !request.policy.allowed => {
                let reason = match request.policy.reason {
                    PolicyReason::WindowExpired => "the cancellation window has closed",
                    PolicyReason::BlackoutDate => {
                        "cancellations are paused during the current blackout period"
                    }
                    PolicyReason::QuotaExceeded => {
                        "the monthly cancellation limit has been reached"
                    }
                    _ => "company policy does not allow it",
                };
                grounding.push_str(&format!(
                    " Policy check: the cancellation was DENIED because {reason}. The order was \
                     NOT canceled. State this clearly and do not claim otherwise."
                ));
            }
            _ if request.tool.status == ToolStatus::Error => {
                grounding.push_str(
                    " The backend action FAILED. Apologize and suggest trying again later. Do \
                     not claim the action succeeded.",
                );
            }
            Intent::Cancel => {
                grounding.push_str(&format!(
                    " The cancellation succeeded. Tool output: {}.",
                    request.tool.payload
                ));
            }
            Intent::Track => {
                grounding.push_str(&format!(
                    " The tracking lookup succeeded. Tool output: {}.",
                    request.tool.payload
                ));
            }
        }

        grounding
    }
}

#[async_trait]
impl ResponseSynthesizer for GenerativeSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<String, SynthesisError> {
        let chat_request = ChatRequest {
            messages: vec![
                ChatMessage::system("You are ZenBot, a helpful order support assistant."),
                ChatMessage::assistant(Self::grounding(request)),
                ChatMessage::user(STYLE_INSTRUCTIONS),
            ],
            tools: None,
            temperature: self.temperature,
        };

        let response = self.client.chat(chat_request).await?;
        let message = response.first_message()?;
        match &message.content {
            Some(content) if !content.trim().is_empty() => Ok(content.trim().to_owned()),
            _ => Err(SynthesisError::LlmUnavailable(LlmError::MalformedResponse(
                "response message carried no content".to_owned(),
            ))),
        }
    }
}

/// Decorator mirroring `FallbackRouter`: on LLM failure, fall back to
/// the deterministic synthesizer so the user always gets a reply.
pub struct FallbackSynthesizer {
    primary: Arc<dyn ResponseSynthesizer>,
    fallback: Arc<dyn ResponseSynthesizer>,
}

impl FallbackSynthesizer {
    pub fn new(primary: Arc<dyn ResponseSynthesizer>, fallback: Arc<dyn ResponseSynthesizer>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl ResponseSynthesizer for FallbackSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<String, SynthesisError> {
        match self.primary.synthesize(request).await {
            Ok(text) => Ok(text),
            Err(SynthesisError::LlmUnavailable(error)) => {
                tracing::warn!(
                    event_name = "synthesizer.fallback",
                    error = %error,
                    "generative synthesizer unavailable; using template fallback"
                );
                self.fallback.synthesize(request).await
            }
        }
    }
}
