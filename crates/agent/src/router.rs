use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use zenbot_core::domain::{Intent, OrderContext};

use crate::llm::{ChatMessage, ChatRequest, LlmClient, LlmError};

pub const TRACK_TOOL: &str = "track_order";
pub const CANCEL_TOOL: &str = "cancel_order";

const SYSTEM_PROMPT: &str = "\
You are ZenBot, a helpful order support assistant.

You have access to tools to help the user:
- Use the `track_order` tool if the user wants to check or track their order.
- Use the `cancel_order` tool if the user wants to cancel their order.

Call the appropriate tool **only** if the user's intent is clear.

Examples:
- \"Where is my package?\" - call `track_order`
- \"Cancel my order\" - call `cancel_order`
- \"Can you help me?\" - do not call any tool

Only respond with a tool call if the user's message contains or implies the need to **track** or **cancel** an order.";

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("intent detection failed: {0}")]
    LlmUnavailable(#[from] LlmError),
}

#[async_trait]
pub trait IntentRouter: Send + Sync {
    async fn detect_intent(&self, text: &str, order: &OrderContext) -> Result<Intent, RouterError>;
}

/// Deterministic baseline router: fixed case-insensitive keyword sets.
/// Total function; never fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordRouter;

impl KeywordRouter {
    pub fn route(text: &str) -> Intent {
        let text = text.to_lowercase();
        if ["track", "status", "where"].iter().any(|keyword| text.contains(keyword)) {
            Intent::Track
        } else if ["cancel", "refund"].iter().any(|keyword| text.contains(keyword)) {
            Intent::Cancel
        } else {
            Intent::None
        }
    }
}

#[async_trait]
impl IntentRouter for KeywordRouter {
    async fn detect_intent(&self, text: &str, _order: &OrderContext) -> Result<Intent, RouterError> {
        Ok(Self::route(text))
    }
}

/// Generative router: offers the LLM the two tool schemas and maps its
/// selection (or the absence of one) to an intent.
pub struct GenerativeRouter {
    client: Arc<dyn LlmClient>,
    temperature: f32,
}

impl GenerativeRouter {
    pub fn new(client: Arc<dyn LlmClient>, temperature: f32) -> Self {
        Self { client, temperature }
    }

    fn tool_schemas() -> Vec<Value> {
        vec![
            json!({
                "type": "function",
                "function": {
                    "name": CANCEL_TOOL,
                    "description": "Cancel an order if it meets policy requirements.",
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "order_id": {
                                "type": "string",
                                "description": "The ID of the order to cancel"
                            },
                            "order_date": {
                                "type": "string",
                                "description": "The date the order was placed (format: YYYY-MM-DD)"
                            },
                            "user_id": {
                                "type": "string",
                                "description": "The ID of the user who placed the order"
                            }
                        },
                        "required": ["order_id", "order_date", "user_id"]
                    }
                }
            }),
            json!({
                "type": "function",
                "function": {
                    "name": TRACK_TOOL,
                    "description": "Retrieve the current status of an order.",
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "order_id": {
                                "type": "string",
                                "description": "The ID of the order to track"
                            }
                        },
                        "required": ["order_id"]
                    }
                }
            }),
        ]
    }

    fn messages(text: &str, order: &OrderContext) -> Vec<ChatMessage> {
        let order_summary = format!(
            "{{'order_id': '{}', 'order_date': '{}', 'user_id': '{}'}}",
            order.order_id, order.order_date, order.user_id
        );

        vec![
            ChatMessage::system(SYSTEM_PROMPT),
            // Few-shot 1: track.
            ChatMessage::user(format!("Where is my package? My order info is: {order_summary}")),
            ChatMessage::assistant_tool_call("tool_1", TRACK_TOOL, r#"{ "order_id": "123" }"#),
            // Few-shot 2: cancel.
            ChatMessage::user(format!("I need to cancel my order. My order info is: {order_summary}")),
            ChatMessage::assistant_tool_call(
                "tool_2",
                CANCEL_TOOL,
                r#"{ "order_id": "123", "order_date": "2025-04-05", "user_id": "user_1" }"#,
            ),
            ChatMessage::user(format!("{text}. My order info is: {order_summary}")),
        ]
    }
}

#[async_trait]
impl IntentRouter for GenerativeRouter {
    async fn detect_intent(&self, text: &str, order: &OrderContext) -> Result<Intent, RouterError> {
        let request = ChatRequest {
            messages: Self::messages(text, order),
            tools: Some(Self::tool_schemas()),
            temperature: self.temperature,
        };

        let response = self.client.chat(request).await?;
        let message = response.first_message()?;

        // Absent or unrecognized tool selection reads as "no intent",
        // not as a failure.
        let intent = match message.tool_calls.as_deref().and_then(|calls| calls.first()) {
            Some(call) if call.function.name == TRACK_TOOL => Intent::Track,
            Some(call) if call.function.name == CANCEL_TOOL => Intent::Cancel,
            Some(call) => {
                tracing::warn!(
                    event_name = "router.unknown_tool",
                    tool = %call.function.name,
                    "model selected an unknown tool; treating as no intent"
                );
                Intent::None
            }
            None => Intent::None,
        };

        Ok(intent)
    }
}

/// Decorator: try the primary router, and if the LLM backend is
/// unavailable fall back to the deterministic one. The failure is
/// logged, never surfaced to the user.
pub struct FallbackRouter {
    primary: Arc<dyn IntentRouter>,
    fallback: Arc<dyn IntentRouter>,
}

impl FallbackRouter {
    pub fn new(primary: Arc<dyn IntentRouter>, fallback: Arc<dyn IntentRouter>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl IntentRouter for FallbackRouter {
    async fn detect_intent(&self, text: &str, order: &OrderContext) -> Result<Intent, RouterError> {
        match self.primary.detect_intent(text, order).await {
            Ok(intent) => Ok(intent),
            Err(RouterError::LlmUnavailable(error)) => {
                tracing::warn!(
                    event_name = "router.fallback",
                    error = %error,
                    "generative router unavailable; using deterministic fallback"
                );
                self.fallback.detect_intent(text, order).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use zenbot_core::domain::{Intent, OrderContext};

    use super::{
        FallbackRouter, GenerativeRouter, IntentRouter, KeywordRouter, CANCEL_TOOL, TRACK_TOOL,
    };
    use crate::llm::{ChatChoice, ChatMessage, ChatRequest, ChatResponse, LlmClient, LlmError};

    fn order() -> OrderContext {
        OrderContext {
            order_id: "123".to_owned(),
            user_id: "user_1".to_owned(),
            order_date: NaiveDate::from_ymd_opt(2025, 4, 20).unwrap(),
        }
    }

    struct ToolCallingLlm {
        tool: Option<&'static str>,
    }

    #[async_trait]
    impl LlmClient for ToolCallingLlm {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
            let message = match self.tool {
                Some(name) => ChatMessage::assistant_tool_call("tool_1", name, "{}"),
                None => ChatMessage::assistant("How can I help you today?"),
            };
            Ok(ChatResponse { choices: vec![ChatChoice { message }] })
        }
    }

    struct UnreachableLlm;

    #[async_trait]
    impl LlmClient for UnreachableLlm {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
            Err(LlmError::Unreachable("connection refused".to_owned()))
        }
    }

    #[test]
    fn keyword_router_matches_fixed_sets() {
        assert_eq!(KeywordRouter::route("please TRACK my order"), Intent::Track);
        assert_eq!(KeywordRouter::route("what's the status?"), Intent::Track);
        assert_eq!(KeywordRouter::route("where is my package"), Intent::Track);
        assert_eq!(KeywordRouter::route("cancel my order"), Intent::Cancel);
        assert_eq!(KeywordRouter::route("I want a refund"), Intent::Cancel);
        assert_eq!(KeywordRouter::route("banana"), Intent::None);
        assert_eq!(KeywordRouter::route(""), Intent::None);
    }

    #[tokio::test]
    async fn generative_router_maps_tool_selection_to_intent() {
        let router = GenerativeRouter::new(Arc::new(ToolCallingLlm { tool: Some(TRACK_TOOL) }), 0.15);
        assert_eq!(router.detect_intent("where is my stuff", &order()).await.unwrap(), Intent::Track);

        let router = GenerativeRouter::new(Arc::new(ToolCallingLlm { tool: Some(CANCEL_TOOL) }), 0.15);
        assert_eq!(router.detect_intent("cancel it", &order()).await.unwrap(), Intent::Cancel);
    }

    #[tokio::test]
    async fn absent_or_unknown_tool_selection_is_no_intent() {
        let router = GenerativeRouter::new(Arc::new(ToolCallingLlm { tool: None }), 0.15);
        assert_eq!(router.detect_intent("hello there", &order()).await.unwrap(), Intent::None);

        let router = GenerativeRouter::new(Arc::new(ToolCallingLlm { tool: Some("make_coffee") }), 0.15);
        assert_eq!(router.detect_intent("make me coffee", &order()).await.unwrap(), Intent::None);
    }

    #[tokio::test]
    async fn fallback_router_recovers_from_unreachable_backend() {
        let router = FallbackRouter::new(
            Arc::new(GenerativeRouter::new(Arc::new(UnreachableLlm), 0.15)),
            Arc::new(KeywordRouter),
        );

        let intent = router.detect_intent("please cancel my order", &order()).await.unwrap();
        assert_eq!(intent, Intent::Cancel);
    }

    #[tokio::test]
    async fn both_variants_agree_on_unambiguous_keywords() {
        let generative =
            GenerativeRouter::new(Arc::new(ToolCallingLlm { tool: Some(CANCEL_TOOL) }), 0.15);
        let generative_intent =
            generative.detect_intent("please cancel my order", &order()).await.unwrap();
        let keyword_intent =
            KeywordRouter.detect_intent("please cancel my order", &order()).await.unwrap();
        assert_eq!(generative_intent, keyword_intent);
    }
}
