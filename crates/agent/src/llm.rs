use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use zenbot_core::config::LlmConfig;

#[derive(Clone, Debug, Error)]
pub enum LlmError {
    #[error("llm backend unreachable: {0}")]
    Unreachable(String),
    #[error("llm backend returned a malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, as the wire format carries it.
    pub arguments: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_owned(), content: Some(content.into()), tool_calls: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_owned(), content: Some(content.into()), tool_calls: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_owned(), content: Some(content.into()), tool_calls: None }
    }

    pub fn assistant_tool_call(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_owned(),
            content: None,
            tool_calls: Some(vec![ToolCall {
                id: id.into(),
                kind: "function".to_owned(),
                function: FunctionCall { name: name.into(), arguments: arguments.into() },
            }]),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    pub temperature: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

impl ChatResponse {
    pub fn first_message(&self) -> Result<&ChatMessage, LlmError> {
        self.choices
            .first()
            .map(|choice| &choice.message)
            .ok_or_else(|| LlmError::MalformedResponse("response carried no choices".to_owned()))
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;
}

/// Client for an OpenAI-compatible chat-completions server (llama.cpp,
/// vLLM, or a hosted endpoint). The model name is injected here so the
/// routing and synthesis code stays backend-agnostic.
pub struct HttpLlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Value]>,
    temperature: f32,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = WireRequest {
            model: &self.model,
            messages: &request.messages,
            tools: request.tools.as_deref(),
            temperature: request.temperature,
        };

        let mut http_request = self.client.post(self.endpoint()).json(&body);
        if let Some(api_key) = &self.api_key {
            http_request = http_request.bearer_auth(api_key.expose_secret());
        }

        let response = http_request
            .send()
            .await
            .map_err(|error| LlmError::Unreachable(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Unreachable(format!("endpoint returned {status}")));
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|error| LlmError::MalformedResponse(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{ChatMessage, ChatResponse, LlmError};

    #[test]
    fn parses_tool_call_response() {
        let raw = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "tool_calls": [{
                        "id": "tool_1",
                        "type": "function",
                        "function": {"name": "track_order", "arguments": "{ \"order_id\": \"123\" }"}
                    }]
                }
            }]
        }"#;

        let response: ChatResponse = serde_json::from_str(raw).expect("response should parse");
        let message = response.first_message().expect("one choice");
        let tool_calls = message.tool_calls.as_ref().expect("tool calls present");
        assert_eq!(tool_calls[0].function.name, "track_order");
    }

    #[test]
    fn empty_choices_is_malformed() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(response.first_message(), Err(LlmError::MalformedResponse(_))));
    }

    #[test]
    fn request_messages_serialize_without_null_fields() {
        let message = ChatMessage::user("where is my package?");
        let serialized = serde_json::to_string(&message).unwrap();
        assert!(!serialized.contains("tool_calls"));

        let message = ChatMessage::assistant_tool_call("tool_1", "cancel_order", "{}");
        let serialized = serde_json::to_string(&message).unwrap();
        assert!(!serialized.contains("content"));
        assert!(serialized.contains("\"type\":\"function\""));
    }
}
