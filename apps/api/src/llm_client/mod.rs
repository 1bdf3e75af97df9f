/// LLM Client — the single point of entry for all model calls in the analyzer.
///
/// ARCHITECTURAL RULE: No other module may call the chat completions API directly.
/// All LLM interactions MUST go through a `ModelBackend`.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

pub mod prompts;

/// Name of the forced tool in the function-call strategy.
pub const ANALYSIS_TOOL_NAME: &str = "emit_analysis";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// How the model is asked to produce structured output. Tried in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallStrategy {
    /// Forced tool call; the payload is the tool's JSON arguments.
    FunctionCall,
    /// `response_format: json_schema` completion.
    JsonSchema,
    /// Free-form completion instructed to answer with JSON only.
    PlainText,
}

impl CallStrategy {
    pub const ORDER: [CallStrategy; 3] = [
        CallStrategy::FunctionCall,
        CallStrategy::JsonSchema,
        CallStrategy::PlainText,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStrategy::FunctionCall => "function_call",
            CallStrategy::JsonSchema => "json_schema",
            CallStrategy::PlainText => "plain_text",
        }
    }
}

/// Everything a backend needs for one attempt.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub strategy: CallStrategy,
    pub system: &'a str,
    pub prompt: &'a str,
    pub schema_name: &'a str,
    pub schema: &'a Value,
}

/// The model-call capability injected into request handlers.
///
/// Carried in `AppState` as `Arc<dyn ModelBackend>` so tests can script responses.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Returns the raw (trimmed, non-empty) text the model produced for `request.strategy`.
    async fn complete(&self, request: ModelRequest<'_>) -> Result<String, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types (OpenAI-compatible chat completions)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    #[serde(rename = "type")]
    call_type: String,
    function: Option<ToolFunction>,
}

#[derive(Debug, Deserialize)]
struct ToolFunction {
    arguments: Option<String>,
}

impl ChatResponse {
    /// Picks the text relevant to `strategy` out of the first choice.
    fn output_for(&self, strategy: CallStrategy) -> Option<&str> {
        let message = &self.choices.first()?.message;
        let text = match strategy {
            CallStrategy::FunctionCall => message
                .tool_calls
                .iter()
                .find(|c| c.call_type == "function")
                .and_then(|c| c.function.as_ref())
                .and_then(|f| f.arguments.as_deref()),
            CallStrategy::JsonSchema | CallStrategy::PlainText => message.content.as_deref(),
        };
        text.map(str::trim).filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

fn build_chat_request<'a>(model: &'a str, request: &ModelRequest<'a>) -> ChatRequest<'a> {
    let mut chat = ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: request.system,
            },
            ChatMessage {
                role: "user",
                content: request.prompt,
            },
        ],
        tools: None,
        tool_choice: None,
        response_format: None,
        temperature: 0.0,
    };

    match request.strategy {
        CallStrategy::FunctionCall => {
            chat.tools = Some(json!([{
                "type": "function",
                "function": {
                    "name": ANALYSIS_TOOL_NAME,
                    "description": "Return the resume analysis using the exact fields requested.",
                    "parameters": request.schema,
                }
            }]));
            chat.tool_choice = Some(json!({
                "type": "function",
                "function": { "name": ANALYSIS_TOOL_NAME }
            }));
        }
        CallStrategy::JsonSchema => {
            chat.response_format = Some(json!({
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema_name,
                    "schema": request.schema,
                    "strict": false,
                }
            }));
        }
        CallStrategy::PlainText => {}
    }

    chat
}

// ────────────────────────────────────────────────────────────────────────────
// OpenAiClient
// ────────────────────────────────────────────────────────────────────────────

/// Production `ModelBackend` over an OpenAI-compatible chat completions endpoint.
/// One HTTP call per attempt; retries are the strategy chain's business.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    completions_url: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: String,
        base_url: &str,
        model: String,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            model,
            completions_url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ModelBackend for OpenAiClient {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<String, LlmError> {
        let body = build_chat_request(&self.model, &request);

        let response = self
            .client
            .post(&self.completions_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let chat: ChatResponse = response.json().await?;
        let text = chat
            .output_for(request.strategy)
            .ok_or(LlmError::EmptyContent)?;

        debug!(
            "LLM call succeeded: strategy={}, chars={}",
            request.strategy.as_str(),
            text.len()
        );

        Ok(text.to_string())
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(strategy: CallStrategy, schema: &'a Value) -> ModelRequest<'a> {
        ModelRequest {
            strategy,
            system: "system",
            prompt: "prompt",
            schema_name: "ResumeAnalysis",
            schema,
        }
    }

    #[test]
    fn test_strategy_order_is_function_schema_plain() {
        assert_eq!(
            CallStrategy::ORDER,
            [
                CallStrategy::FunctionCall,
                CallStrategy::JsonSchema,
                CallStrategy::PlainText
            ]
        );
    }

    #[test]
    fn test_function_call_request_forces_tool() {
        let schema = json!({"type": "object"});
        let chat = build_chat_request("gpt-5", &request(CallStrategy::FunctionCall, &schema));
        let body = serde_json::to_value(&chat).unwrap();
        assert_eq!(body["tool_choice"]["function"]["name"], ANALYSIS_TOOL_NAME);
        assert_eq!(body["tools"][0]["function"]["parameters"], schema);
        assert!(body.get("response_format").is_none());
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[test]
    fn test_json_schema_request_sets_response_format() {
        let schema = json!({"type": "object"});
        let chat = build_chat_request("gpt-5", &request(CallStrategy::JsonSchema, &schema));
        let body = serde_json::to_value(&chat).unwrap();
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "ResumeAnalysis");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_plain_request_has_no_structured_output_fields() {
        let schema = json!({});
        let chat = build_chat_request("gpt-5", &request(CallStrategy::PlainText, &schema));
        let body = serde_json::to_value(&chat).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert!(body.get("response_format").is_none());
        assert_eq!(body["model"], "gpt-5");
    }

    #[test]
    fn test_output_for_function_call_reads_arguments() {
        let chat: ChatResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "type": "function",
                        "function": { "name": "emit_analysis", "arguments": "  {\"a\":1}  " }
                    }]
                }
            }]
        }))
        .unwrap();
        assert_eq!(chat.output_for(CallStrategy::FunctionCall), Some("{\"a\":1}"));
        assert_eq!(chat.output_for(CallStrategy::PlainText), None);
    }

    #[test]
    fn test_output_for_blank_content_is_none() {
        let chat: ChatResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "content": "   " } }]
        }))
        .unwrap();
        assert_eq!(chat.output_for(CallStrategy::JsonSchema), None);
    }

    #[test]
    fn test_output_for_no_choices_is_none() {
        let chat: ChatResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(chat.output_for(CallStrategy::PlainText), None);
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }
}
