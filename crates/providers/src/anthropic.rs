//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly.
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks
//! - Streaming via SSE with `content_block_delta` events
//! - Prompt-caching hint (`cache_control: ephemeral`) on the tool block and
//!   the most recent user turn

use async_trait::async_trait;
use codeloom_core::error::ProviderError;
use codeloom_core::message::{ConversationMessage, MessageContent, Role};
use codeloom_core::provider::{
    ChatRequest, ChatResponse, Provider, StopReason, StreamChunk, ToolCallRequest, ToolDefinition,
};
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, trace, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider for the given model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert conversation messages to Anthropic API format.
    ///
    /// Block-structured content serializes directly; a plain-text user or
    /// assistant message becomes a string body.
    fn to_api_messages(messages: &[ConversationMessage]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::Assistant => "assistant",
                    // System content never crosses this boundary inline
                    Role::User | Role::System => "user",
                };
                let content = match &msg.content {
                    MessageContent::Text(text) => serde_json::json!(text),
                    MessageContent::Blocks(blocks) => serde_json::json!(blocks),
                };
                serde_json::json!({ "role": role, "content": content })
            })
            .collect()
    }

    /// Convert tool definitions to Anthropic format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                })
            })
            .collect()
    }

    /// Build the request body shared by `chat` and `stream`.
    fn build_body(&self, request: &ChatRequest, stream: bool) -> serde_json::Value {
        let mut messages = Self::to_api_messages(&request.messages);

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "system": request.system,
        });

        if stream {
            body["stream"] = serde_json::json!(true);
        }

        if !request.tools.is_empty() && !request.options.disable_tools {
            let mut tools = Self::to_api_tools(&request.tools);
            if request.options.enable_caching
                && let Some(last) = tools.last_mut()
            {
                last["cache_control"] = serde_json::json!({"type": "ephemeral"});
            }
            body["tools"] = serde_json::json!(tools);
        }

        // Mark the most recent user turn cacheable. String content is
        // rewrapped as a text block so the marker has somewhere to live.
        if request.options.enable_caching
            && let Some(last_user) = messages
                .iter_mut()
                .rev()
                .find(|m| m["role"] == "user")
        {
            let content = last_user["content"].take();
            let mut blocks = match content {
                serde_json::Value::String(text) => {
                    vec![serde_json::json!({"type": "text", "text": text})]
                }
                serde_json::Value::Array(blocks) => blocks,
                other => vec![other],
            };
            if let Some(block) = blocks.last_mut() {
                block["cache_control"] = serde_json::json!({"type": "ephemeral"});
            }
            last_user["content"] = serde_json::json!(blocks);
        }

        body["messages"] = serde_json::json!(messages);
        body
    }

    async fn post(
        &self,
        body: &serde_json::Value,
        sse: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let mut req = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json");
        if sse {
            req = req.header("Accept", "text/event-stream");
        }

        let response = req
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 429 {
            return Err(ProviderError::RateLimited { retry_after_secs: 5 });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid Anthropic API key".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Anthropic API error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }
        Ok(response)
    }
}

fn map_stop_reason(raw: Option<&str>) -> StopReason {
    match raw {
        Some("tool_use") => StopReason::ToolUse,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        _ => StopReason::EndTurn,
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = self.build_body(&request, false);
        debug!(provider = "anthropic", model = %self.model, "Sending completion request");

        let response = self.post(&body, false).await?;
        let api_resp: AnthropicResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse Anthropic response: {e}"),
            })?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in api_resp.content {
            match block {
                ResponseContentBlock::Text { text } => content.push_str(&text),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCallRequest { id, name, input });
                }
            }
        }

        Ok(ChatResponse {
            content,
            tool_calls,
            stop_reason: map_stop_reason(api_resp.stop_reason.as_deref()),
        })
    }

    async fn stream(
        &self,
        request: ChatRequest,
    ) -> Result<
        tokio::sync::mpsc::Receiver<Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let body = self.build_body(&request, true);
        debug!(provider = "anthropic", model = %self.model, "Sending streaming request");

        let response = self.post(&body, true).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(64);

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            // Accumulators
            let mut current_tool_id = String::new();
            let mut current_tool_name = String::new();
            let mut tool_args_buffer = String::new();
            let mut tool_calls: Vec<ToolCallRequest> = Vec::new();
            let mut in_tool_use = false;
            let mut stop_reason = StopReason::EndTurn;

            let mut finalize_tool =
                |id: &mut String, name: &mut String, args: &mut String, calls: &mut Vec<ToolCallRequest>| {
                    let input = serde_json::from_str(args)
                        .unwrap_or_else(|_| serde_json::json!({}));
                    calls.push(ToolCallRequest {
                        id: std::mem::take(id),
                        name: std::mem::take(name),
                        input,
                    });
                    args.clear();
                };

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    if let Some(event_type) = line.strip_prefix("event: ") {
                        if event_type.trim() == "message_stop" {
                            if in_tool_use {
                                finalize_tool(
                                    &mut current_tool_id,
                                    &mut current_tool_name,
                                    &mut tool_args_buffer,
                                    &mut tool_calls,
                                );
                            }
                            let _ = tx
                                .send(Ok(StreamChunk::done(
                                    std::mem::take(&mut tool_calls),
                                    stop_reason,
                                )))
                                .await;
                            return;
                        }
                        continue;
                    }

                    if let Some(data) = line.strip_prefix("data: ") {
                        let data = data.trim();
                        if data.is_empty() {
                            continue;
                        }

                        let event: serde_json::Value = match serde_json::from_str(data) {
                            Ok(v) => v,
                            Err(e) => {
                                trace!(error = %e, data = %data, "Ignoring unparseable Anthropic SSE");
                                continue;
                            }
                        };

                        match event["type"].as_str().unwrap_or("") {
                            "content_block_start" => {
                                let block = &event["content_block"];
                                if block["type"].as_str() == Some("tool_use") {
                                    if in_tool_use {
                                        finalize_tool(
                                            &mut current_tool_id,
                                            &mut current_tool_name,
                                            &mut tool_args_buffer,
                                            &mut tool_calls,
                                        );
                                    }
                                    current_tool_id =
                                        block["id"].as_str().unwrap_or("").to_string();
                                    current_tool_name =
                                        block["name"].as_str().unwrap_or("").to_string();
                                    tool_args_buffer.clear();
                                    in_tool_use = true;
                                }
                            }
                            "content_block_delta" => {
                                let delta = &event["delta"];
                                match delta["type"].as_str().unwrap_or("") {
                                    "text_delta" => {
                                        if let Some(text) = delta["text"].as_str() {
                                            if tx.send(Ok(StreamChunk::delta(text))).await.is_err()
                                            {
                                                return;
                                            }
                                        }
                                    }
                                    "input_json_delta" => {
                                        if let Some(partial) = delta["partial_json"].as_str() {
                                            tool_args_buffer.push_str(partial);
                                        }
                                    }
                                    _ => {}
                                }
                            }
                            "content_block_stop" => {
                                if in_tool_use {
                                    finalize_tool(
                                        &mut current_tool_id,
                                        &mut current_tool_name,
                                        &mut tool_args_buffer,
                                        &mut tool_calls,
                                    );
                                    in_tool_use = false;
                                }
                            }
                            "message_delta" => {
                                if let Some(reason) = event["delta"]["stop_reason"].as_str() {
                                    stop_reason = map_stop_reason(Some(reason));
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }

            // Stream ended without message_stop — send terminal chunk
            if in_tool_use {
                finalize_tool(
                    &mut current_tool_id,
                    &mut current_tool_name,
                    &mut tool_args_buffer,
                    &mut tool_calls,
                );
            }
            let _ = tx.send(Ok(StreamChunk::done(tool_calls, stop_reason))).await;
        });

        Ok(rx)
    }
}

// --- Anthropic API response types ---

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ResponseContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeloom_core::message::ContentBlock;
    use codeloom_core::provider::ChatOptions;

    fn request(enable_caching: bool, disable_tools: bool) -> ChatRequest {
        ChatRequest {
            messages: vec![
                ConversationMessage::user("first"),
                ConversationMessage::assistant("reply"),
                ConversationMessage::user("second"),
            ],
            system: "You are helpful.".into(),
            tools: vec![ToolDefinition {
                name: "read-file".into(),
                description: "Read a file".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
            max_tokens: 1024,
            options: ChatOptions {
                enable_caching,
                disable_tools,
            },
        }
    }

    #[test]
    fn constructor() {
        let provider = AnthropicProvider::new("sk-ant-test", "claude-sonnet-4-5-20250929");
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let provider = AnthropicProvider::new("k", "m").with_base_url("http://localhost:8080/");
        assert_eq!(provider.base_url, "http://localhost:8080");
    }

    #[test]
    fn body_includes_system_and_tools() {
        let provider = AnthropicProvider::new("k", "model-x");
        let body = provider.build_body(&request(false, false), false);
        assert_eq!(body["model"], "model-x");
        assert_eq!(body["system"], "You are helpful.");
        assert_eq!(body["tools"][0]["name"], "read-file");
        assert_eq!(body["messages"].as_array().unwrap().len(), 3);
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn disable_tools_omits_tools() {
        let provider = AnthropicProvider::new("k", "m");
        let body = provider.build_body(&request(false, true), false);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn caching_marks_last_user_turn_and_tools() {
        let provider = AnthropicProvider::new("k", "m");
        let body = provider.build_body(&request(true, false), true);

        assert_eq!(body["tools"][0]["cache_control"]["type"], "ephemeral");

        let messages = body["messages"].as_array().unwrap();
        // Last user turn rewrapped as blocks with a cache marker
        let last_user = &messages[2];
        assert_eq!(last_user["role"], "user");
        let blocks = last_user["content"].as_array().unwrap();
        assert_eq!(blocks[0]["text"], "second");
        assert_eq!(blocks[0]["cache_control"]["type"], "ephemeral");
        // Earlier user turn untouched
        assert_eq!(messages[0]["content"], "first");
    }

    #[test]
    fn tool_use_blocks_serialize_natively() {
        let provider = AnthropicProvider::new("k", "m");
        let mut req = request(false, false);
        req.messages.push(ConversationMessage::assistant_blocks(vec![
            ContentBlock::Text {
                text: "doing it".into(),
            },
            ContentBlock::ToolUse {
                id: "tu_1".into(),
                name: "write-file".into(),
                input: serde_json::json!({"path": "a.txt", "content": "x"}),
            },
        ]));
        req.messages
            .push(ConversationMessage::tool_results(vec![
                ContentBlock::ToolResult {
                    tool_use_id: "tu_1".into(),
                    content: "File written: a.txt".into(),
                },
            ]));

        let body = provider.build_body(&req, false);
        let messages = body["messages"].as_array().unwrap();
        let assistant = &messages[3];
        assert_eq!(assistant["content"][1]["type"], "tool_use");
        assert_eq!(assistant["content"][1]["name"], "write-file");
        let results = &messages[4];
        assert_eq!(results["role"], "user");
        assert_eq!(results["content"][0]["type"], "tool_result");
        assert_eq!(results["content"][0]["tool_use_id"], "tu_1");
    }

    #[test]
    fn stop_reason_mapping() {
        assert_eq!(map_stop_reason(Some("end_turn")), StopReason::EndTurn);
        assert_eq!(map_stop_reason(Some("tool_use")), StopReason::ToolUse);
        assert_eq!(map_stop_reason(Some("max_tokens")), StopReason::MaxTokens);
        assert_eq!(
            map_stop_reason(Some("stop_sequence")),
            StopReason::StopSequence
        );
        assert_eq!(map_stop_reason(None), StopReason::EndTurn);
    }
}
