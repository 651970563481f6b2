//! Provider trait — the abstraction over chat-completion backends.
//!
//! A Provider knows how to send a conversation to a model and get a response
//! back, either as a complete message or as a stream of chunks: ordered text
//! deltas followed by exactly one terminal chunk carrying the aggregate tool
//! calls and stop reason.
//!
//! Implementations: Anthropic Messages API, deterministic mock.

use crate::error::ProviderError;
use crate::message::ConversationMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A tool call extracted from a model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Provider-assigned call id (echoed back in the tool result)
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Structured input
    pub input: serde_json::Value,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Normal completion
    EndTurn,
    /// The model wants tool calls executed
    ToolUse,
    /// Output was truncated at the token limit
    MaxTokens,
    /// A stop sequence was hit
    StopSequence,
}

/// Per-call behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatOptions {
    /// Mark the tool block and the most recent user turn as cacheable.
    pub enable_caching: bool,

    /// Strip tool-call capability entirely (pure plan generation).
    pub disable_tools: bool,
}

/// A chat-completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Conversation so far (user/assistant turns only)
    pub messages: Vec<ConversationMessage>,

    /// System prompt, passed out-of-band
    pub system: String,

    /// Tools the model may call (ignored when `options.disable_tools`)
    pub tools: Vec<ToolDefinition>,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Behavior switches
    pub options: ChatOptions,
}

/// A complete (non-streaming) response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Concatenated text content
    pub content: String,

    /// Tool calls requested by the model
    pub tool_calls: Vec<ToolCallRequest>,

    /// Why generation stopped
    pub stop_reason: StopReason,
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone)]
pub struct StreamChunk {
    /// Partial text delta
    pub content: Option<String>,

    /// Tool calls, present only on the terminal chunk
    pub tool_calls: Vec<ToolCallRequest>,

    /// Stop reason, present only on the terminal chunk
    pub stop_reason: Option<StopReason>,

    /// Whether this is the terminal chunk
    pub done: bool,
}

impl StreamChunk {
    /// A pure text delta.
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            tool_calls: Vec::new(),
            stop_reason: None,
            done: false,
        }
    }

    /// The terminal chunk.
    pub fn done(tool_calls: Vec<ToolCallRequest>, stop_reason: StopReason) -> Self {
        Self {
            content: None,
            tool_calls,
            stop_reason: Some(stop_reason),
            done: true,
        }
    }
}

/// The core Provider trait.
///
/// The agent loop calls `chat()` or `stream()` without knowing which backend
/// is in use.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic", "mock").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn chat(&self, request: ChatRequest) -> std::result::Result<ChatResponse, ProviderError>;

    /// Send a request and get a stream of response chunks.
    ///
    /// Contract: zero or more text deltas in order, then exactly one chunk
    /// with `done = true` carrying the aggregate tool calls and stop reason.
    ///
    /// Default implementation calls `chat()` and wraps the result.
    async fn stream(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let response = self.chat(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(2);
        if !response.content.is_empty() {
            let _ = tx.send(Ok(StreamChunk::delta(response.content))).await;
        }
        let _ = tx
            .send(Ok(StreamChunk::done(
                response.tool_calls,
                response.stop_reason,
            )))
            .await;
        Ok(rx)
    }
}

/// Drain a chunk stream, invoking `on_text` for every delta in order, and
/// resolve with the aggregate response once the terminal chunk arrives.
pub async fn collect_stream<F>(
    mut rx: tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
    mut on_text: F,
) -> std::result::Result<ChatResponse, ProviderError>
where
    F: FnMut(&str) + Send,
{
    let mut content = String::new();

    while let Some(chunk) = rx.recv().await {
        let chunk = chunk?;
        if let Some(text) = &chunk.content {
            on_text(text);
            content.push_str(text);
        }
        if chunk.done {
            return Ok(ChatResponse {
                content,
                tool_calls: chunk.tool_calls,
                stop_reason: chunk.stop_reason.unwrap_or(StopReason::EndTurn),
            });
        }
    }

    Err(ProviderError::StreamInterrupted(
        "stream closed before terminal chunk".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider;

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn chat(
            &self,
            _request: ChatRequest,
        ) -> std::result::Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: "hello world".into(),
                tool_calls: vec![],
                stop_reason: StopReason::EndTurn,
            })
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            messages: vec![ConversationMessage::user("hi")],
            system: "be brief".into(),
            tools: vec![],
            max_tokens: 64,
            options: ChatOptions::default(),
        }
    }

    #[tokio::test]
    async fn default_stream_wraps_chat() {
        let rx = FixedProvider.stream(request()).await.unwrap();
        let mut seen = String::new();
        let response = collect_stream(rx, |t| seen.push_str(t)).await.unwrap();
        assert_eq!(seen, "hello world");
        assert_eq!(response.content, "hello world");
        assert_eq!(response.stop_reason, StopReason::EndTurn);
    }

    #[tokio::test]
    async fn collect_stream_errors_on_truncated_stream() {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        tx.send(Ok(StreamChunk::delta("partial"))).await.unwrap();
        drop(tx);
        let err = collect_stream(rx, |_| {}).await.unwrap_err();
        assert!(matches!(err, ProviderError::StreamInterrupted(_)));
    }

    #[test]
    fn stop_reason_serialization() {
        assert_eq!(
            serde_json::to_string(&StopReason::MaxTokens).unwrap(),
            r#""max_tokens""#
        );
    }
}
