//! Deterministic offline provider stand-in.
//!
//! Used by tests and the default configuration. Responses come from a
//! scripted turn queue; streaming emits fixed-size chunks with no delays so
//! test runs are reproducible.

use async_trait::async_trait;
use codeloom_core::error::ProviderError;
use codeloom_core::provider::{
    ChatRequest, ChatResponse, Provider, StopReason, StreamChunk, ToolCallRequest,
};
use std::collections::VecDeque;
use std::sync::Mutex;

const STREAM_CHUNK_CHARS: usize = 4;

/// One scripted provider turn.
#[derive(Debug, Clone)]
pub struct MockTurn {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub stop_reason: StopReason,
}

impl MockTurn {
    /// A plain-text final turn.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            stop_reason: StopReason::EndTurn,
        }
    }

    /// A turn requesting tool calls.
    pub fn tools(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            stop_reason: StopReason::ToolUse,
        }
    }

    /// A turn truncated at the token limit.
    pub fn truncated(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            stop_reason: StopReason::MaxTokens,
        }
    }
}

/// Deterministic scripted provider.
pub struct MockProvider {
    /// Returned whenever tools are disabled (plan generation).
    plan_response: MockTurn,

    /// Tool-enabled turns, consumed front to back.
    turns: Mutex<VecDeque<MockTurn>>,
}

impl MockProvider {
    /// Default script: a two-step plan, then a create/write round followed by
    /// a summary.
    pub fn new() -> Self {
        let plan = MockTurn::text(
            "### Analysis\nThe project needs a source directory and an entry point.\n\n\
             ### Plan\n\
             1. [STEP:create-dir:src] Create the source directory\n\
             2. [STEP:write-file:src/index.ts] Create the main entry point\n",
        );

        let turns = vec![
            MockTurn::tools(
                "I'll start by setting up the project structure.",
                vec![
                    ToolCallRequest {
                        id: "mock_tool_1".into(),
                        name: "create-dir".into(),
                        input: serde_json::json!({"path": "src"}),
                    },
                    ToolCallRequest {
                        id: "mock_tool_2".into(),
                        name: "write-file".into(),
                        input: serde_json::json!({
                            "path": "src/index.ts",
                            "content": "console.log(\"Hello from the coding agent!\");\n"
                        }),
                    },
                ],
            ),
            MockTurn::text(
                "I've completed the task: created the src/ directory and the entry point.",
            ),
        ];

        Self::scripted(plan, turns)
    }

    /// Build a provider with an explicit plan response and turn script.
    pub fn scripted(plan_response: MockTurn, turns: Vec<MockTurn>) -> Self {
        Self {
            plan_response,
            turns: Mutex::new(turns.into()),
        }
    }

    fn next_turn(&self, request: &ChatRequest) -> MockTurn {
        if request.options.disable_tools {
            return self.plan_response.clone();
        }
        self.turns
            .lock()
            .expect("mock turn lock poisoned")
            .pop_front()
            .unwrap_or_else(|| MockTurn::text("All done."))
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let turn = self.next_turn(&request);
        Ok(ChatResponse {
            content: turn.content,
            tool_calls: turn.tool_calls,
            stop_reason: turn.stop_reason,
        })
    }

    async fn stream(
        &self,
        request: ChatRequest,
    ) -> Result<
        tokio::sync::mpsc::Receiver<Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let turn = self.next_turn(&request);
        let (tx, rx) = tokio::sync::mpsc::channel(64);

        tokio::spawn(async move {
            let chars: Vec<char> = turn.content.chars().collect();
            for chunk in chars.chunks(STREAM_CHUNK_CHARS) {
                let text: String = chunk.iter().collect();
                if tx.send(Ok(StreamChunk::delta(text))).await.is_err() {
                    return;
                }
            }
            let _ = tx
                .send(Ok(StreamChunk::done(turn.tool_calls, turn.stop_reason)))
                .await;
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeloom_core::message::ConversationMessage;
    use codeloom_core::provider::{ChatOptions, collect_stream};

    fn request(disable_tools: bool) -> ChatRequest {
        ChatRequest {
            messages: vec![ConversationMessage::user("build something")],
            system: "system".into(),
            tools: vec![],
            max_tokens: 256,
            options: ChatOptions {
                enable_caching: false,
                disable_tools,
            },
        }
    }

    #[tokio::test]
    async fn plan_mode_returns_step_lines() {
        let provider = MockProvider::new();
        let response = provider.chat(request(true)).await.unwrap();
        assert!(response.content.contains("[STEP:create-dir:src]"));
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.stop_reason, StopReason::EndTurn);
    }

    #[tokio::test]
    async fn turns_consumed_in_order() {
        let provider = MockProvider::new();

        let first = provider.chat(request(false)).await.unwrap();
        assert_eq!(first.stop_reason, StopReason::ToolUse);
        assert_eq!(first.tool_calls.len(), 2);
        assert_eq!(first.tool_calls[0].name, "create-dir");

        let second = provider.chat(request(false)).await.unwrap();
        assert_eq!(second.stop_reason, StopReason::EndTurn);
        assert!(second.tool_calls.is_empty());

        // Script exhausted
        let third = provider.chat(request(false)).await.unwrap();
        assert_eq!(third.content, "All done.");
    }

    #[tokio::test]
    async fn stream_chunks_reassemble_exactly() {
        let provider = MockProvider::scripted(
            MockTurn::text("unused"),
            vec![MockTurn::text("The quick brown fox jumps over the lazy dog")],
        );

        let rx = provider.stream(request(false)).await.unwrap();
        let mut streamed = String::new();
        let mut deltas = 0;
        let response = collect_stream(rx, |t| {
            streamed.push_str(t);
            deltas += 1;
        })
        .await
        .unwrap();

        assert_eq!(streamed, "The quick brown fox jumps over the lazy dog");
        assert_eq!(response.content, streamed);
        assert!(deltas > 1, "content should arrive in multiple chunks");
    }

    #[tokio::test]
    async fn truncated_turn_reports_max_tokens() {
        let provider = MockProvider::scripted(
            MockTurn::text("plan"),
            vec![MockTurn::truncated("partial answer that got cut")],
        );
        let response = provider.chat(request(false)).await.unwrap();
        assert_eq!(response.stop_reason, StopReason::MaxTokens);
    }
}
