//! Message domain types.
//!
//! Two message shapes flow through the system:
//!
//! - [`ChatMessage`] — the durable, client-facing record stored in sessions.
//! - [`ConversationMessage`] — the provider-boundary shape, whose content is
//!   either plain text or an ordered list of typed blocks (text, tool use,
//!   tool result).
//!
//! Invariant: every `ToolUse` block emitted by the assistant must be answered
//! by exactly one `ToolResult` block in the following user turn before the
//! next assistant turn is requested.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System-injected content (error notices, placeholders)
    System,
}

/// A durable chat message, as stored in a session and shown to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// The task this message belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a new user message attached to a task.
    pub fn user(content: impl Into<String>, task_id: Option<String>) -> Self {
        Self::new(Role::User, content, task_id)
    }

    /// Create a new assistant message attached to a task.
    pub fn assistant(content: impl Into<String>, task_id: Option<String>) -> Self {
        Self::new(Role::Assistant, content, task_id)
    }

    fn new(role: Role, content: impl Into<String>, task_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            task_id,
            timestamp: Utc::now(),
        }
    }
}

/// A typed content block inside a provider-boundary message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text { text: String },

    /// A request from the assistant to call a named tool.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// The output of a tool call, referenced by its tool-use id.
    ToolResult { tool_use_id: String, content: String },
}

/// Message content: plain text or an ordered list of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A message at the AI-provider boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Who sent this message (only `user` and `assistant` cross the boundary)
    pub role: Role,

    /// Text or typed blocks
    pub content: MessageContent,
}

impl ConversationMessage {
    /// Create a plain-text user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a plain-text assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create an assistant message from content blocks (text + tool uses).
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// Create the user turn answering tool uses with their results.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(results),
        }
    }

    /// Whether this message ends the conversation on a user turn.
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}
