//! Session domain types — the durable container of messages and tasks.

use crate::message::{ChatMessage, ConversationMessage};
use crate::task::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The provider-boundary message sequence generated during one task.
///
/// Stored alongside the session so later tasks can rebuild model context
/// without replaying client-facing chat messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskHistory {
    /// The task this history belongs to
    pub task_id: String,

    /// Messages generated during the task (carried-over context excluded)
    pub messages: Vec<ConversationMessage>,
}

/// A durable conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session ID
    pub id: String,

    /// Display title (auto-generated from the first user message)
    pub title: String,

    /// When this session was created
    pub created_at: DateTime<Utc>,

    /// When this session was last mutated
    pub updated_at: DateTime<Utc>,

    /// Client-facing messages, in order
    pub messages: Vec<ChatMessage>,

    /// Tasks, in creation order
    pub tasks: Vec<Task>,

    /// Per-task provider histories, in completion order
    #[serde(default)]
    pub task_histories: Vec<TaskHistory>,
}

impl Session {
    /// Create a new empty session.
    pub fn new(title: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.unwrap_or_else(|| "New Session".into()),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            tasks: Vec::new(),
            task_histories: Vec::new(),
        }
    }

    /// Bump `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Build a lightweight summary for listings.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            message_count: self.messages.len(),
            task_count: self.tasks.len(),
        }
    }
}

/// A session listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    pub task_count: usize,
}
