//! Agent lifecycle events — decoupled communication toward the client.
//!
//! The agent loop publishes events as a task progresses; any transport
//! (socket gateway, CLI renderer, test harness) subscribes and forwards
//! without the loop knowing who is listening.

use crate::file::{FileDiff, FileNode};
use crate::message::ChatMessage;
use crate::task::{Task, TaskStep};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events emitted by the agent during a task's lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A finalized chat message (user or assistant).
    Message { message: ChatMessage },

    /// A streamed assistant turn is starting.
    StreamStart {
        message_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_id: Option<String>,
    },

    /// A text delta within a streamed turn.
    StreamDelta { message_id: String, delta: String },

    /// The streamed turn is complete.
    StreamEnd { message_id: String },

    /// A task entered the state machine.
    TaskCreated { task: Task },

    /// A task mutated (status, steps, summary).
    TaskUpdated { task: Task },

    /// A single step changed state.
    StepUpdated { task_id: String, step: TaskStep },

    /// A plan is awaiting approval.
    PlanReady {
        task_id: String,
        plan: String,
        steps: Vec<TaskStep>,
    },

    /// A tool changed a file.
    FileChanged { diff: FileDiff },

    /// The workspace tree was refreshed.
    FileTree { tree: Vec<FileNode> },

    /// A task-level error surfaced to the user.
    Error { message: String },
}

impl AgentEvent {
    /// The logical wire identifier for this event.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Message { .. } => "chat:message",
            Self::StreamStart { .. } => "chat:stream:start",
            Self::StreamDelta { .. } => "chat:stream:delta",
            Self::StreamEnd { .. } => "chat:stream:end",
            Self::TaskCreated { .. } => "task:created",
            Self::TaskUpdated { .. } => "task:updated",
            Self::StepUpdated { .. } => "task:step:updated",
            Self::PlanReady { .. } => "plan:ready",
            Self::FileChanged { .. } => "file:changed",
            Self::FileTree { .. } => "file:tree",
            Self::Error { .. } => "error",
        }
    }
}

/// A broadcast-based event bus for agent events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Components
/// subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AgentEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
