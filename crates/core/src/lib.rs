//! # codeloom Core
//!
//! Domain types, traits, and error definitions for the codeloom
//! coding-assistant engine. This crate has **zero framework dependencies** —
//! it defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod cancel;
pub mod error;
pub mod event;
pub mod file;
pub mod message;
pub mod provider;
pub mod session;
pub mod task;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use event::{AgentEvent, EventBus};
pub use file::{ChangeKind, DiffChange, DiffHunk, FileDiff, FileKind, FileNode};
pub use message::{ChatMessage, ContentBlock, ConversationMessage, MessageContent, Role};
pub use provider::{
    ChatOptions, ChatRequest, ChatResponse, Provider, StopReason, StreamChunk, ToolCallRequest,
    ToolDefinition,
};
pub use session::{Session, SessionSummary, TaskHistory};
pub use task::{StepStatus, Task, TaskStatus, TaskStep};
pub use tool::{Tool, ToolOutcome, ToolRegistry};
