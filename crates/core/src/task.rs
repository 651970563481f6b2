//! Task and TaskStep domain types — the unit of agent work.
//!
//! A [`Task`] is one user request's full planning+execution lifecycle.
//! A [`TaskStep`] is one planned or executed tool invocation within it.
//! Steps are never deleted, only marked terminal.

use crate::file::FileDiff;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task lifecycle status.
///
/// `pending → planning → awaiting_approval → running → {completed | failed | cancelled}`.
/// When plan approval is disabled the task moves straight from `pending` to
/// `running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Planning,
    AwaitingApproval,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Step lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// One planned or executed tool invocation within a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStep {
    /// Unique step ID
    pub id: String,

    /// Human-readable title (`{tool}: {target}`)
    pub title: String,

    /// Longer description (plan line or serialized tool input)
    pub description: String,

    /// Current status
    pub status: StepStatus,

    /// The tool this step invokes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// Structured tool parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<serde_json::Value>,

    /// Tool output on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Error text on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Diff produced by a file-changing tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<FileDiff>,

    /// The assistant message after which this step should appear
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_message_id: Option<String>,

    /// Position within the original plan (0-based)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_index: Option<usize>,
}

impl TaskStep {
    /// Create a fresh `pending` step for a tool invocation.
    pub fn pending(
        title: impl Into<String>,
        description: impl Into<String>,
        tool: impl Into<String>,
        tool_input: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            status: StepStatus::Pending,
            tool: Some(tool.into()),
            tool_input: Some(tool_input),
            result: None,
            error: None,
            diff: None,
            after_message_id: None,
            plan_index: None,
        }
    }

    /// The step's primary target parameter (`path`, or `pattern` for search).
    pub fn primary_target(&self) -> Option<&str> {
        let input = self.tool_input.as_ref()?;
        input["path"].as_str().or_else(|| input["pattern"].as_str())
    }
}

/// One user-initiated unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task ID
    pub id: String,

    /// The originating user prompt
    pub prompt: String,

    /// Lifecycle status
    pub status: TaskStatus,

    /// Ordered steps
    pub steps: Vec<TaskStep>,

    /// Plan text produced during the planning phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,

    /// Final assistant summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// When this task was created
    pub created_at: DateTime<Utc>,

    /// When this task was last mutated
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new `pending` task for a user prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            prompt: prompt.into(),
            status: TaskStatus::Pending,
            steps: Vec::new(),
            plan: None,
            summary: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to a new status, bumping `updated_at`.
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.touch();
    }

    /// Bump `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Mark every step that has not reached a terminal state as skipped.
    pub fn skip_unfinished_steps(&mut self) {
        for step in &mut self.steps {
            if matches!(step.status, StepStatus::Pending | StepStatus::Running) {
                step.status = StepStatus::Skipped;
            }
        }
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStatus::AwaitingApproval).unwrap();
        assert_eq!(json, r#""awaiting_approval""#);
    }

    #[test]
    fn new_task_is_pending() {
        let task = Task::new("create a button");
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.steps.is_empty());
        assert!(!task.status.is_terminal());
    }

    #[test]
    fn skip_unfinished_leaves_terminal_steps() {
        let mut task = Task::new("x");
        let mut done = TaskStep::pending("a", "", "read-file", serde_json::json!({}));
        done.status = StepStatus::Completed;
        task.steps.push(done);
        task.steps
            .push(TaskStep::pending("b", "", "write-file", serde_json::json!({})));

        task.skip_unfinished_steps();
        assert_eq!(task.steps[0].status, StepStatus::Completed);
        assert_eq!(task.steps[1].status, StepStatus::Skipped);
    }

    #[test]
    fn primary_target_prefers_path() {
        let step = TaskStep::pending(
            "t",
            "",
            "search-files",
            serde_json::json!({"pattern": "TODO"}),
        );
        assert_eq!(step.primary_target(), Some("TODO"));

        let step = TaskStep::pending(
            "t",
            "",
            "read-file",
            serde_json::json!({"path": "src/main.rs"}),
        );
        assert_eq!(step.primary_target(), Some("src/main.rs"));
    }

    #[test]
    fn task_serializes_camel_case() {
        let task = Task::new("x");
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("createdAt"));
        assert!(json.contains("updatedAt"));
    }
}
