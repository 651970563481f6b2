//! The agent orchestration loop — the task state machine.
//!
//! `pending → planning → awaiting_approval → running → {completed | failed |
//! cancelled}`. Planning streams a tagged plan and parses it into steps;
//! approval is a cancellable rendezvous with an optional auto-approve
//! timeout; the running phase alternates streamed assistant turns with
//! sequential tool execution, bounded by a round limit. Every state
//! transition is persisted and broadcast.

use crate::approval::{ApprovalOutcome, ApprovalRegistry};
use crate::executor::execute_step;
use crate::history::build_context;
use crate::planner;
use codeloom_config::{AgentConfig, AppConfig, ApprovalConfig, HistoryConfig};
use codeloom_core::cancel::CancelToken;
use codeloom_core::error::Error;
use codeloom_core::event::{AgentEvent, EventBus};
use codeloom_core::message::{ChatMessage, ContentBlock, ConversationMessage, Role};
use codeloom_core::provider::{
    ChatOptions, ChatRequest, ChatResponse, Provider, StopReason, collect_stream,
};
use codeloom_core::session::TaskHistory;
use codeloom_core::task::{StepStatus, Task, TaskStatus};
use codeloom_core::tool::ToolRegistry;
use codeloom_session::SessionStore;
use codeloom_workspace::WorkspaceStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Appended when a stored history slice would otherwise end on a user turn.
const PLACEHOLDER_ASSISTANT_REPLY: &str = "(task interrupted before the assistant replied)";

/// Injected after plan approval to open the execution rounds on a user turn.
const EXECUTE_PLAN_PROMPT: &str =
    "The plan has been approved. Execute it step by step using the tools.";

/// Pushed when a reply was truncated at the token limit.
const CONTINUE_PROMPT: &str = "Continue.";

/// The agent orchestration loop.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    workspace: Arc<WorkspaceStore>,
    sessions: Arc<SessionStore>,
    events: Arc<EventBus>,
    approvals: Arc<ApprovalRegistry>,
    agent: AgentConfig,
    approval: ApprovalConfig,
    history: HistoryConfig,
    max_tokens: u32,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        workspace: Arc<WorkspaceStore>,
        sessions: Arc<SessionStore>,
        events: Arc<EventBus>,
        approvals: Arc<ApprovalRegistry>,
        config: &AppConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            workspace,
            sessions,
            events,
            approvals,
            agent: config.agent.clone(),
            approval: config.approval.clone(),
            history: config.history.clone(),
            max_tokens: config.anthropic.max_tokens,
        }
    }

    /// The event bus this loop publishes to.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// The approval registry external callers resolve by task id.
    pub fn approvals(&self) -> &Arc<ApprovalRegistry> {
        &self.approvals
    }

    /// Run one task to a terminal state.
    ///
    /// Provider and tool failures are absorbed into the task (status
    /// `failed`, one `error` event); the returned `Err` is reserved for
    /// infrastructure failures such as a missing session.
    pub async fn run(
        &self,
        session_id: &str,
        user_message: &str,
        cancel: CancelToken,
    ) -> Result<Task, Error> {
        let mut task = Task::new(user_message);
        info!(task_id = %task.id, session_id, "Task created");

        // Prior context from earlier tasks, within budget.
        let histories = self.sessions.get_task_histories(session_id).await?;
        let session = self.sessions.get_session(session_id).await?;
        let mut conversation = build_context(&histories, &session.tasks, &self.history);
        let carried_len = conversation.len();
        conversation.push(ConversationMessage::user(user_message));

        // Surface and persist the user's message.
        let user_chat = ChatMessage::user(user_message, Some(task.id.clone()));
        self.events.publish(AgentEvent::Message {
            message: user_chat.clone(),
        });
        self.sessions.add_message(session_id, user_chat).await?;

        self.events.publish(AgentEvent::TaskCreated {
            task: task.clone(),
        });
        self.sessions.upsert_task(session_id, &task).await?;

        let outcome = self
            .drive(&mut task, &mut conversation, session_id, &cancel)
            .await;

        if let Err(e) = &outcome {
            warn!(task_id = %task.id, error = %e, "Task failed");
            task.set_status(TaskStatus::Failed);
        }

        // Terminal persistence happens before any error surfaces.
        self.sessions.upsert_task(session_id, &task).await?;
        let mut slice: Vec<ConversationMessage> = conversation.split_off(carried_len);
        if slice.last().map(|m| m.is_user()).unwrap_or(false) {
            slice.push(ConversationMessage::assistant(PLACEHOLDER_ASSISTANT_REPLY));
        }
        self.sessions
            .append_task_history(
                session_id,
                TaskHistory {
                    task_id: task.id.clone(),
                    messages: slice,
                },
            )
            .await?;

        self.events.publish(AgentEvent::TaskUpdated {
            task: task.clone(),
        });
        if let Err(e) = outcome {
            self.events.publish(AgentEvent::Error {
                message: e.to_string(),
            });
        }

        info!(task_id = %task.id, status = ?task.status, "Task finished");
        Ok(task)
    }

    /// Drive the task through planning, approval, and execution rounds.
    /// Leaves the task in a terminal state unless an error is returned.
    async fn drive(
        &self,
        task: &mut Task,
        conversation: &mut Vec<ConversationMessage>,
        session_id: &str,
        cancel: &CancelToken,
    ) -> Result<(), Error> {
        if self.approval.require_plan {
            match self.plan_phase(task, conversation, session_id, cancel).await? {
                PlanPhase::Conversational | PlanPhase::NotApproved => return Ok(()),
                PlanPhase::Approved => {}
            }
        }

        task.set_status(TaskStatus::Running);
        self.broadcast_task(task, session_id).await?;

        let system = match &task.plan {
            Some(plan) => planner::execution_system_prompt(plan),
            None => planner::SYSTEM_PROMPT.to_string(),
        };

        let mut round = 0;
        while round < self.agent.max_rounds {
            if cancel.is_cancelled() {
                break;
            }
            round += 1;
            debug!(task_id = %task.id, round, "Execution round");

            let (message_id, response) = self
                .stream_turn(task, conversation, session_id, &system, false)
                .await?;

            if response.tool_calls.is_empty() {
                if response.stop_reason == StopReason::MaxTokens && round < self.agent.max_rounds {
                    // Truncated reply: ask the model to continue.
                    conversation.push(ConversationMessage::assistant(response.content));
                    conversation.push(ConversationMessage::user(CONTINUE_PROMPT));
                    continue;
                }
                if !response.content.is_empty() {
                    conversation.push(ConversationMessage::assistant(response.content.clone()));
                    task.summary = Some(response.content);
                }
                break;
            }

            // Record the assistant turn with its tool-use blocks.
            let mut blocks = Vec::new();
            if !response.content.is_empty() {
                blocks.push(ContentBlock::Text {
                    text: response.content.clone(),
                });
            }
            for tc in &response.tool_calls {
                blocks.push(ContentBlock::ToolUse {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    input: tc.input.clone(),
                });
            }
            conversation.push(ConversationMessage::assistant_blocks(blocks));

            // Resolve each call to a planned step, or create an ad-hoc one.
            let step_indices = resolve_steps(task, &response.tool_calls);
            for &index in &step_indices {
                if task.steps[index].after_message_id.is_none() {
                    task.steps[index].after_message_id = Some(message_id.clone());
                }
            }
            self.broadcast_task(task, session_id).await?;

            // Execute sequentially; later steps may read earlier writes.
            let mut outputs: Vec<String> = Vec::with_capacity(step_indices.len());
            for &index in &step_indices {
                if cancel.is_cancelled() {
                    task.steps[index].status = StepStatus::Skipped;
                    self.publish_step(task, index);
                    outputs.push("Skipped".into());
                    continue;
                }

                task.steps[index].status = StepStatus::Running;
                self.publish_step(task, index);

                if self.agent.step_pause_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(self.agent.step_pause_ms)).await;
                }

                let outcome = execute_step(&self.tools, &mut task.steps[index]).await;
                outputs.push(outcome.output.clone());

                if let Some(diff) = &task.steps[index].diff {
                    self.events.publish(AgentEvent::FileChanged { diff: diff.clone() });
                    if let Ok(tree) = self.workspace.file_tree(".").await {
                        self.events.publish(AgentEvent::FileTree { tree });
                    }
                }
                self.publish_step(task, index);
            }

            // Answer every tool use in one user turn, in call order.
            let result_blocks: Vec<ContentBlock> = response
                .tool_calls
                .iter()
                .zip(&outputs)
                .map(|(tc, output)| ContentBlock::ToolResult {
                    tool_use_id: tc.id.clone(),
                    content: if output.is_empty() {
                        "No output".into()
                    } else {
                        output.clone()
                    },
                })
                .collect();
            conversation.push(ConversationMessage::tool_results(result_blocks));

            task.touch();
            self.sessions.upsert_task(session_id, task).await?;
        }

        if cancel.is_cancelled() {
            task.skip_unfinished_steps();
            task.set_status(TaskStatus::Cancelled);
        } else {
            task.set_status(TaskStatus::Completed);
        }
        Ok(())
    }

    /// Planning and approval. Streams a tools-disabled plan, parses it, and
    /// waits for the approval rendezvous when steps were produced.
    async fn plan_phase(
        &self,
        task: &mut Task,
        conversation: &mut Vec<ConversationMessage>,
        session_id: &str,
        cancel: &CancelToken,
    ) -> Result<PlanPhase, Error> {
        task.set_status(TaskStatus::Planning);
        self.broadcast_task(task, session_id).await?;

        let (plan_message_id, response) = self
            .stream_turn(
                task,
                conversation,
                session_id,
                planner::PLANNING_SYSTEM_PROMPT,
                true,
            )
            .await?;

        let mut steps = planner::parse_plan_steps(&response.content);
        if steps.is_empty() {
            // Pure conversation — no approval, straight to completed.
            debug!(task_id = %task.id, "No plan steps parsed, conversational reply");
            if !response.content.is_empty() {
                conversation.push(ConversationMessage::assistant(response.content.clone()));
                task.summary = Some(response.content);
            }
            task.set_status(TaskStatus::Completed);
            return Ok(PlanPhase::Conversational);
        }

        conversation.push(ConversationMessage::assistant(response.content.clone()));
        for step in &mut steps {
            step.after_message_id = Some(plan_message_id.clone());
        }
        task.plan = Some(response.content.clone());
        task.steps = steps;
        task.set_status(TaskStatus::AwaitingApproval);
        self.broadcast_task(task, session_id).await?;
        self.events.publish(AgentEvent::PlanReady {
            task_id: task.id.clone(),
            plan: response.content,
            steps: task.steps.clone(),
        });

        match self.approvals.wait(&task.id, &self.approval, cancel).await {
            ApprovalOutcome::Approved | ApprovalOutcome::AutoApproved => {
                conversation.push(ConversationMessage::user(EXECUTE_PLAN_PROMPT));
                Ok(PlanPhase::Approved)
            }
            ApprovalOutcome::Rejected | ApprovalOutcome::Cancelled => {
                debug!(task_id = %task.id, "Plan not approved");
                task.skip_unfinished_steps();
                task.set_status(TaskStatus::Cancelled);
                Ok(PlanPhase::NotApproved)
            }
        }
    }

    /// Stream one assistant turn, forwarding deltas live, then persist the
    /// finished text as a chat message. Returns the turn's message id along
    /// with the aggregate response.
    async fn stream_turn(
        &self,
        task: &Task,
        conversation: &[ConversationMessage],
        session_id: &str,
        system: &str,
        disable_tools: bool,
    ) -> Result<(String, ChatResponse), Error> {
        let message_id = Uuid::new_v4().to_string();
        self.events.publish(AgentEvent::StreamStart {
            message_id: message_id.clone(),
            task_id: Some(task.id.clone()),
        });

        let request = ChatRequest {
            messages: conversation.to_vec(),
            system: system.to_string(),
            tools: self.tools.definitions(),
            max_tokens: self.max_tokens,
            options: ChatOptions {
                enable_caching: true,
                disable_tools,
            },
        };

        let rx = self.provider.stream(request).await?;
        let events = &self.events;
        let response = collect_stream(rx, |delta| {
            events.publish(AgentEvent::StreamDelta {
                message_id: message_id.clone(),
                delta: delta.to_string(),
            });
        })
        .await?;

        self.events.publish(AgentEvent::StreamEnd {
            message_id: message_id.clone(),
        });

        if !response.content.is_empty() {
            let chat = ChatMessage {
                id: message_id.clone(),
                role: Role::Assistant,
                content: response.content.clone(),
                task_id: Some(task.id.clone()),
                timestamp: chrono::Utc::now(),
            };
            self.events.publish(AgentEvent::Message {
                message: chat.clone(),
            });
            self.sessions.add_message(session_id, chat).await?;
        }

        Ok((message_id, response))
    }

    async fn broadcast_task(&self, task: &Task, session_id: &str) -> Result<(), Error> {
        self.events.publish(AgentEvent::TaskUpdated {
            task: task.clone(),
        });
        self.sessions.upsert_task(session_id, task).await?;
        Ok(())
    }

    fn publish_step(&self, task: &Task, index: usize) {
        self.events.publish(AgentEvent::StepUpdated {
            task_id: task.id.clone(),
            step: task.steps[index].clone(),
        });
    }
}

enum PlanPhase {
    /// No steps parsed; the reply was pure conversation.
    Conversational,
    /// Approved (explicitly or by timeout); execution may begin.
    Approved,
    /// Rejected or cancelled while waiting.
    NotApproved,
}

/// Match each tool call to the first unclaimed planned step with the same
/// tool name and primary target; otherwise append an ad-hoc step. Returns
/// step indices in call order.
fn resolve_steps(
    task: &mut Task,
    tool_calls: &[codeloom_core::provider::ToolCallRequest],
) -> Vec<usize> {
    let mut claimed: Vec<usize> = Vec::new();

    for tc in tool_calls {
        let call_target = tc.input["path"]
            .as_str()
            .or_else(|| tc.input["pattern"].as_str());

        let matched = task
            .steps
            .iter()
            .enumerate()
            .find(|(i, step)| {
                !claimed.contains(i)
                    && step.status == StepStatus::Pending
                    && step.tool.as_deref() == Some(tc.name.as_str())
                    && step.primary_target() == call_target
            })
            .map(|(i, _)| i);

        let index = match matched {
            Some(index) => {
                // Adopt the full call input; the planned step only knew the target.
                task.steps[index].tool_input = Some(tc.input.clone());
                index
            }
            None => {
                let mut steps = planner::steps_from_tool_calls(std::slice::from_ref(tc));
                let step = steps.remove(0);
                task.steps.push(step);
                task.steps.len() - 1
            }
        };
        claimed.push(index);
    }

    claimed
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeloom_core::task::TaskStep;

    fn planned(tool: &str, target: &str) -> TaskStep {
        let mut step = TaskStep::pending(
            format!("{tool}: {target}"),
            "planned",
            tool,
            serde_json::json!({ "path": target }),
        );
        step.plan_index = Some(0);
        step
    }

    fn call(id: &str, name: &str, input: serde_json::Value) -> codeloom_core::provider::ToolCallRequest {
        codeloom_core::provider::ToolCallRequest {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    #[test]
    fn matching_call_claims_planned_step() {
        let mut task = Task::new("x");
        task.steps.push(planned("write-file", "src/a.rs"));

        let calls = vec![call(
            "c1",
            "write-file",
            serde_json::json!({"path": "src/a.rs", "content": "body"}),
        )];
        let indices = resolve_steps(&mut task, &calls);

        assert_eq!(indices, vec![0]);
        assert_eq!(task.steps.len(), 1);
        // The planned step adopted the full input
        assert_eq!(task.steps[0].tool_input.as_ref().unwrap()["content"], "body");
    }

    #[test]
    fn mismatched_call_becomes_ad_hoc_step() {
        let mut task = Task::new("x");
        task.steps.push(planned("write-file", "src/a.rs"));

        let calls = vec![call(
            "c1",
            "write-file",
            serde_json::json!({"path": "src/other.rs", "content": "body"}),
        )];
        let indices = resolve_steps(&mut task, &calls);

        assert_eq!(indices, vec![1]);
        assert_eq!(task.steps.len(), 2);
        assert_eq!(task.steps[1].title, "write-file: src/other.rs");
    }

    #[test]
    fn each_planned_step_claimed_once() {
        let mut task = Task::new("x");
        task.steps.push(planned("write-file", "src/a.rs"));

        let calls = vec![
            call("c1", "write-file", serde_json::json!({"path": "src/a.rs"})),
            call("c2", "write-file", serde_json::json!({"path": "src/a.rs"})),
        ];
        let indices = resolve_steps(&mut task, &calls);

        assert_eq!(indices[0], 0);
        assert_eq!(indices[1], 1, "second identical call must go ad-hoc");
        assert_eq!(task.steps.len(), 2);
    }

    #[test]
    fn pattern_target_matches_search_step() {
        let mut task = Task::new("x");
        let mut step = TaskStep::pending(
            "search-files: \"TODO\"",
            "planned",
            "search-files",
            serde_json::json!({"pattern": "TODO"}),
        );
        step.plan_index = Some(0);
        task.steps.push(step);

        let calls = vec![call(
            "c1",
            "search-files",
            serde_json::json!({"pattern": "TODO"}),
        )];
        let indices = resolve_steps(&mut task, &calls);
        assert_eq!(indices, vec![0]);
        assert_eq!(task.steps.len(), 1);
    }
}
