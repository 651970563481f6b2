//! Step execution — dispatch one planned step to its tool.
//!
//! Execution never propagates an error: unknown tools, invalid arguments,
//! and tool failures all downgrade to a failed step so the task can carry on
//! with the next step.

use codeloom_core::task::{StepStatus, TaskStep};
use codeloom_core::tool::{ToolOutcome, ToolRegistry};
use tracing::{debug, warn};

/// Execute a single step against the registry, mutating its status, result,
/// error, and diff fields. Returns the tool outcome for the round's
/// tool-result message.
pub async fn execute_step(registry: &ToolRegistry, step: &mut TaskStep) -> ToolOutcome {
    let Some(tool_name) = step.tool.clone() else {
        let message = "Step has no tool".to_string();
        step.status = StepStatus::Failed;
        step.error = Some(message.clone());
        return ToolOutcome::err(message);
    };

    if registry.get(&tool_name).is_none() {
        let message = format!("Unknown tool: {tool_name}");
        warn!(tool = %tool_name, "Step references unregistered tool");
        step.status = StepStatus::Failed;
        step.error = Some(message.clone());
        return ToolOutcome::err(message);
    }

    step.status = StepStatus::Running;
    let arguments = step.tool_input.clone().unwrap_or(serde_json::json!({}));

    match registry.execute(&tool_name, arguments).await {
        Ok(outcome) => {
            if outcome.success {
                step.status = StepStatus::Completed;
                step.result = Some(outcome.output.clone());
            } else {
                step.status = StepStatus::Failed;
                step.error = Some(outcome.output.clone());
            }
            if let Some(diff) = &outcome.diff {
                step.diff = Some(diff.clone());
            }
            debug!(tool = %tool_name, success = outcome.success, "Step executed");
            outcome
        }
        Err(e) => {
            let message = e.to_string();
            warn!(tool = %tool_name, error = %message, "Step execution failed");
            step.status = StepStatus::Failed;
            step.error = Some(message.clone());
            ToolOutcome::err(message)
        }
    }
}
