//! Plan generation and parsing.
//!
//! Two call shapes drive the provider: plan generation (tools disabled,
//! narrative text with a tagged step list) and execution (tools enabled,
//! free text plus tool calls). This module owns the system prompts, the
//! `[STEP:tool:path]` line format, and the conversion of provider tool calls
//! into pending task steps.

use codeloom_core::provider::ToolCallRequest;
use codeloom_core::task::TaskStep;
use regex::Regex;
use std::sync::OnceLock;

/// System prompt for execution calls without a plan (two-state variant).
pub const SYSTEM_PROMPT: &str = "\
You are a coding assistant that helps users complete programming tasks.
When the user asks for a programming task, understand the requirement, then
use the available tools to carry it out step by step.
Always write clear, well-structured code. Create complete, working files.";

/// System prompt for the plan-generation call (tools disabled).
pub const PLANNING_SYSTEM_PROMPT: &str = "\
You are a coding assistant that helps users complete programming tasks.

When the user asks for a programming task you must:
1. Analyze the requirement carefully
2. Consider an implementation approach
3. Produce a detailed step-by-step execution plan

Your output must contain the following sections:

### Analysis
Your understanding of the task and the technical approach.

### Plan
List every step in the following format (one per line):

1. [STEP:tool_name:target_path] step description
2. [STEP:tool_name:target_path] step description

Available tool_name values: read-file, write-file, create-dir, list-dir, search-files
target_path is the path the tool operates on.

Example:
1. [STEP:list-dir:.] Inspect the current project structure
2. [STEP:read-file:src/index.ts] Read the entry point to understand existing code
3. [STEP:write-file:src/components/Button.tsx] Create the button component
4. [STEP:write-file:src/index.ts] Update the entry point

Make the plan as concrete as possible; each step maps to one tool operation.";

/// System prompt for execution calls, with the approved plan inlined.
pub fn execution_system_prompt(plan_text: &str) -> String {
    format!(
        "You are a coding assistant executing a programming task according to a \
         predefined plan.\n\n\
         This is the full execution plan:\n{plan_text}\n\n\
         Follow the plan in order, using the tools to complete each step.\n\
         Always write clear, well-structured code. Create complete, working files."
    )
}

fn step_regex() -> &'static Regex {
    static STEP_RE: OnceLock<Regex> = OnceLock::new();
    STEP_RE.get_or_init(|| {
        Regex::new(r"(?m)^\d+\.\s*\[STEP:([\w-]+):([^\]]*)\]\s*(.+)$")
            .expect("step regex must compile")
    })
}

/// Parse plan text into pending steps from the `[STEP:tool:path]` format.
///
/// Unmatched lines are ignored. Zero matches means the reply was pure
/// conversation, not a plan.
pub fn parse_plan_steps(plan_text: &str) -> Vec<TaskStep> {
    step_regex()
        .captures_iter(plan_text)
        .enumerate()
        .map(|(index, caps)| {
            let tool = caps[1].trim().to_string();
            let target = caps[2].trim().to_string();
            let description = caps[3].trim().to_string();
            let mut step = TaskStep::pending(
                format!("{tool}: {target}"),
                description,
                tool,
                serde_json::json!({ "path": target }),
            );
            step.plan_index = Some(index);
            step
        })
        .collect()
}

/// Convert provider tool calls into pending steps.
///
/// The title names the tool and its primary target; the description carries
/// the full serialized input.
pub fn steps_from_tool_calls(tool_calls: &[ToolCallRequest]) -> Vec<TaskStep> {
    tool_calls
        .iter()
        .map(|tc| {
            TaskStep::pending(
                format!("{}: {}", tc.name, tool_summary(&tc.name, &tc.input)),
                serde_json::to_string_pretty(&tc.input).unwrap_or_default(),
                tc.name.clone(),
                tc.input.clone(),
            )
        })
        .collect()
}

/// The primary target parameter of a tool call, chosen by tool name.
fn tool_summary(tool_name: &str, input: &serde_json::Value) -> String {
    match tool_name {
        "read-file" | "write-file" | "create-dir" => {
            input["path"].as_str().unwrap_or_default().to_string()
        }
        "list-dir" => input["path"].as_str().unwrap_or(".").to_string(),
        "search-files" => format!("\"{}\"", input["pattern"].as_str().unwrap_or_default()),
        _ => tool_name.to_string(),
    }
}
