//! Conversation-history compaction.
//!
//! Builds the context handed to the provider ahead of a new task: the most
//! recent prior task's messages verbatim, older tasks compressed to a
//! prompt/summary pair, oversized tool results centre-truncated, and whole
//! messages evicted oldest-first until the character budget holds.

use codeloom_config::HistoryConfig;
use codeloom_core::message::{ContentBlock, ConversationMessage, MessageContent};
use codeloom_core::session::TaskHistory;
use codeloom_core::task::Task;
use std::collections::HashMap;
use tracing::debug;

/// Assemble bounded model context from a session's accumulated task
/// histories.
pub fn build_context(
    histories: &[TaskHistory],
    tasks: &[Task],
    config: &HistoryConfig,
) -> Vec<ConversationMessage> {
    if histories.is_empty() {
        return Vec::new();
    }

    let task_map: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    // Most recent task keeps its full message sequence; older tasks are
    // compressed to a [prompt, summary] pair each.
    let (older, recent) = histories.split_at(histories.len() - 1);
    let older = &older[older.len().saturating_sub(config.max_compressed_tasks)..];

    let mut result: Vec<ConversationMessage> = Vec::new();
    for history in older {
        if let Some(task) = task_map.get(history.task_id.as_str()) {
            result.extend(compress_task(task));
        }
    }
    result.extend(recent[0].messages.iter().cloned());

    // Truncate large tool results in carried context to prevent bloat.
    for message in &mut result {
        if let MessageContent::Blocks(blocks) = &mut message.content {
            for block in blocks {
                if let ContentBlock::ToolResult { content, .. } = block {
                    *content = truncate_tool_result(content, config.max_tool_result_chars);
                }
            }
        }
    }

    // Enforce the overall budget, evicting from the oldest end.
    let mut total = estimate_chars(&result);
    let mut evicted = 0usize;
    while total > config.max_char_budget && !result.is_empty() {
        let removed = result.remove(0);
        total -= message_chars(&removed);
        evicted += 1;
    }
    if evicted > 0 {
        debug!(evicted, remaining = result.len(), "History budget enforced");
    }

    result
}

/// Compress a finished task into a `[user prompt, assistant summary]` pair.
fn compress_task(task: &Task) -> [ConversationMessage; 2] {
    let summary = task
        .summary
        .clone()
        .unwrap_or_else(|| "(task completed, no summary)".into());
    [
        ConversationMessage::user(task.prompt.clone()),
        ConversationMessage::assistant(summary),
    ]
}

/// Centre-truncate a tool result that exceeds the ceiling: the exact head
/// and tail halves are preserved around a marker stating the omitted count.
pub fn truncate_tool_result(output: &str, max_chars: usize) -> String {
    let total = output.chars().count();
    if total <= max_chars {
        return output.to_string();
    }

    let half = max_chars / 2;
    let head: String = output.chars().take(half).collect();
    let tail: String = output
        .chars()
        .skip(total - half)
        .collect();
    format!(
        "{head}\n\n... [truncated {} characters] ...\n\n{tail}",
        total - max_chars
    )
}

/// Estimated character count of a message sequence.
pub fn estimate_chars(messages: &[ConversationMessage]) -> usize {
    messages.iter().map(message_chars).sum()
}

fn message_chars(message: &ConversationMessage) -> usize {
    match &message.content {
        MessageContent::Text(text) => text.chars().count(),
        MessageContent::Blocks(blocks) => blocks
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.chars().count(),
                ContentBlock::ToolUse { name, input, .. } => {
                    name.chars().count()
                        + serde_json::to_string(input)
                            .map(|s| s.chars().count())
                            .unwrap_or(0)
                }
                ContentBlock::ToolResult { content, .. } => content.chars().count(),
            })
            .sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(budget: usize, tool_max: usize) -> HistoryConfig {
        HistoryConfig {
            max_char_budget: budget,
            max_tool_result_chars: tool_max,
            max_compressed_tasks: 10,
        }
    }

    fn task_with_summary(id: &str, prompt: &str, summary: &str) -> Task {
        let mut task = Task::new(prompt);
        task.id = id.into();
        task.summary = Some(summary.into());
        task
    }

    fn history(task_id: &str, messages: Vec<ConversationMessage>) -> TaskHistory {
        TaskHistory {
            task_id: task_id.into(),
            messages,
        }
    }

    #[test]
    fn empty_histories_yield_empty_context() {
        let context = build_context(&[], &[], &config(1000, 100));
        assert!(context.is_empty());
    }

    #[test]
    fn recent_task_kept_verbatim_older_compressed() {
        let tasks = vec![
            task_with_summary("t1", "first prompt", "first summary"),
            task_with_summary("t2", "second prompt", "second summary"),
        ];
        let histories = vec![
            history(
                "t1",
                vec![
                    ConversationMessage::user("first prompt"),
                    ConversationMessage::assistant("long detailed answer"),
                    ConversationMessage::user("follow-up"),
                    ConversationMessage::assistant("more detail"),
                ],
            ),
            history(
                "t2",
                vec![
                    ConversationMessage::user("second prompt"),
                    ConversationMessage::assistant("full recent answer"),
                ],
            ),
        ];

        let context = build_context(&histories, &tasks, &config(100_000, 1000));

        // t1 compressed to 2 messages, t2 verbatim (2 messages)
        assert_eq!(context.len(), 4);
        assert_eq!(context[0], ConversationMessage::user("first prompt"));
        assert_eq!(context[1], ConversationMessage::assistant("first summary"));
        assert_eq!(context[2], ConversationMessage::user("second prompt"));
        assert_eq!(
            context[3],
            ConversationMessage::assistant("full recent answer")
        );
    }

    #[test]
    fn compressed_task_without_summary_gets_placeholder() {
        let mut task = Task::new("old prompt");
        task.id = "t1".into();
        let tasks = vec![task, task_with_summary("t2", "new", "s")];
        let histories = vec![
            history("t1", vec![ConversationMessage::user("old prompt")]),
            history("t2", vec![ConversationMessage::user("new")]),
        ];

        let context = build_context(&histories, &tasks, &config(100_000, 1000));
        assert_eq!(
            context[1],
            ConversationMessage::assistant("(task completed, no summary)")
        );
    }

    #[test]
    fn older_tasks_capped_at_limit() {
        let mut tasks = Vec::new();
        let mut histories = Vec::new();
        for i in 0..15 {
            let id = format!("t{i}");
            tasks.push(task_with_summary(&id, &format!("p{i}"), &format!("s{i}")));
            histories.push(history(&id, vec![ConversationMessage::user(format!("p{i}"))]));
        }

        let context = build_context(&histories, &tasks, &config(100_000, 1000));
        // 10 compressed pairs + 1 recent message
        assert_eq!(context.len(), 21);
        // Oldest surviving compressed task is t4 (t0..t3 dropped by the cap)
        assert_eq!(context[0], ConversationMessage::user("p4"));
    }

    #[test]
    fn budget_evicts_oldest_first_and_preserves_suffix() {
        let tasks = vec![task_with_summary("t1", "p", "s")];
        let messages: Vec<ConversationMessage> = (0..10)
            .map(|i| ConversationMessage::user(format!("message number {i:02} {}", "x".repeat(50))))
            .collect();
        let histories = vec![history("t1", messages.clone())];

        let budget = 300;
        let context = build_context(&histories, &tasks, &config(budget, 1000));

        assert!(estimate_chars(&context) <= budget);
        assert!(!context.is_empty());
        // The retained messages are exactly the original sequence's suffix
        let suffix = &messages[messages.len() - context.len()..];
        assert_eq!(context, suffix);
    }

    #[test]
    fn tool_results_centre_truncated_in_context() {
        let tasks = vec![task_with_summary("t1", "p", "s")];
        let big = "a".repeat(500);
        let histories = vec![history(
            "t1",
            vec![ConversationMessage::tool_results(vec![
                ContentBlock::ToolResult {
                    tool_use_id: "tu".into(),
                    content: big,
                },
            ])],
        )];

        let context = build_context(&histories, &tasks, &config(100_000, 100));
        let MessageContent::Blocks(blocks) = &context[0].content else {
            panic!("expected blocks");
        };
        let ContentBlock::ToolResult { content, .. } = &blocks[0] else {
            panic!("expected tool result");
        };
        assert!(content.contains("truncated 400 characters"));
    }

    #[test]
    fn truncation_preserves_exact_head_and_tail() {
        let output: String = (0u8..26).cycle().take(1000).map(|i| (b'a' + i) as char).collect();
        let truncated = truncate_tool_result(&output, 100);

        let head: String = output.chars().take(50).collect();
        let tail: String = output.chars().skip(950).collect();
        assert!(truncated.starts_with(&head));
        assert!(truncated.ends_with(&tail));
        assert!(truncated.contains("[truncated 900 characters]"));
    }

    #[test]
    fn short_tool_result_untouched() {
        assert_eq!(truncate_tool_result("short", 100), "short");
    }

    #[test]
    fn estimate_counts_blocks() {
        let messages = vec![ConversationMessage::assistant_blocks(vec![
            ContentBlock::Text { text: "ab".into() },
            ContentBlock::ToolUse {
                id: "i".into(),
                name: "cd".into(),
                input: serde_json::json!({}),
            },
            ContentBlock::ToolResult {
                tool_use_id: "i".into(),
                content: "ef".into(),
            },
        ])];
        // "ab" (2) + "cd" (2) + "{}" (2) + "ef" (2)
        assert_eq!(estimate_chars(&messages), 8);
    }
}
