//! Write-file tool — snapshot, write, diff.
//!
//! The prior content is snapshotted before the write so the returned outcome
//! carries a structured diff from old to new.

use async_trait::async_trait;
use codeloom_core::error::ToolError;
use codeloom_core::tool::{Tool, ToolOutcome};
use codeloom_workspace::{SnapshotStore, WorkspaceStore, compute_diff};
use std::sync::Arc;
use tracing::debug;

pub struct WriteFileTool {
    store: Arc<WorkspaceStore>,
    snapshots: Arc<SnapshotStore>,
}

impl WriteFileTool {
    pub fn new(store: Arc<WorkspaceStore>, snapshots: Arc<SnapshotStore>) -> Self {
        Self { store, snapshots }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write-file"
    }

    fn description(&self) -> &str {
        "Write content to a file (creates parent directories as needed)"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to workspace"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutcome, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        // File may not exist yet; an empty snapshot marks it as new.
        let old_content = self.store.read_file(path).await.unwrap_or_default();
        self.snapshots.insert(path, old_content.clone());

        match self.store.write_file(path, content).await {
            Ok(()) => {
                let diff = compute_diff(path, &old_content, content);
                debug!(path, is_new = diff.is_new, "File written");
                Ok(ToolOutcome::ok(format!("File written: {path}")).with_diff(diff))
            }
            Err(e) => Ok(ToolOutcome::err(format!("Error writing file: {e}"))),
        }
    }
}
