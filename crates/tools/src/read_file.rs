//! Read-file tool — return a file's contents from the workspace.

use async_trait::async_trait;
use codeloom_core::error::ToolError;
use codeloom_core::tool::{Tool, ToolOutcome};
use codeloom_workspace::WorkspaceStore;
use std::sync::Arc;

pub struct ReadFileTool {
    store: Arc<WorkspaceStore>,
}

impl ReadFileTool {
    pub fn new(store: Arc<WorkspaceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read-file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to workspace"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutcome, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        match self.store.read_file(path).await {
            Ok(content) => Ok(ToolOutcome::ok(content)),
            Err(e) => Ok(ToolOutcome::err(format!("Error reading file: {e}"))),
        }
    }
}
