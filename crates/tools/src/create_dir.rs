//! Create-dir tool.

use async_trait::async_trait;
use codeloom_core::error::ToolError;
use codeloom_core::tool::{Tool, ToolOutcome};
use codeloom_workspace::WorkspaceStore;
use std::sync::Arc;

pub struct CreateDirTool {
    store: Arc<WorkspaceStore>,
}

impl CreateDirTool {
    pub fn new(store: Arc<WorkspaceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CreateDirTool {
    fn name(&self) -> &str {
        "create-dir"
    }

    fn description(&self) -> &str {
        "Create a directory (and parent directories if needed)"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path relative to workspace"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutcome, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        match self.store.create_dir(path).await {
            Ok(()) => Ok(ToolOutcome::ok(format!("Directory created: {path}"))),
            Err(e) => Ok(ToolOutcome::err(format!("Error creating directory: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CreateDirTool::new(Arc::new(WorkspaceStore::new(dir.path())));

        let result = tool
            .execute(serde_json::json!({"path": "src/components"}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(dir.path().join("src/components").is_dir());
    }

    #[tokio::test]
    async fn traversal_fails_softly() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CreateDirTool::new(Arc::new(WorkspaceStore::new(dir.path())));

        let result = tool
            .execute(serde_json::json!({"path": "../outside"}))
            .await
            .unwrap();
        assert!(!result.success);
    }
}
