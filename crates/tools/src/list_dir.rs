//! List-dir tool.

use async_trait::async_trait;
use codeloom_core::error::ToolError;
use codeloom_core::tool::{Tool, ToolOutcome};
use codeloom_workspace::WorkspaceStore;
use std::sync::Arc;

pub struct ListDirTool {
    store: Arc<WorkspaceStore>,
}

impl ListDirTool {
    pub fn new(store: Arc<WorkspaceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list-dir"
    }

    fn description(&self) -> &str {
        "List contents of a directory"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path relative to workspace (default: root)"
                }
            },
            "required": []
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutcome, ToolError> {
        let path = arguments["path"].as_str().unwrap_or(".");

        match self.store.list_dir(path).await {
            Ok(entries) => Ok(ToolOutcome::ok(entries.join("\n"))),
            Err(e) => Ok(ToolOutcome::err(format!("Error listing directory: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_root_by_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();

        let tool = ListDirTool::new(Arc::new(WorkspaceStore::new(dir.path())));
        let result = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "a.txt\nsrc/");
    }

    #[tokio::test]
    async fn missing_dir_fails_softly() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ListDirTool::new(Arc::new(WorkspaceStore::new(dir.path())));
        let result = tool
            .execute(serde_json::json!({"path": "nope"}))
            .await
            .unwrap();
        assert!(!result.success);
    }
}
