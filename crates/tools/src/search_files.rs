//! Search-files tool — substring match over names and relative paths.

use async_trait::async_trait;
use codeloom_core::error::ToolError;
use codeloom_core::tool::{Tool, ToolOutcome};
use codeloom_workspace::WorkspaceStore;
use std::sync::Arc;

pub struct SearchFilesTool {
    store: Arc<WorkspaceStore>,
}

impl SearchFilesTool {
    pub fn new(store: Arc<WorkspaceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search-files"
    }

    fn description(&self) -> &str {
        "Search for files matching a pattern"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Search pattern"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in (default: root)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutcome, ToolError> {
        let pattern = arguments["pattern"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'pattern' argument".into()))?;
        let path = arguments["path"].as_str().unwrap_or(".");

        match self.store.search_files(pattern, path).await {
            Ok(results) if results.is_empty() => Ok(ToolOutcome::ok("No files found")),
            Ok(results) => Ok(ToolOutcome::ok(results.join("\n"))),
            Err(e) => Ok(ToolOutcome::err(format!("Error searching files: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/button.tsx"), "x").unwrap();
        std::fs::write(dir.path().join("src/input.tsx"), "x").unwrap();

        let tool = SearchFilesTool::new(Arc::new(WorkspaceStore::new(dir.path())));
        let result = tool
            .execute(serde_json::json!({"pattern": "button"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "src/button.tsx");
    }

    #[tokio::test]
    async fn no_matches_reports_none() {
        let dir = tempfile::tempdir().unwrap();
        let tool = SearchFilesTool::new(Arc::new(WorkspaceStore::new(dir.path())));
        let result = tool
            .execute(serde_json::json!({"pattern": "nothing"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "No files found");
    }

    #[tokio::test]
    async fn missing_pattern_argument() {
        let dir = tempfile::tempdir().unwrap();
        let tool = SearchFilesTool::new(Arc::new(WorkspaceStore::new(dir.path())));
        assert!(tool.execute(serde_json::json!({})).await.is_err());
    }
}
