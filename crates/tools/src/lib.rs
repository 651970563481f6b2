//! Built-in tool implementations for codeloom.
//!
//! Five tools over the sandboxed workspace store: `read-file`, `write-file`,
//! `create-dir`, `list-dir`, and `search-files`. The write tool snapshots
//! prior content and attaches a structured diff to its outcome.

mod create_dir;
mod list_dir;
mod read_file;
mod search_files;
mod write_file;

pub use create_dir::CreateDirTool;
pub use list_dir::ListDirTool;
pub use read_file::ReadFileTool;
pub use search_files::SearchFilesTool;
pub use write_file::WriteFileTool;

use codeloom_core::tool::ToolRegistry;
use codeloom_workspace::{SnapshotStore, WorkspaceStore};
use std::sync::Arc;

/// Build a registry holding all five built-in tools.
pub fn builtin_registry(store: Arc<WorkspaceStore>, snapshots: Arc<SnapshotStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ReadFileTool::new(store.clone())));
    registry.register(Box::new(WriteFileTool::new(store.clone(), snapshots)));
    registry.register(Box::new(CreateDirTool::new(store.clone())));
    registry.register(Box::new(ListDirTool::new(store.clone())));
    registry.register(Box::new(SearchFilesTool::new(store)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_holds_all_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(WorkspaceStore::new(dir.path()));
        let registry = builtin_registry(store, Arc::new(SnapshotStore::new()));

        for name in [
            "read-file",
            "write-file",
            "create-dir",
            "list-dir",
            "search-files",
        ] {
            assert!(registry.get(name).is_some(), "missing tool {name}");
        }
        assert_eq!(registry.definitions().len(), 5);
    }
}
