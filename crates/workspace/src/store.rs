//! Sandboxed file-tree access.
//!
//! Every path is resolved against the workspace root; anything escaping the
//! root is rejected before touching the filesystem.

use codeloom_core::error::WorkspaceError;
use codeloom_core::file::{FileKind, FileNode};
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use tracing::debug;

/// Directories skipped by search and tree traversal.
const IGNORED_DIRS: &[&str] = &["node_modules", ".git", "target"];

/// Sandboxed read/write/list/search over a file tree.
pub struct WorkspaceStore {
    root: PathBuf,
}

impl WorkspaceStore {
    /// Create a store rooted at `root`. The directory is not created until
    /// [`ensure_root`](Self::ensure_root) or the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the workspace root if missing.
    pub async fn ensure_root(&self) -> Result<(), WorkspaceError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| io_err(&self.root, e))
    }

    /// Resolve a workspace-relative path, rejecting traversal outside the
    /// root. Absolute paths are allowed only when already inside the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, WorkspaceError> {
        let candidate = Path::new(path);

        if candidate.is_absolute() {
            if candidate.starts_with(&self.root) {
                return Ok(candidate.to_path_buf());
            }
            return Err(WorkspaceError::PathTraversal(path.to_string()));
        }

        let mut resolved = self.root.clone();
        for component in candidate.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                // Popping past the root escapes the sandbox
                Component::ParentDir => {
                    if resolved == self.root || !resolved.pop() || !resolved.starts_with(&self.root)
                    {
                        return Err(WorkspaceError::PathTraversal(path.to_string()));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(WorkspaceError::PathTraversal(path.to_string()));
                }
            }
        }
        Ok(resolved)
    }

    /// Read a file's contents.
    pub async fn read_file(&self, path: &str) -> Result<String, WorkspaceError> {
        let resolved = self.resolve(path)?;
        tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| io_err(&resolved, e))
    }

    /// Write a file, creating parent directories as needed.
    pub async fn write_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError> {
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }
        debug!(path, bytes = content.len(), "Writing workspace file");
        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| io_err(&resolved, e))
    }

    /// Create a directory (and parents).
    pub async fn create_dir(&self, path: &str) -> Result<(), WorkspaceError> {
        let resolved = self.resolve(path)?;
        tokio::fs::create_dir_all(&resolved)
            .await
            .map_err(|e| io_err(&resolved, e))
    }

    /// Whether a file or directory exists at the path.
    pub async fn file_exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(resolved) => tokio::fs::try_exists(&resolved).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// List a directory's entries; directory names get a `/` suffix.
    pub async fn list_dir(&self, path: &str) -> Result<Vec<String>, WorkspaceError> {
        let resolved = self.resolve(path)?;
        let mut read_dir = tokio::fs::read_dir(&resolved)
            .await
            .map_err(|e| io_err(&resolved, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(|e| io_err(&resolved, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            entries.push(if is_dir { format!("{name}/") } else { name });
        }
        entries.sort();
        Ok(entries)
    }

    /// Find files whose name or relative path contains `pattern`, skipping
    /// ignored directories. Returns workspace-relative paths.
    pub async fn search_files(
        &self,
        pattern: &str,
        path: &str,
    ) -> Result<Vec<String>, WorkspaceError> {
        let start = self.resolve(path)?;
        let mut results = Vec::new();
        let mut pending = vec![start];

        while let Some(dir) = pending.pop() {
            let mut read_dir = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| io_err(&dir, e))?;
            while let Some(entry) = read_dir.next_entry().await.map_err(|e| io_err(&dir, e))? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let full = entry.path();
                let is_dir = entry
                    .file_type()
                    .await
                    .map(|t| t.is_dir())
                    .unwrap_or(false);

                if is_dir {
                    if !IGNORED_DIRS.contains(&name.as_str()) {
                        pending.push(full);
                    }
                } else {
                    let relative = self.relative(&full);
                    if name.contains(pattern) || relative.contains(pattern) {
                        results.push(relative);
                    }
                }
            }
        }

        results.sort();
        Ok(results)
    }

    /// Build the workspace tree: directories first, name-sorted, ignored
    /// directories skipped.
    pub async fn file_tree(&self, path: &str) -> Result<Vec<FileNode>, WorkspaceError> {
        let resolved = self.resolve(path)?;
        self.build_tree(resolved).await
    }

    fn build_tree<'a>(
        &'a self,
        dir: PathBuf,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<FileNode>, WorkspaceError>> + Send + 'a>> {
        Box::pin(async move {
            let mut read_dir = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| io_err(&dir, e))?;

            let mut entries = Vec::new();
            while let Some(entry) = read_dir.next_entry().await.map_err(|e| io_err(&dir, e))? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let is_dir = entry
                    .file_type()
                    .await
                    .map(|t| t.is_dir())
                    .unwrap_or(false);
                entries.push((name, entry.path(), is_dir));
            }

            entries.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));

            let mut nodes = Vec::new();
            for (name, full, is_dir) in entries {
                if IGNORED_DIRS.contains(&name.as_str()) {
                    continue;
                }
                let relative = self.relative(&full);
                if is_dir {
                    let children = self.build_tree(full).await?;
                    nodes.push(FileNode {
                        name,
                        path: relative,
                        kind: FileKind::Directory,
                        children: Some(children),
                    });
                } else {
                    nodes.push(FileNode {
                        name,
                        path: relative,
                        kind: FileKind::File,
                        children: None,
                    });
                }
            }
            Ok(nodes)
        })
    }

    fn relative(&self, full: &Path) -> String {
        full.strip_prefix(&self.root)
            .unwrap_or(full)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

fn io_err(path: &Path, source: std::io::Error) -> WorkspaceError {
    WorkspaceError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Map a file extension to a client-side language identifier.
pub fn language_from_path(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    match ext {
        "ts" | "tsx" => "typescript",
        "js" | "jsx" => "javascript",
        "json" => "json",
        "html" => "html",
        "css" => "css",
        "md" => "markdown",
        "py" => "python",
        "rs" => "rust",
        "go" => "go",
        "java" => "java",
        "yaml" | "yml" => "yaml",
        "xml" => "xml",
        "sh" => "shell",
        "sql" => "sql",
        "txt" => "plaintext",
        _ => "plaintext",
    }
}
