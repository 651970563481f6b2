//! File tree and diff value objects.

use serde::{Deserialize, Serialize};

/// A node in the workspace file tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileNode {
    /// File or directory name
    pub name: String,

    /// Path relative to the workspace root
    pub path: String,

    /// Node kind
    #[serde(rename = "type")]
    pub kind: FileKind,

    /// Children, present for directories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
}

/// Classification of a single diff line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Remove,
    Normal,
}

/// One line-level change within a hunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffChange {
    /// Change classification
    #[serde(rename = "type")]
    pub kind: ChangeKind,

    /// The line content, without trailing newline
    pub content: String,

    /// Line number: old-side for removes, new-side for adds and normals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
}

/// A contiguous block of changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffHunk {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub changes: Vec<DiffChange>,
}

/// A structured diff between two versions of a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiff {
    /// Path relative to the workspace root
    pub path: String,

    /// Full pre-change content
    pub old_content: String,

    /// Full post-change content
    pub new_content: String,

    /// Line-level hunks
    pub hunks: Vec<DiffHunk>,

    /// The file did not exist before
    pub is_new: bool,

    /// The file was emptied/removed
    pub is_deleted: bool,
}

impl FileDiff {
    /// Strip full contents, keeping only hunks. Used before long-term
    /// persistence so stored sessions stay bounded.
    pub fn slim(&self) -> FileDiff {
        FileDiff {
            old_content: String::new(),
            new_content: String::new(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ChangeKind::Remove).unwrap(),
            r#""remove""#
        );
    }

    #[test]
    fn file_node_type_field() {
        let node = FileNode {
            name: "src".into(),
            path: "src".into(),
            kind: FileKind::Directory,
            children: Some(vec![]),
        };
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains(r#""type":"directory""#));
    }

    #[test]
    fn slim_keeps_hunks_drops_content() {
        let diff = FileDiff {
            path: "a.txt".into(),
            old_content: "old".into(),
            new_content: "new".into(),
            hunks: vec![DiffHunk {
                old_start: 1,
                old_lines: 1,
                new_start: 1,
                new_lines: 1,
                changes: vec![],
            }],
            is_new: false,
            is_deleted: false,
        };
        let slim = diff.slim();
        assert!(slim.old_content.is_empty());
        assert!(slim.new_content.is_empty());
        assert_eq!(slim.hunks.len(), 1);
        assert_eq!(slim.path, "a.txt");
    }
}
