//! Structured line-level diffs with per-path "before" snapshots.
//!
//! A writing tool snapshots the old content, writes, then calls
//! [`compute_diff`] to produce one aggregated hunk covering the whole file.
//! Line numbers track the old side for removed lines and the new side for
//! added and unchanged lines.

use codeloom_core::file::{ChangeKind, DiffChange, DiffHunk, FileDiff};
use similar::{ChangeTag, TextDiff};
use std::collections::HashMap;
use std::sync::Mutex;

/// Per-path pre-write content snapshots.
#[derive(Default)]
pub struct SnapshotStore {
    snapshots: Mutex<HashMap<String, String>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the content of `path` before a write.
    pub fn insert(&self, path: &str, content: String) {
        self.snapshots
            .lock()
            .expect("snapshot lock poisoned")
            .insert(path.to_string(), content);
    }

    /// Fetch the last snapshot for `path`.
    pub fn get(&self, path: &str) -> Option<String> {
        self.snapshots
            .lock()
            .expect("snapshot lock poisoned")
            .get(path)
            .cloned()
    }

    /// Drop the snapshot for `path`.
    pub fn clear(&self, path: &str) {
        self.snapshots
            .lock()
            .expect("snapshot lock poisoned")
            .remove(path);
    }
}

/// Compute a structured diff between two versions of a file.
///
/// Produces a single hunk spanning the whole file. An empty old content
/// flags the file as newly created; an empty new content flags deletion.
pub fn compute_diff(path: &str, old_content: &str, new_content: &str) -> FileDiff {
    let diff = TextDiff::from_lines(old_content, new_content);

    let mut changes = Vec::new();
    let mut old_line: u32 = 1;
    let mut new_line: u32 = 1;

    for change in diff.iter_all_changes() {
        let content = change.value().trim_end_matches('\n').to_string();
        match change.tag() {
            ChangeTag::Insert => {
                changes.push(DiffChange {
                    kind: ChangeKind::Add,
                    content,
                    line_number: Some(new_line),
                });
                new_line += 1;
            }
            ChangeTag::Delete => {
                changes.push(DiffChange {
                    kind: ChangeKind::Remove,
                    content,
                    line_number: Some(old_line),
                });
                old_line += 1;
            }
            ChangeTag::Equal => {
                changes.push(DiffChange {
                    kind: ChangeKind::Normal,
                    content,
                    line_number: Some(new_line),
                });
                old_line += 1;
                new_line += 1;
            }
        }
    }

    let hunks = if changes.is_empty() {
        Vec::new()
    } else {
        vec![DiffHunk {
            old_start: 1,
            old_lines: old_line - 1,
            new_start: 1,
            new_lines: new_line - 1,
            changes,
        }]
    };

    FileDiff {
        path: path.to_string(),
        old_content: old_content.to_string(),
        new_content: new_content.to_string(),
        hunks,
        is_new: old_content.is_empty(),
        is_deleted: new_content.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Re-apply a diff's hunks to the old content: kept and added lines in
    /// order reproduce the new content.
    fn apply(diff: &FileDiff) -> String {
        let mut lines = Vec::new();
        for hunk in &diff.hunks {
            for change in &hunk.changes {
                match change.kind {
                    ChangeKind::Add | ChangeKind::Normal => lines.push(change.content.clone()),
                    ChangeKind::Remove => {}
                }
            }
        }
        let mut result = lines.join("\n");
        if diff.new_content.ends_with('\n') && !result.is_empty() {
            result.push('\n');
        }
        result
    }

    #[test]
    fn new_file_flagged() {
        let diff = compute_diff("a.txt", "", "hello\nworld\n");
        assert!(diff.is_new);
        assert!(!diff.is_deleted);
        assert_eq!(diff.hunks.len(), 1);
        let changes = &diff.hunks[0].changes;
        assert!(changes.iter().all(|c| c.kind == ChangeKind::Add));
        assert_eq!(changes[0].line_number, Some(1));
        assert_eq!(changes[1].line_number, Some(2));
    }

    #[test]
    fn deleted_file_flagged() {
        let diff = compute_diff("a.txt", "hello\n", "");
        assert!(diff.is_deleted);
        assert!(!diff.is_new);
        assert!(
            diff.hunks[0]
                .changes
                .iter()
                .all(|c| c.kind == ChangeKind::Remove)
        );
    }

    #[test]
    fn mixed_change_line_numbers() {
        let old = "a\nb\nc\n";
        let new = "a\nB\nc\nd\n";
        let diff = compute_diff("f.txt", old, new);
        let changes = &diff.hunks[0].changes;

        // "a" unchanged at new line 1
        assert_eq!(changes[0].kind, ChangeKind::Normal);
        assert_eq!(changes[0].line_number, Some(1));
        // "b" removed at old line 2
        let removed: Vec<_> = changes
            .iter()
            .filter(|c| c.kind == ChangeKind::Remove)
            .collect();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].content, "b");
        assert_eq!(removed[0].line_number, Some(2));
        // "B" and "d" added on the new side
        let added: Vec<_> = changes
            .iter()
            .filter(|c| c.kind == ChangeKind::Add)
            .collect();
        assert_eq!(added.len(), 2);
        assert_eq!(added[1].content, "d");
        assert_eq!(added[1].line_number, Some(4));
    }

    #[test]
    fn round_trip_reproduces_new_content() {
        let cases = [
            ("", "fn main() {}\n"),
            ("a\nb\nc\n", "a\nB\nc\nd\n"),
            ("one\ntwo\nthree\n", "one\nthree\n"),
            ("same\n", "same\n"),
        ];
        for (old, new) in cases {
            let diff = compute_diff("f.txt", old, new);
            assert_eq!(apply(&diff), new, "old={old:?} new={new:?}");
        }
    }

    #[test]
    fn hunk_line_totals() {
        let diff = compute_diff("f.txt", "a\nb\n", "a\nb\nc\n");
        let hunk = &diff.hunks[0];
        assert_eq!(hunk.old_lines, 2);
        assert_eq!(hunk.new_lines, 3);
        assert_eq!(hunk.old_start, 1);
        assert_eq!(hunk.new_start, 1);
    }

    #[test]
    fn snapshot_store_insert_get_clear() {
        let store = SnapshotStore::new();
        assert!(store.get("a.txt").is_none());

        store.insert("a.txt", "old".into());
        assert_eq!(store.get("a.txt").as_deref(), Some("old"));

        store.insert("a.txt", "newer".into());
        assert_eq!(store.get("a.txt").as_deref(), Some("newer"));

        store.clear("a.txt");
        assert!(store.get("a.txt").is_none());
    }
}
