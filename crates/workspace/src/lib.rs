//! Sandboxed workspace access and file diffing for codeloom.
//!
//! [`WorkspaceStore`] scopes every file operation to a sandbox root and
//! rejects path traversal. [`SnapshotStore`] and [`compute_diff`] keep
//! per-path "before" snapshots and produce structured line-level diffs.

pub mod diff;
pub mod store;

pub use diff::{SnapshotStore, compute_diff};
pub use store::{WorkspaceStore, language_from_path};
