//! Agent orchestration for codeloom.
//!
//! The [`AgentLoop`] drives a task through planning, approval, and bounded
//! execution rounds, coordinating the provider, tool registry, workspace,
//! and session store while broadcasting lifecycle events.

pub mod approval;
pub mod executor;
pub mod history;
pub mod loop_runner;
pub mod planner;

pub use approval::{ApprovalDecision, ApprovalOutcome, ApprovalRegistry};
pub use history::build_context;
pub use loop_runner::AgentLoop;
pub use planner::parse_plan_steps;

use codeloom_config::AppConfig;
use codeloom_core::error::Error;
use codeloom_core::event::EventBus;
use codeloom_providers::create_provider;
use codeloom_session::SessionStore;
use codeloom_tools::builtin_registry;
use codeloom_workspace::{SnapshotStore, WorkspaceStore};
use std::sync::Arc;

/// Wire a ready-to-run [`AgentLoop`] from configuration: provider, sandboxed
/// workspace, built-in tools, and the session store.
pub fn build_engine(config: &AppConfig) -> Result<AgentLoop, Error> {
    let provider = create_provider(config)?;
    let workspace = Arc::new(WorkspaceStore::new(&config.workspace_root));
    let snapshots = Arc::new(SnapshotStore::new());
    let tools = Arc::new(builtin_registry(workspace.clone(), snapshots));
    let sessions = Arc::new(SessionStore::new(&config.sessions_dir));
    let events = Arc::new(EventBus::default());
    let approvals = Arc::new(ApprovalRegistry::new());

    Ok(AgentLoop::new(
        provider, tools, workspace, sessions, events, approvals, config,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_builds_from_default_config() {
        let config = AppConfig::default();
        let engine = build_engine(&config).unwrap();
        let _events = engine.events().subscribe();
    }

    #[test]
    fn engine_rejects_unconfigured_claude() {
        let config = AppConfig {
            provider: "claude".into(),
            ..Default::default()
        };
        assert!(build_engine(&config).is_err());
    }
}
