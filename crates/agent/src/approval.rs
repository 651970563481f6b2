//! Plan-approval rendezvous.
//!
//! Each task awaiting approval registers a one-shot channel keyed by task id.
//! External callers resolve it by id with an approve or reject signal; the
//! waiting loop also honors an auto-approval timeout and the task's cancel
//! token.

use codeloom_config::ApprovalConfig;
use codeloom_core::cancel::CancelToken;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, warn};

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// An explicit approval signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

/// How an approval wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// Explicitly approved by the user.
    Approved,
    /// Explicitly rejected by the user.
    Rejected,
    /// No signal arrived within the window; approval assumed.
    AutoApproved,
    /// The task was cancelled while waiting.
    Cancelled,
}

/// Lookup table of pending approval waits, keyed by task id.
#[derive(Default)]
pub struct ApprovalRegistry {
    pending: Mutex<HashMap<String, oneshot::Sender<ApprovalDecision>>>,
}

impl ApprovalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a pending wait by task id. Returns false when no task is
    /// waiting under that id (already resolved, timed out, or unknown).
    pub async fn resolve(&self, task_id: &str, decision: ApprovalDecision) -> bool {
        let sender = self.pending.lock().await.remove(task_id);
        match sender {
            Some(sender) => {
                debug!(task_id, ?decision, "Resolving plan approval");
                sender.send(decision).is_ok()
            }
            None => {
                warn!(task_id, "No pending approval for task");
                false
            }
        }
    }

    /// Whether a task is currently waiting for approval.
    pub async fn is_pending(&self, task_id: &str) -> bool {
        self.pending.lock().await.contains_key(task_id)
    }

    /// Wait for an approval decision on `task_id`.
    ///
    /// Resolution order: an explicit signal wins; otherwise the auto-approve
    /// timeout fires (when enabled); cancellation interrupts either wait.
    pub async fn wait(
        &self,
        task_id: &str,
        config: &ApprovalConfig,
        cancel: &CancelToken,
    ) -> ApprovalOutcome {
        let (tx, mut rx) = oneshot::channel();
        self.pending.lock().await.insert(task_id.to_string(), tx);

        let deadline = config
            .auto_approve
            .then(|| tokio::time::Instant::now() + Duration::from_secs(config.timeout_secs));

        loop {
            if cancel.is_cancelled() {
                self.pending.lock().await.remove(task_id);
                return ApprovalOutcome::Cancelled;
            }

            tokio::select! {
                decision = &mut rx => {
                    return match decision {
                        Ok(ApprovalDecision::Approved) => ApprovalOutcome::Approved,
                        Ok(ApprovalDecision::Rejected) => ApprovalOutcome::Rejected,
                        // Sender dropped without a decision; treat as cancelled
                        Err(_) => ApprovalOutcome::Cancelled,
                    };
                }
                _ = tokio::time::sleep(CANCEL_POLL_INTERVAL) => {
                    if let Some(deadline) = deadline
                        && tokio::time::Instant::now() >= deadline
                    {
                        self.pending.lock().await.remove(task_id);
                        debug!(task_id, "Approval window elapsed, auto-approving");
                        return ApprovalOutcome::AutoApproved;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn config(auto_approve: bool, timeout_secs: u64) -> ApprovalConfig {
        ApprovalConfig {
            require_plan: true,
            auto_approve,
            timeout_secs,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_approve_resolves_wait() {
        let registry = Arc::new(ApprovalRegistry::new());
        let cancel = CancelToken::new();

        let waiter = {
            let registry = registry.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { registry.wait("t1", &config(true, 30), &cancel).await })
        };

        // Let the waiter register itself
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(registry.resolve("t1", ApprovalDecision::Approved).await);
        assert_eq!(waiter.await.unwrap(), ApprovalOutcome::Approved);
        assert!(!registry.is_pending("t1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_reject_resolves_wait() {
        let registry = Arc::new(ApprovalRegistry::new());
        let cancel = CancelToken::new();

        let waiter = {
            let registry = registry.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { registry.wait("t1", &config(true, 30), &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        registry.resolve("t1", ApprovalDecision::Rejected).await;
        assert_eq!(waiter.await.unwrap(), ApprovalOutcome::Rejected);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_auto_approves_exactly_once() {
        let registry = Arc::new(ApprovalRegistry::new());
        let cancel = CancelToken::new();

        let waiter = {
            let registry = registry.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { registry.wait("t1", &config(true, 30), &cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(waiter.await.unwrap(), ApprovalOutcome::AutoApproved);

        // The wait deregistered itself; a late signal finds nothing
        assert!(!registry.resolve("t1", ApprovalDecision::Approved).await);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_wait() {
        let registry = Arc::new(ApprovalRegistry::new());
        let cancel = CancelToken::new();

        let waiter = {
            let registry = registry.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { registry.wait("t1", &config(true, 30), &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        assert_eq!(waiter.await.unwrap(), ApprovalOutcome::Cancelled);
        assert!(!registry.is_pending("t1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn no_auto_approve_waits_indefinitely() {
        let registry = Arc::new(ApprovalRegistry::new());
        let cancel = CancelToken::new();

        let waiter = {
            let registry = registry.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { registry.wait("t1", &config(false, 1), &cancel).await })
        };

        // Far beyond the (disabled) timeout, still pending
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(registry.is_pending("t1").await);

        registry.resolve("t1", ApprovalDecision::Approved).await;
        assert_eq!(waiter.await.unwrap(), ApprovalOutcome::Approved);
    }

    #[tokio::test]
    async fn resolve_unknown_task_returns_false() {
        let registry = ApprovalRegistry::new();
        assert!(!registry.resolve("ghost", ApprovalDecision::Approved).await);
    }
}
