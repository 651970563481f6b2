//! Durable session persistence for codeloom.
//!
//! One JSON file per session. Every save writes a `.tmp` sibling and renames
//! it into place, so a reader never observes a half-written record. All
//! operations re-read the file, mutate, and save — idempotent under retry.

use codeloom_core::error::SessionError;
use codeloom_core::message::{ChatMessage, Role};
use codeloom_core::session::{Session, SessionSummary, TaskHistory};
use codeloom_core::task::Task;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const AUTO_TITLE_MAX_CHARS: usize = 60;

/// File-backed session store.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Create a store over the given sessions directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the sessions directory if missing.
    pub async fn ensure_dir(&self) -> Result<(), SessionError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    fn session_file(&self, session_id: &str) -> PathBuf {
        let safe: String = session_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    /// Create and persist a fresh session.
    pub async fn create_session(&self, title: Option<String>) -> Result<Session, SessionError> {
        self.ensure_dir().await?;
        let session = Session::new(title);
        self.save(&session).await?;
        Ok(session)
    }

    /// Load a session by id.
    pub async fn get_session(&self, session_id: &str) -> Result<Session, SessionError> {
        let path = self.session_file(session_id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::NotFound(session_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|e| SessionError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Persist a session with write-then-atomic-rename.
    pub async fn save(&self, session: &Session) -> Result<(), SessionError> {
        let path = self.session_file(&session.id);
        let tmp = path.with_extension("json.tmp");
        let raw = serde_json::to_string_pretty(session).map_err(|e| SessionError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(session_id = %session.id, "Session saved");
        Ok(())
    }

    /// List all sessions as summaries, newest first. Corrupt files are
    /// skipped with a warning rather than failing the listing.
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, SessionError> {
        self.ensure_dir().await?;
        let mut read_dir = tokio::fs::read_dir(&self.dir).await?;
        let mut summaries = Vec::new();

        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_session_file(&path).await {
                Ok(session) => summaries.push(session.summary()),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable session file"),
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    /// Delete a session file.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), SessionError> {
        let path = self.session_file(session_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SessionError::NotFound(session_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Append a chat message. The first user message auto-titles the session.
    pub async fn add_message(
        &self,
        session_id: &str,
        message: ChatMessage,
    ) -> Result<(), SessionError> {
        let mut session = self.get_session(session_id).await?;

        if session.title == "New Session" && message.role == Role::User {
            session.title = auto_title(&message.content);
        }
        session.messages.push(message);
        session.touch();
        self.save(&session).await
    }

    /// Insert or replace a task by id. Step diffs are slimmed to hunks so
    /// stored sessions stay bounded.
    pub async fn upsert_task(&self, session_id: &str, task: &Task) -> Result<(), SessionError> {
        let mut session = self.get_session(session_id).await?;

        let mut slim = task.clone();
        for step in &mut slim.steps {
            if let Some(diff) = &step.diff {
                step.diff = Some(diff.slim());
            }
        }

        match session.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = slim,
            None => session.tasks.push(slim),
        }
        session.touch();
        self.save(&session).await
    }

    /// Append a task's provider history. Re-appending for the same task id
    /// replaces the previous entry, keeping retries idempotent.
    pub async fn append_task_history(
        &self,
        session_id: &str,
        history: TaskHistory,
    ) -> Result<(), SessionError> {
        let mut session = self.get_session(session_id).await?;

        match session
            .task_histories
            .iter_mut()
            .find(|h| h.task_id == history.task_id)
        {
            Some(existing) => *existing = history,
            None => session.task_histories.push(history),
        }
        session.touch();
        self.save(&session).await
    }

    /// All stored task histories, in completion order.
    pub async fn get_task_histories(
        &self,
        session_id: &str,
    ) -> Result<Vec<TaskHistory>, SessionError> {
        Ok(self.get_session(session_id).await?.task_histories)
    }
}

async fn read_session_file(path: &Path) -> Result<Session, SessionError> {
    let raw = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&raw).map_err(|e| SessionError::Corrupt {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn auto_title(content: &str) -> String {
    let mut title: String = content.chars().take(AUTO_TITLE_MAX_CHARS).collect();
    if content.chars().count() > AUTO_TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}
