//! `codeloom sessions` — list stored sessions.

use codeloom_config::AppConfig;
use codeloom_session::SessionStore;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path)?;
    let store = SessionStore::new(&config.sessions_dir);
    let summaries = store.list_sessions().await?;

    if summaries.is_empty() {
        println!("No sessions yet. Start one with `codeloom chat \"...\"`.");
        return Ok(());
    }

    for summary in summaries {
        println!(
            "{}  {:<40}  {} messages, {} tasks  (updated {})",
            summary.id,
            summary.title,
            summary.message_count,
            summary.task_count,
            summary.updated_at.format("%Y-%m-%d %H:%M"),
        );
    }
    Ok(())
}
