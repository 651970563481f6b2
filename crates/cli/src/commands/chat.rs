//! `codeloom chat` — run one prompt through the agent engine, rendering
//! streamed output, step progress, and file changes to the terminal.

use codeloom_agent::approval::ApprovalDecision;
use codeloom_agent::build_engine;
use codeloom_config::AppConfig;
use codeloom_core::cancel::CancelToken;
use codeloom_core::event::AgentEvent;
use codeloom_session::SessionStore;
use std::io::Write;
use std::path::Path;
use tracing::debug;

pub async fn run(
    config_path: &Path,
    prompt: &str,
    session: Option<String>,
    approve: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path)?;
    let engine = build_engine(&config)?;

    let sessions = SessionStore::new(&config.sessions_dir);
    let session_id = match session {
        Some(id) => sessions.get_session(&id).await?.id,
        None => sessions.create_session(None).await?.id,
    };
    debug!(session_id, "Chat session ready");

    // Render events as they arrive; optionally resolve approval instantly.
    let mut events = engine.events().subscribe();
    let approvals = engine.approvals().clone();
    let renderer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.as_ref() {
                AgentEvent::StreamDelta { delta, .. } => {
                    print!("{delta}");
                    let _ = std::io::stdout().flush();
                }
                AgentEvent::StreamEnd { .. } => println!(),
                AgentEvent::PlanReady { task_id, steps, .. } => {
                    println!("\n--- plan ({} steps) ---", steps.len());
                    for step in steps {
                        println!("  [ ] {}", step.title);
                    }
                    if approve {
                        // The waiter registers just after publishing; retry briefly.
                        for _ in 0..50 {
                            if approvals
                                .resolve(task_id, ApprovalDecision::Approved)
                                .await
                            {
                                break;
                            }
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    } else {
                        println!("(waiting for approval timeout)");
                    }
                }
                AgentEvent::StepUpdated { step, .. } => {
                    println!("  [{:?}] {}", step.status, step.title);
                }
                AgentEvent::FileChanged { diff } => {
                    let tag = if diff.is_new { "new" } else { "mod" };
                    let language = codeloom_workspace::language_from_path(&diff.path);
                    println!("  ({tag}) {} [{language}]", diff.path);
                }
                AgentEvent::Error { message } => eprintln!("error: {message}"),
                _ => {}
            }
        }
    });

    // Ctrl-C cancels the running task cooperatively.
    let cancel = CancelToken::new();
    let run = engine.run(&session_id, prompt, cancel.clone());
    tokio::pin!(run);

    let task = loop {
        tokio::select! {
            result = &mut run => break result?,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\ncancelling...");
                cancel.cancel();
            }
        }
    };

    renderer.abort();
    println!("\ntask {} finished: {:?}", task.id, task.status);
    println!("session: {session_id}");
    Ok(())
}
