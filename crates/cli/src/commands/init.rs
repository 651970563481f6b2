//! `codeloom init` — write a default config and create the directories.

use codeloom_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
    } else {
        let config = AppConfig::default();
        tokio::fs::write(config_path, config.to_toml()).await?;
        println!("Wrote default config to {}", config_path.display());
    }

    let config = AppConfig::load(config_path)?;
    tokio::fs::create_dir_all(&config.workspace_root).await?;
    tokio::fs::create_dir_all(&config.sessions_dir).await?;
    println!("Workspace: {}", config.workspace_root.display());
    println!("Sessions:  {}", config.sessions_dir.display());

    Ok(())
}
